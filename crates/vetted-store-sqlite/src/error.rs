//! Error type for `vetted-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored attribute or value column did not hold a JSON object.
  #[error("expected a JSON object in column {0}")]
  NotAnObject(&'static str),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
