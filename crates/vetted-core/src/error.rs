//! Error types for `vetted-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::validate::ValidationErrors;

#[derive(Debug, Error)]
pub enum Error {
  #[error("fields do not require approval: {}", .0.join(", "))]
  InvalidFields(Vec<String>),

  #[error("a record that has never been approved must have all gated fields approved at once")]
  PartialApprovalForNewObject,

  #[error("cannot deny changes on a record that has never been approved")]
  DenyingNeverApproved,

  /// A non-gated field was routed to the draft. This is a bug in the caller.
  #[error("field {0:?} is not gated")]
  NotGated(String),

  #[error("record type {record_type:?} has no field {field:?}")]
  UnknownField { record_type: String, field: String },

  #[error("unknown record type: {0:?}")]
  UnknownRecordType(String),

  #[error("record not found: {0}")]
  RecordNotFound(Uuid),

  #[error("record {0} has no draft")]
  NoDraft(Uuid),

  #[error("invalid record type configuration: {0}")]
  Config(String),

  #[error("settings error: {0}")]
  Settings(#[from] config::ConfigError),

  #[error("validation failed: {0}")]
  Validation(#[from] ValidationErrors),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
