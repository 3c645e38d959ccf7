//! Host settings: record type declarations and the store location.
//!
//! Loaded with the `config` crate from a TOML file (optional) layered with
//! `VETTED__*` environment variables, e.g. `VETTED__STORE_PATH=/var/lib/v.db`.
//! Storage backends open themselves from `store_path`.
//!
//! ```toml
//! store_path = "vetted.db"
//!
//! [[record_types]]
//! name   = "user"
//! fields = ["first_name", "last_name", "birthday"]
//! gated  = ["first_name", "last_name"]
//!
//! [record_types.rules]
//! first_name = [{ rule = "presence" }]
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{
  Result,
  schema::{RecordTypeConfig, Registry},
};

fn default_store_path() -> PathBuf { PathBuf::from("vetted.db") }

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
  #[serde(default = "default_store_path")]
  pub store_path:   PathBuf,
  #[serde(default)]
  pub record_types: Vec<RecordTypeConfig>,
}

impl Settings {
  /// Read `path` (if it exists) and overlay the environment.
  pub fn load(path: impl AsRef<Path>) -> Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path.as_ref()).required(false))
      .add_source(config::Environment::with_prefix("VETTED").separator("__"))
      .build()?;
    Ok(settings.try_deserialize()?)
  }

  /// Parse settings from TOML text alone.
  pub fn from_toml(text: &str) -> Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from_str(text, config::FileFormat::Toml))
      .build()?;
    Ok(settings.try_deserialize()?)
  }

  /// Check the declared record types and build a [`Registry`].
  pub fn registry(&self) -> Result<Registry> {
    Registry::new(self.record_types.iter().cloned())
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{Error, validate::FieldRule};

  const SAMPLE: &str = r#"
store_path = "approvals.db"

[[record_types]]
name   = "user"
fields = ["first_name", "last_name", "birthday"]
gated  = ["first_name", "last_name"]

[record_types.rules]
first_name = [{ rule = "presence" }, { rule = "length", max = 40 }]

[[record_types]]
name   = "post"
fields = ["title", "body", "published_at"]
gated  = ["title", "body"]
"#;

  #[test]
  fn parses_record_types_and_rules() {
    let settings = Settings::from_toml(SAMPLE).unwrap();
    assert_eq!(settings.store_path, PathBuf::from("approvals.db"));
    assert_eq!(settings.record_types.len(), 2);

    let registry = settings.registry().unwrap();
    let user = registry.get("user").unwrap();
    assert_eq!(user.gated_fields(), ["first_name", "last_name"]);
    assert_eq!(user.rules_for("first_name"), [
      FieldRule::Presence,
      FieldRule::Length { min: None, max: Some(40) },
    ]);
    assert!(registry.get("post").unwrap().is_gated("title"));
  }

  #[test]
  fn store_path_defaults() {
    let settings = Settings::from_toml("").unwrap();
    assert_eq!(settings.store_path, PathBuf::from("vetted.db"));
    assert!(settings.record_types.is_empty());
  }

  #[test]
  fn bad_gated_field_fails_at_setup() {
    let settings = Settings::from_toml(
      r#"
[[record_types]]
name   = "user"
fields = ["first_name"]
gated  = ["nickname"]
"#,
    )
    .unwrap();
    assert!(matches!(settings.registry(), Err(Error::Config(_))));
  }

  #[test]
  fn missing_file_is_not_an_error() {
    let settings = Settings::load("/nonexistent/vetted.toml").unwrap();
    assert_eq!(settings.store_path, PathBuf::from("vetted.db"));
  }
}
