//! Field classification: which fields of a record type are gated.
//!
//! A [`RecordSchema`] is built once from a [`RecordTypeConfig`] and checked at
//! that point; lookups afterwards are infallible apart from the explicit
//! "is this field known / gated" checks.

use std::{
  collections::{BTreeMap, BTreeSet, HashMap},
  sync::Arc,
};

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter, IntoEnumIterator};

use crate::{
  Error, Result,
  record::Attributes,
  validate::FieldRule,
};

/// Bookkeeping columns every record carries outside its attribute map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum ReservedField {
  IsFrozen,
  IsDeleted,
}

/// The declared shape of one record type, as it appears in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordTypeConfig {
  pub name:   String,
  /// Every attribute the record type has, gated or not.
  pub fields: Vec<String>,
  /// The attributes that require approval, in presentation order.
  pub gated:  Vec<String>,
  /// Validation rules run against draft values of gated fields.
  #[serde(default)]
  pub rules:  BTreeMap<String, Vec<FieldRule>>,
}

// ─── Schema ──────────────────────────────────────────────────────────────────

/// A checked record type.
#[derive(Debug, Clone)]
pub struct RecordSchema {
  name:   String,
  fields: BTreeSet<String>,
  gated:  Vec<String>,
  rules:  BTreeMap<String, Vec<FieldRule>>,
}

impl RecordSchema {
  pub fn new(config: RecordTypeConfig) -> Result<Self> {
    let RecordTypeConfig { name, fields, gated, rules } = config;

    let mut known = BTreeSet::new();
    for field in fields {
      if ReservedField::iter().any(|r| r.as_ref() == field) {
        return Err(Error::Config(format!(
          "{name}: {field:?} is a reserved field name"
        )));
      }
      if !known.insert(field.clone()) {
        return Err(Error::Config(format!("{name}: duplicate field {field:?}")));
      }
    }

    let mut seen = BTreeSet::new();
    for field in &gated {
      if !known.contains(field) {
        return Err(Error::Config(format!(
          "{name}: gated field {field:?} is not a field of this record type"
        )));
      }
      if !seen.insert(field) {
        return Err(Error::Config(format!(
          "{name}: gated field {field:?} listed twice"
        )));
      }
    }

    if let Some(field) = rules.keys().find(|f| !seen.contains(f)) {
      return Err(Error::Config(format!(
        "{name}: validation rules given for non-gated field {field:?}"
      )));
    }

    Ok(Self { name, fields: known, gated, rules })
  }

  pub fn name(&self) -> &str { &self.name }

  pub fn has_field(&self, field: &str) -> bool { self.fields.contains(field) }

  pub fn is_gated(&self, field: &str) -> bool {
    self.gated.iter().any(|g| g == field)
  }

  /// Gated fields in configured order.
  pub fn gated_fields(&self) -> &[String] { &self.gated }

  pub fn rules_for(&self, field: &str) -> &[FieldRule] {
    self.rules.get(field).map(Vec::as_slice).unwrap_or_default()
  }

  /// Check that every name in `fields` is gated and return them owned.
  pub fn check_gated<S: AsRef<str>>(&self, fields: &[S]) -> Result<Vec<String>> {
    let invalid: Vec<String> = fields
      .iter()
      .map(|f| f.as_ref())
      .filter(|f| !self.is_gated(f))
      .map(str::to_owned)
      .collect();
    if !invalid.is_empty() {
      return Err(Error::InvalidFields(invalid));
    }
    Ok(fields.iter().map(|f| f.as_ref().to_owned()).collect())
  }

  /// Whether `fields` names every gated field.
  pub fn covers_all_gated(&self, fields: &[String]) -> bool {
    self.gated.iter().all(|g| fields.contains(g))
  }

  /// Partition `attributes` into `(ungated, gated)`.
  pub fn split(&self, attributes: Attributes) -> Result<(Attributes, Attributes)> {
    let mut ungated = Attributes::new();
    let mut gated = Attributes::new();
    for (field, value) in attributes {
      if !self.has_field(&field) {
        return Err(Error::UnknownField {
          record_type: self.name.clone(),
          field,
        });
      }
      if self.is_gated(&field) {
        gated.insert(field, value);
      } else {
        ungated.insert(field, value);
      }
    }
    Ok((ungated, gated))
  }
}

// ─── Registry ────────────────────────────────────────────────────────────────

/// All configured record types, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct Registry {
  types: HashMap<String, Arc<RecordSchema>>,
}

impl Registry {
  pub fn new(configs: impl IntoIterator<Item = RecordTypeConfig>) -> Result<Self> {
    let mut types = HashMap::new();
    for config in configs {
      let schema = RecordSchema::new(config)?;
      let name = schema.name.clone();
      if types.insert(name.clone(), Arc::new(schema)).is_some() {
        return Err(Error::Config(format!("duplicate record type {name:?}")));
      }
    }
    Ok(Self { types })
  }

  pub fn get(&self, record_type: &str) -> Result<&Arc<RecordSchema>> {
    self
      .types
      .get(record_type)
      .ok_or_else(|| Error::UnknownRecordType(record_type.to_owned()))
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn user() -> RecordTypeConfig {
    RecordTypeConfig {
      name:   "user".into(),
      fields: vec![
        "first_name".into(),
        "last_name".into(),
        "birthday".into(),
        "is_alive".into(),
      ],
      gated:  vec!["first_name".into(), "last_name".into(), "is_alive".into()],
      rules:  BTreeMap::new(),
    }
  }

  #[test]
  fn classifies_fields() {
    let schema = RecordSchema::new(user()).unwrap();
    assert!(schema.is_gated("first_name"));
    assert!(schema.is_gated("is_alive"));
    assert!(!schema.is_gated("birthday"));
    assert!(!schema.is_gated("x"));
    assert_eq!(schema.gated_fields(), ["first_name", "last_name", "is_alive"]);
  }

  #[test]
  fn gated_field_must_exist() {
    let mut config = user();
    config.gated.push("middle_name".into());
    let err = RecordSchema::new(config).unwrap_err();
    assert!(matches!(err, Error::Config(msg) if msg.contains("middle_name")));
  }

  #[test]
  fn reserved_names_rejected() {
    let mut config = user();
    config.fields.push("is_frozen".into());
    assert!(matches!(RecordSchema::new(config), Err(Error::Config(_))));
  }

  #[test]
  fn rules_only_on_gated_fields() {
    let mut config = user();
    config
      .rules
      .insert("birthday".into(), vec![FieldRule::Presence]);
    assert!(matches!(RecordSchema::new(config), Err(Error::Config(_))));
  }

  #[test]
  fn check_gated_reports_every_offender() {
    let schema = RecordSchema::new(user()).unwrap();
    let err = schema
      .check_gated(&["first_name", "birthday", "x"])
      .unwrap_err();
    assert!(matches!(err, Error::InvalidFields(f) if f == ["birthday", "x"]));
  }

  #[test]
  fn split_partitions_and_rejects_unknown() {
    let schema = RecordSchema::new(user()).unwrap();
    let attrs: Attributes = [
      ("first_name".to_owned(), json!("Dan")),
      ("birthday".to_owned(), json!("1980-01-01")),
    ]
    .into_iter()
    .collect();
    let (ungated, gated) = schema.split(attrs).unwrap();
    assert_eq!(ungated.keys().collect::<Vec<_>>(), ["birthday"]);
    assert_eq!(gated.keys().collect::<Vec<_>>(), ["first_name"]);

    let bad: Attributes = [("nope".to_owned(), json!(1))].into_iter().collect();
    assert!(matches!(schema.split(bad), Err(Error::UnknownField { .. })));
  }

  #[test]
  fn registry_rejects_duplicate_types() {
    let err = Registry::new([user(), user()]).unwrap_err();
    assert!(matches!(err, Error::Config(_)));

    let registry = Registry::new([user()]).unwrap();
    assert!(registry.get("user").is_ok());
    assert!(matches!(
      registry.get("post"),
      Err(Error::UnknownRecordType(t)) if t == "post"
    ));
  }
}
