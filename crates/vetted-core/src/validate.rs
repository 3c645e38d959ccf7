//! Field-level validation hook for gated fields.
//!
//! Rules are attached to gated fields in configuration and are always checked
//! against the value a version carries, never against the live record. A
//! proposal is therefore rejected when it is written, and an approval is
//! rejected if the state it would commit no longer passes.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{record::Attributes, schema::RecordSchema};

/// A single check applied to a gated field's proposed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum FieldRule {
  /// Not null, not a blank string, not an empty array or object.
  Presence,
  /// Character count for strings, element count for arrays. Null passes.
  Length {
    #[serde(default)]
    min: Option<usize>,
    #[serde(default)]
    max: Option<usize>,
  },
  /// The value must equal one of `values`.
  OneOf { values: Vec<Value> },
}

impl FieldRule {
  /// Returns the failure message, or `None` if `value` passes.
  pub fn check(&self, value: &Value) -> Option<String> {
    match self {
      Self::Presence => is_blank(value).then(|| "can't be blank".to_owned()),
      Self::Length { min, max } => {
        let len = match value {
          Value::String(s) => s.chars().count(),
          Value::Array(a) => a.len(),
          _ => return None,
        };
        if let Some(min) = min
          && len < *min
        {
          return Some(format!("is too short (minimum is {min})"));
        }
        if let Some(max) = max
          && len > *max
        {
          return Some(format!("is too long (maximum is {max})"));
        }
        None
      }
      Self::OneOf { values } => {
        (!values.contains(value)).then(|| "is not included in the list".to_owned())
      }
    }
  }
}

fn is_blank(value: &Value) -> bool {
  match value {
    Value::Null => true,
    Value::String(s) => s.trim().is_empty(),
    Value::Array(a) => a.is_empty(),
    Value::Object(o) => o.is_empty(),
    Value::Bool(_) | Value::Number(_) => false,
  }
}

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
  pub field:   String,
  pub message: String,
}

/// Every rule failure found in one pass over a version's values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  /// Messages recorded against `field`.
  pub fn on(&self, field: &str) -> Vec<&str> {
    self
      .0
      .iter()
      .filter(|e| e.field == field)
      .map(|e| e.message.as_str())
      .collect()
  }
}

impl fmt::Display for ValidationErrors {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, e) in self.0.iter().enumerate() {
      if i > 0 {
        f.write_str("; ")?;
      }
      write!(f, "draft.{} {}", e.field, e.message)?;
    }
    Ok(())
  }
}

impl std::error::Error for ValidationErrors {}

/// Run every configured rule of `schema` against `values`.
pub fn validate_values(
  schema: &RecordSchema,
  values: &Attributes,
) -> Result<(), ValidationErrors> {
  let mut errors = ValidationErrors::default();
  for field in schema.gated_fields() {
    let value = values.get(field).cloned().unwrap_or_default();
    for rule in schema.rules_for(field) {
      if let Some(message) = rule.check(&value) {
        errors.0.push(ValidationError { field: field.clone(), message });
      }
    }
  }
  if errors.is_empty() { Ok(()) } else { Err(errors) }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use std::collections::BTreeMap;

  use serde_json::json;

  use super::*;
  use crate::schema::RecordTypeConfig;

  #[test]
  fn presence() {
    let rule = FieldRule::Presence;
    assert!(rule.check(&Value::Null).is_some());
    assert!(rule.check(&json!("   ")).is_some());
    assert!(rule.check(&json!([])).is_some());
    assert!(rule.check(&json!("Dan")).is_none());
    assert!(rule.check(&json!(false)).is_none());
  }

  #[test]
  fn length_bounds() {
    let rule = FieldRule::Length { min: Some(2), max: Some(4) };
    assert!(rule.check(&json!("a")).unwrap().contains("too short"));
    assert!(rule.check(&json!("abcde")).unwrap().contains("too long"));
    assert!(rule.check(&json!("abc")).is_none());
    assert!(rule.check(&Value::Null).is_none());
  }

  #[test]
  fn one_of() {
    let rule = FieldRule::OneOf { values: vec![json!("new"), json!("active")] };
    assert!(rule.check(&json!("active")).is_none());
    assert!(rule.check(&json!("gone")).is_some());
  }

  #[test]
  fn rules_deserialize_from_tagged_form() {
    let rules: Vec<FieldRule> = serde_json::from_value(json!([
      { "rule": "presence" },
      { "rule": "length", "max": 10 },
    ]))
    .unwrap();
    assert_eq!(rules, vec![
      FieldRule::Presence,
      FieldRule::Length { min: None, max: Some(10) },
    ]);
  }

  #[test]
  fn validate_values_collects_all_failures() {
    let schema = RecordSchema::new(RecordTypeConfig {
      name:   "user".into(),
      fields: vec!["first_name".into(), "status".into()],
      gated:  vec!["first_name".into(), "status".into()],
      rules:  BTreeMap::from([
        ("first_name".to_owned(), vec![FieldRule::Presence]),
        ("status".to_owned(), vec![FieldRule::OneOf {
          values: vec![json!("new")],
        }]),
      ]),
    })
    .unwrap();

    let errors = validate_values(&schema, &Attributes::new()).unwrap_err();
    assert_eq!(errors.on("first_name"), ["can't be blank"]);
    assert_eq!(errors.on("status"), ["is not included in the list"]);
    assert_eq!(
      errors.to_string(),
      "draft.first_name can't be blank; draft.status is not included in the list"
    );

    let ok: Attributes = BTreeMap::from([
      ("first_name".to_owned(), json!("Dan")),
      ("status".to_owned(), json!("new")),
    ]);
    assert!(validate_values(&schema, &ok).is_ok());
  }
}
