//! Records and versions, the two persisted entity types.
//!
//! A [`Record`] carries the live values of every field, gated or not. A
//! [`Version`] is a snapshot of the gated fields only: the single one with
//! `is_approved == false` is the record's draft, every other one is history.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Field name → value. Absent keys read as [`Value::Null`].
pub type Attributes = BTreeMap<String, Value>;

static NULL: Value = Value::Null;

// ─── Record ──────────────────────────────────────────────────────────────────

/// The live state of an entity.
///
/// Gated fields hold their last-approved value, or null if the record has
/// never been approved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
  pub record_id:   Uuid,
  pub record_type: String,
  pub attributes:  Attributes,
  /// Set on creation; cleared once an approval resolves the pending state.
  pub is_frozen:   bool,
  /// Soft-delete marker.
  pub is_deleted:  bool,
  pub created_at:  DateTime<Utc>,
  pub updated_at:  DateTime<Utc>,
}

impl Record {
  /// A fresh, frozen record with no attributes.
  pub fn new(record_type: impl Into<String>) -> Self {
    let now = Utc::now();
    Self {
      record_id:   Uuid::new_v4(),
      record_type: record_type.into(),
      attributes:  Attributes::new(),
      is_frozen:   true,
      is_deleted:  false,
      created_at:  now,
      updated_at:  now,
    }
  }

  /// The live value of `field`.
  pub fn get(&self, field: &str) -> &Value {
    self.attributes.get(field).unwrap_or(&NULL)
  }

  pub fn set(&mut self, field: impl Into<String>, value: Value) {
    self.attributes.insert(field.into(), value);
  }

  /// The live values of `fields`, with nulls filled in for absent keys.
  pub fn values_of<'a>(
    &self,
    fields: impl IntoIterator<Item = &'a String>,
  ) -> Attributes {
    fields
      .into_iter()
      .map(|f| (f.clone(), self.get(f).clone()))
      .collect()
  }
}

// ─── Version ─────────────────────────────────────────────────────────────────

/// A snapshot of a record's gated fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Version {
  pub version_id:  Uuid,
  pub record_id:   Uuid,
  pub values:      Attributes,
  pub is_approved: bool,
  pub created_at:  DateTime<Utc>,
  /// When the version became history. `None` while it is the draft.
  pub approved_at: Option<DateTime<Utc>>,
}

impl Version {
  /// A new, unapproved version for `record_id`.
  pub fn draft(record_id: Uuid, values: Attributes) -> Self {
    Self {
      version_id: Uuid::new_v4(),
      record_id,
      values,
      is_approved: false,
      created_at: Utc::now(),
      approved_at: None,
    }
  }

  /// The proposed value of `field`.
  pub fn get(&self, field: &str) -> &Value {
    self.values.get(field).unwrap_or(&NULL)
  }

  pub fn set(&mut self, field: impl Into<String>, value: Value) {
    self.values.insert(field.into(), value);
  }

  pub fn is_draft(&self) -> bool { !self.is_approved }

  /// Turn this version into history.
  pub fn approve(&mut self, at: DateTime<Utc>) {
    self.is_approved = true;
    self.approved_at = Some(at);
  }
}
