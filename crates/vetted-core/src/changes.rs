//! Pending-change computation: draft values compared against live values.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::RecordState;

/// One gated field's live value and the value proposed for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingChange {
  pub was:    Value,
  pub became: Value,
}

impl PendingChange {
  pub fn new(was: Value, became: Value) -> Self { Self { was, became } }
}

/// Field name → pending change.
pub type PendingChanges = BTreeMap<String, PendingChange>;

/// Compute the pending changes of `state`. Never mutates anything.
///
/// A record that has never been approved reports every gated field, with
/// `was` null regardless of what the live column holds.
pub fn pending_changes(state: &RecordState) -> PendingChanges {
  let Some(draft) = &state.draft else {
    return PendingChanges::new();
  };

  state
    .schema
    .gated_fields()
    .iter()
    .filter_map(|field| {
      let became = draft.get(field);
      if state.never_approved() {
        return Some((field.clone(), PendingChange::new(Value::Null, became.clone())));
      }
      let was = state.record.get(field);
      (was != became)
        .then(|| (field.clone(), PendingChange::new(was.clone(), became.clone())))
    })
    .collect()
}

/// The proposed values of every pending field.
pub fn proposed_values(state: &RecordState) -> BTreeMap<String, Value> {
  pending_changes(state)
    .into_iter()
    .map(|(field, change)| (field, change.became))
    .collect()
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use serde_json::json;

  use super::*;
  use crate::{
    record::{Record, Version},
    schema::{RecordSchema, RecordTypeConfig},
  };

  fn state(approved: bool) -> RecordState {
    let schema = RecordSchema::new(RecordTypeConfig {
      name:   "account".into(),
      fields: vec!["name".into(), "status".into(), "note".into()],
      gated:  vec!["name".into(), "status".into()],
      rules:  Default::default(),
    })
    .unwrap();
    let mut record = Record::new("account");
    record.set("name", json!("Dan"));
    record.set("status", json!("new"));
    let draft = Version::draft(record.record_id, record.values_of(schema.gated_fields()));
    RecordState {
      schema: Arc::new(schema),
      record,
      draft: Some(draft),
      has_approved_version: approved,
    }
  }

  #[test]
  fn no_draft_means_nothing_pending() {
    let mut s = state(true);
    s.draft = None;
    assert!(pending_changes(&s).is_empty());
  }

  #[test]
  fn only_differing_fields_are_pending() {
    let mut s = state(true);
    s.draft.as_mut().unwrap().set("status", json!("active"));

    let changes = pending_changes(&s);
    assert_eq!(changes.len(), 1);
    assert_eq!(changes["status"], PendingChange::new(json!("new"), json!("active")));
    assert_eq!(proposed_values(&s)["status"], json!("active"));
  }

  #[test]
  fn never_approved_reports_every_field_with_null_was() {
    let s = state(false);
    let changes = pending_changes(&s);
    assert_eq!(changes.len(), 2);
    assert_eq!(changes["name"], PendingChange::new(Value::Null, json!("Dan")));
    assert_eq!(changes["status"], PendingChange::new(Value::Null, json!("new")));
  }

  #[test]
  fn computing_twice_is_stable() {
    let mut s = state(true);
    s.draft.as_mut().unwrap().set("name", json!("Other"));
    assert_eq!(pending_changes(&s), pending_changes(&s));
    assert!(s.has_pending_changes());
  }
}
