//! Draft lifecycle: creation, field writes, splitting on partial approval,
//! and reduction or disposal on denial.
//!
//! Every function here works on an in-memory [`RecordState`]; none of them
//! touch storage. The engine decides what to persist from the result.

use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use crate::{
  Error, Result,
  changes::{pending_changes, proposed_values},
  record::Version,
  state::RecordState,
};

/// Return the record's draft, creating one seeded from the live gated values
/// if none exists.
pub fn ensure_draft(state: &mut RecordState) -> &mut Version {
  let RecordState { schema, record, draft, .. } = state;
  draft.get_or_insert_with(|| {
    debug!(record_id = %record.record_id, "opening draft");
    Version::draft(record.record_id, record.values_of(schema.gated_fields()))
  })
}

/// Propose `value` for the gated `field`. The live value is left alone.
///
/// Writing the live value when no draft exists is a no-op, so an update that
/// changes nothing never opens a draft.
pub fn write_gated_field(
  state: &mut RecordState,
  field: &str,
  value: Value,
) -> Result<()> {
  if !state.schema.is_gated(field) {
    return Err(Error::NotGated(field.to_owned()));
  }
  if state.draft.is_none() && state.record.get(field) == &value {
    return Ok(());
  }
  ensure_draft(state).set(field, value);
  Ok(())
}

/// The outcome of [`finalize`].
#[derive(Debug, Clone)]
pub struct Finalized {
  /// The former draft, now history.
  pub approved: Version,
  /// A fresh draft carrying proposals that were not approved.
  pub draft:    Option<Version>,
}

/// Turn the current draft into history once `approved_fields` have been
/// copied onto the live record.
///
/// The action is total if no pending field lies outside `approved_fields`, or
/// if the record has never been approved. Otherwise the draft is rewritten to
/// hold the post-approval live values before being approved, and a new draft
/// is opened with the live values plus the outstanding proposals.
pub fn finalize(state: &mut RecordState, approved_fields: &[String]) -> Result<Finalized> {
  let record_id = state.record.record_id;

  let outstanding: Vec<(String, Value)> = if state.never_approved() {
    Vec::new()
  } else {
    proposed_values(state)
      .into_iter()
      .filter(|(field, _)| !approved_fields.contains(field))
      .collect()
  };

  let mut approved = state.draft.take().ok_or(Error::NoDraft(record_id))?;
  let now = Utc::now();
  state.has_approved_version = true;

  if outstanding.is_empty() {
    approved.approve(now);
    return Ok(Finalized { approved, draft: None });
  }

  let live = state.record.values_of(state.schema.gated_fields());
  approved.values = live.clone();
  approved.approve(now);

  let mut next = Version::draft(record_id, live);
  next.values.extend(outstanding);
  debug!(
    record_id = %record_id,
    outstanding = next.values.len(),
    "partial approval, carrying draft forward"
  );
  state.draft = Some(next.clone());

  Ok(Finalized { approved, draft: Some(next) })
}

/// Withdraw the proposals for `denied_fields` by resetting them to the live
/// values.
///
/// Returns the reduced draft, or `None` if nothing is left pending, in which
/// case the draft has been removed from `state`.
pub fn reduce_or_discard<'a>(
  state: &'a mut RecordState,
  denied_fields: &[String],
) -> Option<&'a Version> {
  let RecordState { record, draft, .. } = state;
  let draft = draft.as_mut()?;
  for field in denied_fields {
    draft.set(field.clone(), record.get(field).clone());
  }

  if pending_changes(state).is_empty() {
    state.draft = None;
    return None;
  }
  state.draft.as_ref()
}

/// Drop a draft that no longer proposes anything. Only applies to records
/// with approved history: a never-approved record always keeps its draft.
pub fn discard_if_unchanged(state: &mut RecordState) -> Option<Version> {
  if state.never_approved() || state.draft.is_none() || state.has_pending_changes() {
    return None;
  }
  state.draft.take()
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use serde_json::json;

  use super::*;
  use crate::{
    changes::PendingChange,
    record::Record,
    schema::{RecordSchema, RecordTypeConfig},
  };

  /// An approved record with `name = "Dan"`, `status = "new"` and no draft.
  fn approved() -> RecordState {
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
    RecordState {
      schema: Arc::new(schema),
      record,
      draft: None,
      has_approved_version: true,
    }
  }

  fn approve_fields(state: &mut RecordState, fields: &[&str]) -> Finalized {
    let fields: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
    let draft = state.draft.clone().unwrap();
    for f in &fields {
      state.record.set(f.clone(), draft.get(f).clone());
    }
    finalize(state, &fields).unwrap()
  }

  #[test]
  fn ensure_draft_seeds_from_live_values_and_is_idempotent() {
    let mut s = approved();
    let id = ensure_draft(&mut s).version_id;
    assert_eq!(s.draft.as_ref().unwrap().get("name"), &json!("Dan"));
    assert_eq!(ensure_draft(&mut s).version_id, id);
  }

  #[test]
  fn writing_live_value_opens_no_draft() {
    let mut s = approved();
    write_gated_field(&mut s, "name", json!("Dan")).unwrap();
    assert!(s.draft.is_none());
  }

  #[test]
  fn write_leaves_live_value_untouched() {
    let mut s = approved();
    write_gated_field(&mut s, "name", json!("Other")).unwrap();
    assert_eq!(s.record.get("name"), &json!("Dan"));
    assert_eq!(s.draft.as_ref().unwrap().get("name"), &json!("Other"));
  }

  #[test]
  fn write_to_ungated_field_is_refused() {
    let mut s = approved();
    let err = write_gated_field(&mut s, "note", json!("x")).unwrap_err();
    assert!(matches!(err, Error::NotGated(f) if f == "note"));
  }

  #[test]
  fn total_approval_leaves_no_draft() {
    let mut s = approved();
    write_gated_field(&mut s, "status", json!("active")).unwrap();
    let id = s.draft.as_ref().unwrap().version_id;

    let out = approve_fields(&mut s, &["status"]);
    assert_eq!(out.approved.version_id, id);
    assert!(out.approved.is_approved);
    assert!(out.approved.approved_at.is_some());
    assert!(out.draft.is_none());
    assert!(s.draft.is_none());
  }

  #[test]
  fn partial_approval_splits_the_draft() {
    let mut s = approved();
    write_gated_field(&mut s, "name", json!("New")).unwrap();
    write_gated_field(&mut s, "status", json!("active")).unwrap();

    let out = approve_fields(&mut s, &["name"]);
    assert_eq!(out.approved.get("name"), &json!("New"));
    assert_eq!(out.approved.get("status"), &json!("new"));

    let next = out.draft.unwrap();
    assert!(next.is_draft());
    assert_ne!(next.version_id, out.approved.version_id);
    assert_eq!(s.pending_changes().len(), 1);
    assert_eq!(
      s.pending_changes()["status"],
      PendingChange::new(json!("new"), json!("active"))
    );
  }

  #[test]
  fn never_approved_finalize_is_total() {
    let mut s = approved();
    s.has_approved_version = false;
    write_gated_field(&mut s, "name", json!("Dan")).unwrap();
    ensure_draft(&mut s).set("status", json!("other"));

    let out = approve_fields(&mut s, &["name"]);
    assert!(out.draft.is_none());
    assert!(s.has_approved_version);
  }

  #[test]
  fn partial_denial_reduces_draft() {
    let mut s = approved();
    write_gated_field(&mut s, "name", json!("Test")).unwrap();
    write_gated_field(&mut s, "status", json!("active")).unwrap();

    let kept = reduce_or_discard(&mut s, &["name".into()]).cloned();
    assert_eq!(kept.unwrap().get("name"), &json!("Dan"));
    assert_eq!(s.pending_changes().keys().collect::<Vec<_>>(), ["status"]);
  }

  #[test]
  fn full_denial_discards_draft() {
    let mut s = approved();
    write_gated_field(&mut s, "name", json!("Test")).unwrap();

    assert!(reduce_or_discard(&mut s, &["name".into()]).is_none());
    assert!(s.draft.is_none());
    assert_eq!(s.record.get("name"), &json!("Dan"));
  }

  #[test]
  fn reverting_a_proposal_discards_the_draft() {
    let mut s = approved();
    write_gated_field(&mut s, "name", json!("X")).unwrap();
    write_gated_field(&mut s, "name", json!("Dan")).unwrap();
    assert!(discard_if_unchanged(&mut s).is_some());
    assert!(s.draft.is_none());
  }
}
