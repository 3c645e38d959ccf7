//! A record together with everything the state machine
//! needs to reason about it.

use std::sync::Arc;

use crate::{
  changes::{self, PendingChanges},
  record::{Record, Version},
  schema::RecordSchema,
};

/// A consistent read of one record: its live attributes, its draft (if any),
/// and whether its history holds at least one approved version.
///
/// All draft and approval logic operates on this value in memory; the engine
/// loads it, mutates a copy, and commits the result as one write batch.
#[derive(Debug, Clone)]
pub struct RecordState {
  pub schema:               Arc<RecordSchema>,
  pub record:               Record,
  pub draft:                Option<Version>,
  pub has_approved_version: bool,
}

impl RecordState {
  /// The gated fields whose draft value differs from the live value.
  pub fn pending_changes(&self) -> PendingChanges { changes::pending_changes(self) }

  pub fn has_pending_changes(&self) -> bool { !self.pending_changes().is_empty() }

  pub fn has_approved_version(&self) -> bool { self.has_approved_version }

  pub fn never_approved(&self) -> bool { !self.has_approved_version }

  /// True while the current draft would become the record's first approved
  /// version.
  pub fn is_first_version(&self) -> bool {
    self.never_approved() && self.draft.is_some()
  }
}
