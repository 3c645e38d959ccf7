//! The `RecordStore` trait and the write batch it commits.
//!
//! The trait is implemented by storage backends (e.g. `vetted-store-sqlite`).
//! The approval engine depends on this abstraction, not on any concrete
//! backend.

use std::future::Future;

use uuid::Uuid;

use crate::record::{Record, Version};

// ─── Write batch ─────────────────────────────────────────────────────────────

/// A single write against the versions table.
#[derive(Debug, Clone)]
pub enum VersionWrite {
  /// Insert the version, or overwrite it if the id already exists.
  Upsert(Version),
  /// Delete an unapproved version.
  Delete(Uuid),
}

/// Everything one engine operation writes. Applied atomically, in order:
/// the record first, then each version write as listed.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
  /// Insert or overwrite this record.
  pub record:   Option<Record>,
  pub versions: Vec<VersionWrite>,
}

impl WriteBatch {
  pub fn new() -> Self { Self::default() }

  pub fn record(mut self, record: Record) -> Self {
    self.record = Some(record);
    self
  }

  pub fn upsert(mut self, version: Version) -> Self {
    self.versions.push(VersionWrite::Upsert(version));
    self
  }

  pub fn delete(mut self, version_id: Uuid) -> Self {
    self.versions.push(VersionWrite::Delete(version_id));
    self
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a record store backend.
///
/// Implementations must apply a [`WriteBatch`] atomically: either every write
/// lands or none does. They should also refuse a batch that would leave a
/// record with more than one unapproved version.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait RecordStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Apply `batch` in a single transaction.
  fn commit(
    &self,
    batch: WriteBatch,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Retrieve a record by id. Returns `None` if not found.
  fn get_record(
    &self,
    record_id: Uuid,
  ) -> impl Future<Output = Result<Option<Record>, Self::Error>> + Send + '_;

  /// The record's single unapproved version, if any.
  fn get_draft(
    &self,
    record_id: Uuid,
  ) -> impl Future<Output = Result<Option<Version>, Self::Error>> + Send + '_;

  /// Every version of the record, oldest first.
  fn list_versions(
    &self,
    record_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Version>, Self::Error>> + Send + '_;

  /// Whether the record's history holds at least one approved version.
  fn has_approved_version(
    &self,
    record_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// All records of `record_type` that currently have a draft.
  fn list_unapproved<'a>(
    &'a self,
    record_type: &'a str,
  ) -> impl Future<Output = Result<Vec<Record>, Self::Error>> + Send + 'a;
}
