//! The approval workflow over a [`RecordStore`].
//!
//! Every mutating operation follows the same shape: take the record's lock,
//! load a [`RecordState`], run the draft logic on it in memory, validate, and
//! commit the outcome as one [`WriteBatch`]. Nothing reaches the store until
//! the whole operation has succeeded, so a failed commit leaves the previous
//! state intact.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex, PoisonError},
};

use chrono::Utc;
use serde_json::Value;
use tokio::sync::{Mutex as RecordLock, OwnedMutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  changes::PendingChanges,
  draft,
  record::{Attributes, Record, Version},
  schema::{RecordSchema, Registry},
  state::RecordState,
  store::{RecordStore, WriteBatch},
  validate::validate_values,
};

fn store_err<E>(e: E) -> Error
where
  E: std::error::Error + Send + Sync + 'static,
{
  Error::Store(Box::new(e))
}

/// Drives records of every configured type through the approval workflow.
///
/// Mutations on one record are serialised by a per-record lock; reads go
/// straight to the store.
pub struct Engine<S: RecordStore> {
  store:    Arc<S>,
  registry: Arc<Registry>,
  locks:    Mutex<HashMap<Uuid, Arc<RecordLock<()>>>>,
}

impl<S: RecordStore> Engine<S> {
  pub fn new(store: Arc<S>, registry: Arc<Registry>) -> Self {
    Self { store, registry, locks: Mutex::new(HashMap::new()) }
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  async fn lock(&self, record_id: Uuid) -> OwnedMutexGuard<()> {
    let lock = {
      let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
      // Entries only the table refers to are idle.
      locks.retain(|_, l| Arc::strong_count(l) > 1);
      locks.entry(record_id).or_default().clone()
    };
    lock.lock_owned().await
  }

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Load the committed state of a record.
  pub async fn load(&self, record_id: Uuid) -> Result<RecordState> {
    let record = self
      .store
      .get_record(record_id)
      .await
      .map_err(store_err)?
      .ok_or(Error::RecordNotFound(record_id))?;
    let schema = self.registry.get(&record.record_type)?.clone();
    let draft = self.store.get_draft(record_id).await.map_err(store_err)?;
    let has_approved_version = self
      .store
      .has_approved_version(record_id)
      .await
      .map_err(store_err)?;

    Ok(RecordState { schema, record, draft, has_approved_version })
  }

  pub async fn pending_changes(&self, record_id: Uuid) -> Result<PendingChanges> {
    Ok(self.load(record_id).await?.pending_changes())
  }

  pub async fn has_pending_changes(&self, record_id: Uuid) -> Result<bool> {
    Ok(self.load(record_id).await?.has_pending_changes())
  }

  pub async fn has_approved_version(&self, record_id: Uuid) -> Result<bool> {
    self
      .store
      .has_approved_version(record_id)
      .await
      .map_err(store_err)
  }

  pub async fn never_approved(&self, record_id: Uuid) -> Result<bool> {
    Ok(!self.has_approved_version(record_id).await?)
  }

  pub async fn is_first_version(&self, record_id: Uuid) -> Result<bool> {
    Ok(self.load(record_id).await?.is_first_version())
  }

  /// Every version of the record, oldest first.
  pub async fn versions(&self, record_id: Uuid) -> Result<Vec<Version>> {
    self.store.list_versions(record_id).await.map_err(store_err)
  }

  /// The record's approved history, oldest first.
  pub async fn approved_versions(&self, record_id: Uuid) -> Result<Vec<Version>> {
    let mut versions = self.versions(record_id).await?;
    versions.retain(|v| v.is_approved);
    Ok(versions)
  }

  /// Records of `record_type` that are awaiting review.
  pub async fn unapproved(&self, record_type: &str) -> Result<Vec<Record>> {
    self.registry.get(record_type)?;
    self
      .store
      .list_unapproved(record_type)
      .await
      .map_err(store_err)
  }

  // ── Writes ────────────────────────────────────────────────────────────

  /// Create a record. Ungated attributes are stored directly; gated ones go
  /// into the record's initial draft, which is created even if none are
  /// given.
  pub async fn create(
    &self,
    record_type: &str,
    attributes: Attributes,
  ) -> Result<RecordState> {
    let schema = self.registry.get(record_type)?.clone();
    let (ungated, gated) = schema.split(attributes)?;

    let mut record = Record::new(schema.name());
    record.attributes = ungated;

    let values = schema
      .gated_fields()
      .iter()
      .map(|f| (f.clone(), gated.get(f).cloned().unwrap_or(Value::Null)))
      .collect();
    let draft = Version::draft(record.record_id, values);
    validate_values(&schema, &draft.values)?;

    let record_id = record.record_id;
    self
      .store
      .commit(WriteBatch::new().record(record).upsert(draft))
      .await
      .map_err(store_err)?;
    info!(%record_id, record_type, "record created");

    self.load(record_id).await
  }

  /// Write `attributes` to a record. Ungated values take effect immediately;
  /// gated values are proposed on the draft.
  pub async fn update(
    &self,
    record_id: Uuid,
    attributes: Attributes,
  ) -> Result<RecordState> {
    let _guard = self.lock(record_id).await;
    let (mut state, persisted) = self.load_for_write(record_id).await?;
    let (ungated, gated) = state.schema.split(attributes)?;

    state.record.attributes.extend(ungated);
    for (field, value) in gated {
      draft::write_gated_field(&mut state, &field, value)?;
    }
    self.commit_write(state, persisted).await
  }

  /// Propose a value for one gated field.
  pub async fn write_gated_field(
    &self,
    record_id: Uuid,
    field: &str,
    value: Value,
  ) -> Result<RecordState> {
    let _guard = self.lock(record_id).await;
    let (mut state, persisted) = self.load_for_write(record_id).await?;
    draft::write_gated_field(&mut state, field, value)?;
    self.commit_write(state, persisted).await
  }

  pub async fn set_frozen(&self, record_id: Uuid, frozen: bool) -> Result<RecordState> {
    let _guard = self.lock(record_id).await;
    let (mut state, persisted) = self.load_for_write(record_id).await?;
    state.record.is_frozen = frozen;
    self.commit_write(state, persisted).await
  }

  /// Set the soft-delete marker. History and any draft are kept.
  pub async fn mark_deleted(&self, record_id: Uuid) -> Result<RecordState> {
    let _guard = self.lock(record_id).await;
    let (mut state, persisted) = self.load_for_write(record_id).await?;
    state.record.is_deleted = true;
    self.commit_write(state, persisted).await
  }

  /// Load a state to mutate, along with the id of its stored draft.
  async fn load_for_write(&self, record_id: Uuid) -> Result<(RecordState, Option<Uuid>)> {
    let state = self.load(record_id).await?;
    let persisted = state.draft.as_ref().map(|d| d.version_id);
    Ok((state, persisted))
  }

  /// Persist a state produced by a host write. The caller holds the lock.
  async fn commit_write(
    &self,
    mut state: RecordState,
    persisted_draft: Option<Uuid>,
  ) -> Result<RecordState> {
    let record_id = state.record.record_id;
    let mut batch = WriteBatch::new();
    if let Some(stale) = draft::discard_if_unchanged(&mut state) {
      debug!(%record_id, "draft no longer proposes anything, discarding");
      if persisted_draft == Some(stale.version_id) {
        batch = batch.delete(stale.version_id);
      }
    }
    if let Some(d) = &state.draft {
      validate_values(&state.schema, &d.values)?;
      batch = batch.upsert(d.clone());
    }

    state.record.updated_at = Utc::now();
    let batch = WriteBatch { record: Some(state.record), ..batch };
    self.store.commit(batch).await.map_err(store_err)?;

    self.load(record_id).await
  }

  // ── Approval ──────────────────────────────────────────────────────────

  /// Approve every gated field.
  pub async fn approve_all(&self, record_id: Uuid) -> Result<bool> {
    let schema = self.schema_of(record_id).await?;
    self.approve(record_id, schema.gated_fields()).await
  }

  /// Approve the proposals for `fields`.
  ///
  /// Returns `Ok(true)` on success, including when nothing was pending, and
  /// `Ok(false)` if the resulting state fails validation or cannot be
  /// committed; in that case nothing has changed.
  pub async fn approve<F: AsRef<str>>(&self, record_id: Uuid, fields: &[F]) -> Result<bool> {
    let _guard = self.lock(record_id).await;
    let mut state = self.load(record_id).await?;
    let fields = state.schema.check_gated(fields)?;

    if !state.has_pending_changes() {
      debug!(%record_id, "nothing pending, approval is a no-op");
      return Ok(true);
    }
    if state.never_approved() && !state.schema.covers_all_gated(&fields) {
      return Err(Error::PartialApprovalForNewObject);
    }

    let proposal = state.draft.clone().ok_or(Error::NoDraft(record_id))?;
    for field in &fields {
      state.record.set(field.clone(), proposal.get(field).clone());
    }

    let finalized = draft::finalize(&mut state, &fields)?;
    state.record.is_frozen = false;
    state.record.updated_at = Utc::now();

    let check = validate_values(&state.schema, &finalized.approved.values).and_then(|()| {
      finalized
        .draft
        .as_ref()
        .map_or(Ok(()), |d| validate_values(&state.schema, &d.values))
    });
    if let Err(errors) = check {
      warn!(%record_id, %errors, "approved state is invalid, draft left in place");
      return Ok(false);
    }

    let mut batch = WriteBatch::new()
      .record(state.record)
      .upsert(finalized.approved);
    if let Some(next) = finalized.draft {
      batch = batch.upsert(next);
    }
    if let Err(e) = self.store.commit(batch).await {
      warn!(%record_id, error = %e, "failed to commit approval");
      return Ok(false);
    }

    info!(%record_id, fields = ?fields, "approved");
    Ok(true)
  }

  /// Deny every gated field.
  pub async fn deny_all(&self, record_id: Uuid) -> Result<bool> {
    let schema = self.schema_of(record_id).await?;
    self.deny(record_id, schema.gated_fields()).await
  }

  /// Withdraw the proposals for `fields`.
  ///
  /// A draft left with nothing pending is deleted and the record unfrozen.
  /// Returns `Ok(false)` if the change cannot be committed.
  pub async fn deny<F: AsRef<str>>(&self, record_id: Uuid, fields: &[F]) -> Result<bool> {
    let _guard = self.lock(record_id).await;
    let mut state = self.load(record_id).await?;
    let fields = state.schema.check_gated(fields)?;

    if state.never_approved() {
      return Err(Error::DenyingNeverApproved);
    }
    let Some(draft_id) = state.draft.as_ref().map(|d| d.version_id) else {
      debug!(%record_id, "no draft, denial is a no-op");
      return Ok(true);
    };

    let batch = match draft::reduce_or_discard(&mut state, &fields).cloned() {
      Some(reduced) => WriteBatch::new().upsert(reduced),
      None => {
        state.record.is_frozen = false;
        state.record.updated_at = Utc::now();
        WriteBatch::new().record(state.record).delete(draft_id)
      }
    };
    if let Err(e) = self.store.commit(batch).await {
      warn!(%record_id, error = %e, "failed to commit denial");
      return Ok(false);
    }

    info!(%record_id, fields = ?fields, "denied");
    Ok(true)
  }

  async fn schema_of(&self, record_id: Uuid) -> Result<Arc<RecordSchema>> {
    let record = self
      .store
      .get_record(record_id)
      .await
      .map_err(store_err)?
      .ok_or(Error::RecordNotFound(record_id))?;
    Ok(self.registry.get(&record.record_type)?.clone())
  }
}
