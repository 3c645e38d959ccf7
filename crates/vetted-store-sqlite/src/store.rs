//! The SQLite implementation of [`RecordStore`].

use std::path::Path;

use rusqlite::OptionalExtension as _;
use tracing::debug;
use uuid::Uuid;

use vetted_core::{
  config::Settings,
  record::{Record, Version},
  store::{RecordStore, VersionWrite, WriteBatch},
};

use crate::{
  Result,
  encode::{RawRecord, RawVersion, encode_uuid},
  schema::SCHEMA,
};

/// A batch with every value already encoded, ready to move onto the
/// connection thread.
enum RawWrite {
  Upsert(RawVersion),
  Delete(String),
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A record store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open the store named by `settings.store_path`.
  pub async fn from_settings(settings: &Settings) -> Result<Self> {
    Self::open(&settings.store_path).await
  }

  /// Open an in-memory store, mostly for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run a query returning version rows for one record.
  async fn query_versions(&self, sql: &'static str, record_id: Uuid) -> Result<Vec<Version>> {
    let id_str = encode_uuid(record_id);

    let raws: Vec<RawVersion> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawVersion::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawVersion::into_version).collect()
  }
}

// ─── RecordStore impl ────────────────────────────────────────────────────────

impl RecordStore for SqliteStore {
  type Error = crate::Error;

  // ── Writes ────────────────────────────────────────────────────────────────

  async fn commit(&self, batch: WriteBatch) -> Result<()> {
    let record = batch.record.as_ref().map(RawRecord::from_record).transpose()?;
    let writes = batch
      .versions
      .iter()
      .map(|w| match w {
        VersionWrite::Upsert(v) => RawVersion::from_version(v).map(RawWrite::Upsert),
        VersionWrite::Delete(id) => Ok(RawWrite::Delete(encode_uuid(*id))),
      })
      .collect::<Result<Vec<_>>>()?;
    let write_count = writes.len();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        if let Some(r) = record {
          tx.execute(
            "INSERT INTO records (
               record_id, record_type, attributes, is_frozen, is_deleted,
               created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT (record_id) DO UPDATE SET
               attributes = excluded.attributes,
               is_frozen  = excluded.is_frozen,
               is_deleted = excluded.is_deleted,
               updated_at = excluded.updated_at",
            rusqlite::params![
              r.record_id,
              r.record_type,
              r.attributes,
              r.is_frozen,
              r.is_deleted,
              r.created_at,
              r.updated_at,
            ],
          )?;
        }

        for write in writes {
          match write {
            RawWrite::Upsert(v) => {
              tx.execute(
                "INSERT INTO versions (
                   version_id, record_id, value_json, is_approved,
                   created_at, approved_at
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT (version_id) DO UPDATE SET
                   value_json  = excluded.value_json,
                   is_approved = excluded.is_approved,
                   approved_at = excluded.approved_at",
                rusqlite::params![
                  v.version_id,
                  v.record_id,
                  v.value_json,
                  v.is_approved,
                  v.created_at,
                  v.approved_at,
                ],
              )?;
            }
            RawWrite::Delete(id) => {
              tx.execute(
                "DELETE FROM versions WHERE version_id = ?1",
                rusqlite::params![id],
              )?;
            }
          }
        }

        tx.commit()?;
        Ok(())
      })
      .await?;

    debug!(versions = write_count, "committed write batch");
    Ok(())
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn get_record(&self, record_id: Uuid) -> Result<Option<Record>> {
    let id_str = encode_uuid(record_id);

    let raw: Option<RawRecord> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT record_id, record_type, attributes, is_frozen, is_deleted,
                    created_at, updated_at
             FROM records WHERE record_id = ?1",
            rusqlite::params![id_str],
            RawRecord::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawRecord::into_record).transpose()
  }

  async fn get_draft(&self, record_id: Uuid) -> Result<Option<Version>> {
    let mut drafts = self
      .query_versions(
        "SELECT version_id, record_id, value_json, is_approved, created_at, approved_at
         FROM versions WHERE record_id = ?1 AND is_approved = 0",
        record_id,
      )
      .await?;
    Ok(drafts.pop())
  }

  async fn list_versions(&self, record_id: Uuid) -> Result<Vec<Version>> {
    self
      .query_versions(
        "SELECT version_id, record_id, value_json, is_approved, created_at, approved_at
         FROM versions WHERE record_id = ?1
         ORDER BY created_at, rowid",
        record_id,
      )
      .await
  }

  async fn has_approved_version(&self, record_id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(record_id);

    let exists: bool = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT EXISTS (
             SELECT 1 FROM versions WHERE record_id = ?1 AND is_approved = 1
           )",
          rusqlite::params![id_str],
          |row| row.get(0),
        )?)
      })
      .await?;

    Ok(exists)
  }

  async fn list_unapproved(&self, record_type: &str) -> Result<Vec<Record>> {
    let record_type = record_type.to_owned();

    let raws: Vec<RawRecord> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT r.record_id, r.record_type, r.attributes, r.is_frozen,
                  r.is_deleted, r.created_at, r.updated_at
           FROM records r
           JOIN versions v ON v.record_id = r.record_id AND v.is_approved = 0
           WHERE r.record_type = ?1
           ORDER BY r.created_at, r.rowid",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![record_type], RawRecord::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRecord::into_record).collect()
  }
}
