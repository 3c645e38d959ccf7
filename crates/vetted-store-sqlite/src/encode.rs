//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microsecond
//! precision) so they sort lexically. Attribute maps are stored as compact
//! JSON objects. UUIDs are stored as hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use uuid::Uuid;
use vetted_core::record::{Attributes, Record, Version};

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Attributes ──────────────────────────────────────────────────────────────

pub fn encode_attributes(attrs: &Attributes) -> Result<String> {
  Ok(serde_json::to_string(attrs)?)
}

pub fn decode_attributes(s: &str, column: &'static str) -> Result<Attributes> {
  match serde_json::from_str::<Value>(s)? {
    Value::Object(map) => Ok(map.into_iter().collect()),
    _ => Err(Error::NotAnObject(column)),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw column values of a `records` row.
pub struct RawRecord {
  pub record_id:   String,
  pub record_type: String,
  pub attributes:  String,
  pub is_frozen:   bool,
  pub is_deleted:  bool,
  pub created_at:  String,
  pub updated_at:  String,
}

impl RawRecord {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      record_id:   row.get(0)?,
      record_type: row.get(1)?,
      attributes:  row.get(2)?,
      is_frozen:   row.get(3)?,
      is_deleted:  row.get(4)?,
      created_at:  row.get(5)?,
      updated_at:  row.get(6)?,
    })
  }

  pub fn from_record(record: &Record) -> Result<Self> {
    Ok(Self {
      record_id:   encode_uuid(record.record_id),
      record_type: record.record_type.clone(),
      attributes:  encode_attributes(&record.attributes)?,
      is_frozen:   record.is_frozen,
      is_deleted:  record.is_deleted,
      created_at:  encode_dt(record.created_at),
      updated_at:  encode_dt(record.updated_at),
    })
  }

  pub fn into_record(self) -> Result<Record> {
    Ok(Record {
      record_id:   decode_uuid(&self.record_id)?,
      record_type: self.record_type,
      attributes:  decode_attributes(&self.attributes, "records.attributes")?,
      is_frozen:   self.is_frozen,
      is_deleted:  self.is_deleted,
      created_at:  decode_dt(&self.created_at)?,
      updated_at:  decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw column values of a `versions` row.
pub struct RawVersion {
  pub version_id:  String,
  pub record_id:   String,
  pub value_json:  String,
  pub is_approved: bool,
  pub created_at:  String,
  pub approved_at: Option<String>,
}

impl RawVersion {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      version_id:  row.get(0)?,
      record_id:   row.get(1)?,
      value_json:  row.get(2)?,
      is_approved: row.get(3)?,
      created_at:  row.get(4)?,
      approved_at: row.get(5)?,
    })
  }

  pub fn from_version(version: &Version) -> Result<Self> {
    Ok(Self {
      version_id:  encode_uuid(version.version_id),
      record_id:   encode_uuid(version.record_id),
      value_json:  encode_attributes(&version.values)?,
      is_approved: version.is_approved,
      created_at:  encode_dt(version.created_at),
      approved_at: version.approved_at.map(encode_dt),
    })
  }

  pub fn into_version(self) -> Result<Version> {
    Ok(Version {
      version_id:  decode_uuid(&self.version_id)?,
      record_id:   decode_uuid(&self.record_id)?,
      values:      decode_attributes(&self.value_json, "versions.value_json")?,
      is_approved: self.is_approved,
      created_at:  decode_dt(&self.created_at)?,
      approved_at: self.approved_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}
