//! SQL schema for the vetted SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS records (
    record_id    TEXT PRIMARY KEY,
    record_type  TEXT NOT NULL,
    attributes   TEXT NOT NULL DEFAULT '{}',  -- JSON object, live values
    is_frozen    INTEGER NOT NULL DEFAULT 1,
    is_deleted   INTEGER NOT NULL DEFAULT 0,
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL
);

-- One row per version. is_approved = 0 marks the draft.
CREATE TABLE IF NOT EXISTS versions (
    version_id   TEXT PRIMARY KEY,
    record_id    TEXT NOT NULL REFERENCES records(record_id),
    value_json   TEXT NOT NULL,               -- JSON object, gated values
    is_approved  INTEGER NOT NULL DEFAULT 0,
    created_at   TEXT NOT NULL,
    approved_at  TEXT
);

-- At most one draft per record.
CREATE UNIQUE INDEX IF NOT EXISTS versions_one_draft_idx
    ON versions(record_id) WHERE is_approved = 0;

CREATE INDEX IF NOT EXISTS versions_record_idx ON versions(record_id);
CREATE INDEX IF NOT EXISTS records_type_idx    ON records(record_type);

-- Approved versions are history: never rewritten, never removed.
CREATE TRIGGER IF NOT EXISTS versions_history_immutable
BEFORE UPDATE ON versions WHEN OLD.is_approved = 1
BEGIN
    SELECT RAISE(ABORT, 'approved versions are immutable');
END;

CREATE TRIGGER IF NOT EXISTS versions_history_undeletable
BEFORE DELETE ON versions WHEN OLD.is_approved = 1
BEGIN
    SELECT RAISE(ABORT, 'approved versions cannot be deleted');
END;

PRAGMA user_version = 1;
";
