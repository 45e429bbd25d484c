//! `SQLite` schema definitions for the preference store.

/// SQL statement to create the entries table.
///
/// Each row is one value in one namespace. `revision` increases by one on
/// every successful write and backs the compare-and-swap in
/// [`super::SqliteStore`].
pub const CREATE_ENTRIES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS entries (
    namespace TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    revision INTEGER NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (namespace, key)
)
";

/// Schema version 2: removed keys stay behind as tombstones so their
/// revision keeps increasing across a remove and a later re-insert.
pub const ADD_DELETED_COLUMN: &str = r"
ALTER TABLE entries ADD COLUMN deleted INTEGER NOT NULL DEFAULT 0
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// Base (version 1) schema creation statements in order. Later versions are
/// applied by [`super::migrations`].
pub const SCHEMA_STATEMENTS: &[&str] = &[CREATE_ENTRIES_TABLE, CREATE_METADATA_TABLE];
