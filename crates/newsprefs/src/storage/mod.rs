//! Key-value storage backends.
//!
//! A backend holds raw string values under string keys, scoped to one
//! namespace. Every value carries a revision that increases on each write so
//! callers can do optimistic read-modify-write cycles. A key's revision never
//! goes backwards, not even when the key is removed and written again.

pub mod memory;
pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};

pub use memory::MemoryStore;

/// A value as it sits in the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredValue {
    /// The raw stored text.
    pub value: String,
    /// Revision of this value. The first write of a key is revision 1.
    pub revision: u64,
    /// When the value was last written.
    pub updated_at: DateTime<Utc>,
}

/// Result of a compare-and-swap write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The value was stored under the given revision.
    Written {
        /// The revision now stored.
        revision: u64,
    },
    /// The stored revision did not match the expected one.
    Conflict {
        /// The revision actually stored, if the key exists.
        current: Option<u64>,
    },
}

/// Durable, namespace-scoped raw key-value storage.
pub trait KeyValueStore {
    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn read(&self, key: &str) -> Result<Option<StoredValue>>;

    /// Store `value` under `key` if the stored revision equals `expected`.
    ///
    /// `expected = None` means the key must not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written. A revision mismatch
    /// is not an error; it is reported as [`WriteOutcome::Conflict`].
    fn write(&self, key: &str, value: &str, expected: Option<u64>) -> Result<WriteOutcome>;

    /// Delete `key`. Returns `true` if it existed.
    ///
    /// The key reads as absent afterwards, but its next write continues from
    /// the removed revision instead of restarting at 1.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn remove(&self, key: &str) -> Result<bool>;

    /// Human-readable location of the backend, for status output.
    fn describe(&self) -> String;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for &T {
    fn read(&self, key: &str) -> Result<Option<StoredValue>> {
        (**self).read(key)
    }

    fn write(&self, key: &str, value: &str, expected: Option<u64>) -> Result<WriteOutcome> {
        (**self).write(key, value, expected)
    }

    fn remove(&self, key: &str) -> Result<bool> {
        (**self).remove(key)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Box<T> {
    fn read(&self, key: &str) -> Result<Option<StoredValue>> {
        (**self).read(key)
    }

    fn write(&self, key: &str, value: &str, expected: Option<u64>) -> Result<WriteOutcome> {
        (**self).write(key, value, expected)
    }

    fn remove(&self, key: &str) -> Result<bool> {
        (**self).remove(key)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// `SQLite`-backed store.
///
/// Several handles (in this or other processes) may open the same database
/// file; the revision check in [`KeyValueStore::write`] keeps their updates
/// from silently overwriting each other.
#[derive(Debug)]
pub struct SqliteStore {
    /// Path to the database file.
    path: PathBuf,
    /// Namespace every key is scoped to.
    namespace: String,
    /// Database connection.
    conn: Connection,
}

impl SqliteStore {
    /// Open or create a database at `path`, scoped to `namespace`.
    ///
    /// Creates the parent directories and database file if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>, namespace: impl Into<String>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening preference database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        let store = Self {
            path,
            namespace: namespace.into(),
            conn,
        };
        info!(
            "Preference database ready at {} (namespace '{}')",
            store.path.display(),
            store.namespace
        );
        Ok(store)
    }

    /// Open the database described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = Self::open(config.database_path(), config.storage.namespace.clone())?;
        store.set_busy_timeout(config.busy_timeout())?;
        Ok(store)
    }

    /// Create an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory(namespace: impl Into<String>) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            namespace: namespace.into(),
            conn,
        })
    }

    /// How long to wait on a lock held by another connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the timeout cannot be applied.
    pub fn set_busy_timeout(&self, timeout: Duration) -> Result<()> {
        self.conn.busy_timeout(timeout)?;
        Ok(())
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the namespace this handle is scoped to.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// List the keys stored in this namespace.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn keys(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key FROM entries WHERE namespace = ?1 AND deleted = 0 ORDER BY key")?;
        let keys = stmt
            .query_map([&self.namespace], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(keys)
    }

    fn row_to_value(row: &rusqlite::Row) -> rusqlite::Result<StoredValue> {
        let value: String = row.get(0)?;
        let revision: i64 = row.get(1)?;
        let updated_at_str: String = row.get(2)?;

        let updated_at = DateTime::parse_from_rfc3339(&updated_at_str).map_or_else(
            |_| {
                warn!("Unparseable updated_at '{}', using now", updated_at_str);
                Utc::now()
            },
            |dt| dt.with_timezone(&Utc),
        );

        Ok(StoredValue {
            value,
            revision: u64::try_from(revision).unwrap_or(0),
            updated_at,
        })
    }
}

impl KeyValueStore for SqliteStore {
    fn read(&self, key: &str) -> Result<Option<StoredValue>> {
        let stored = self
            .conn
            .query_row(
                r"
                SELECT value, revision, updated_at
                FROM entries WHERE namespace = ?1 AND key = ?2 AND deleted = 0
                ",
                params![self.namespace, key],
                Self::row_to_value,
            )
            .optional()?;
        Ok(stored)
    }

    fn write(&self, key: &str, value: &str, expected: Option<u64>) -> Result<WriteOutcome> {
        let now = Utc::now().to_rfc3339();

        // A tombstoned row counts as absent, but its revision carries on.
        let written: Option<i64> = match expected {
            None => self
                .conn
                .query_row(
                    r"
                    INSERT INTO entries (namespace, key, value, revision, updated_at, deleted)
                    VALUES (?1, ?2, ?3, 1, ?4, 0)
                    ON CONFLICT (namespace, key) DO UPDATE
                        SET value = excluded.value, revision = entries.revision + 1,
                            updated_at = excluded.updated_at, deleted = 0
                        WHERE entries.deleted = 1
                    RETURNING revision
                    ",
                    params![self.namespace, key, value, now],
                    |row| row.get(0),
                )
                .optional()?,
            Some(revision) => {
                let revision = i64::try_from(revision)
                    .map_err(|_| Error::internal(format!("revision {revision} out of range")))?;
                self.conn
                    .query_row(
                        r"
                        UPDATE entries SET value = ?3, revision = revision + 1, updated_at = ?4
                        WHERE namespace = ?1 AND key = ?2 AND revision = ?5 AND deleted = 0
                        RETURNING revision
                        ",
                        params![self.namespace, key, value, now, revision],
                        |row| row.get(0),
                    )
                    .optional()?
            }
        };

        let Some(revision) = written else {
            let current = self.read(key)?.map(|stored| stored.revision);
            debug!(
                "Revision mismatch writing '{}': expected {:?}, found {:?}",
                key, expected, current
            );
            return Ok(WriteOutcome::Conflict { current });
        };

        let revision = u64::try_from(revision)
            .map_err(|_| Error::internal(format!("stored revision {revision} is negative")))?;
        debug!("Wrote '{}' at revision {}", key, revision);
        Ok(WriteOutcome::Written { revision })
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let affected = self.conn.execute(
            r"
            UPDATE entries SET value = '', deleted = 1, revision = revision + 1, updated_at = ?3
            WHERE namespace = ?1 AND key = ?2 AND deleted = 0
            ",
            params![self.namespace, key, Utc::now().to_rfc3339()],
        )?;
        Ok(affected > 0)
    }

    fn describe(&self) -> String {
        format!("sqlite:{}#{}", self.path.display(), self.namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_store() -> SqliteStore {
        SqliteStore::open_in_memory("test").expect("failed to create test store")
    }

    fn temp_db_path(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "newsprefs_{label}_{}.db",
            std::process::id()
        ))
    }

    fn remove_db(path: &Path) {
        let _ = std::fs::remove_file(path);
        let _ = std::fs::remove_file(path.with_extension("db-wal"));
        let _ = std::fs::remove_file(path.with_extension("db-shm"));
    }

    #[test]
    fn test_open_in_memory() {
        let store = SqliteStore::open_in_memory("test");
        assert!(store.is_ok());
    }

    #[test]
    fn test_read_missing() {
        let store = create_test_store();
        assert!(store.read("newsPreferences").unwrap().is_none());
    }

    #[test]
    fn test_insert_and_read() {
        let store = create_test_store();
        let outcome = store.write("newsPreferences", r#"{"theme":"dark"}"#, None).unwrap();
        assert_eq!(outcome, WriteOutcome::Written { revision: 1 });

        let stored = store.read("newsPreferences").unwrap().unwrap();
        assert_eq!(stored.value, r#"{"theme":"dark"}"#);
        assert_eq!(stored.revision, 1);
    }

    #[test]
    fn test_insert_over_existing_conflicts() {
        let store = create_test_store();
        store.write("k", "first", None).unwrap();

        let outcome = store.write("k", "second", None).unwrap();
        assert_eq!(outcome, WriteOutcome::Conflict { current: Some(1) });
        assert_eq!(store.read("k").unwrap().unwrap().value, "first");
    }

    #[test]
    fn test_update_with_matching_revision() {
        let store = create_test_store();
        store.write("k", "one", None).unwrap();
        store.write("k", "two", Some(1)).unwrap();
        let outcome = store.write("k", "three", Some(2)).unwrap();

        assert_eq!(outcome, WriteOutcome::Written { revision: 3 });
        assert_eq!(store.read("k").unwrap().unwrap().value, "three");
    }

    #[test]
    fn test_update_with_stale_revision() {
        let store = create_test_store();
        store.write("k", "one", None).unwrap();
        store.write("k", "two", Some(1)).unwrap();

        let outcome = store.write("k", "stale", Some(1)).unwrap();
        assert_eq!(outcome, WriteOutcome::Conflict { current: Some(2) });
        assert_eq!(store.read("k").unwrap().unwrap().value, "two");
    }

    #[test]
    fn test_update_missing_key_conflicts() {
        let store = create_test_store();
        let outcome = store.write("k", "x", Some(4)).unwrap();
        assert_eq!(outcome, WriteOutcome::Conflict { current: None });
    }

    #[test]
    fn test_remove() {
        let store = create_test_store();
        store.write("k", "x", None).unwrap();

        assert!(store.remove("k").unwrap());
        assert!(!store.remove("k").unwrap());
        assert!(store.read("k").unwrap().is_none());
    }

    #[test]
    fn test_revisions_keep_counting_after_remove() {
        let store = create_test_store();
        store.write("k", "one", None).unwrap();
        assert!(store.remove("k").unwrap());
        assert!(store.keys().unwrap().is_empty());

        let outcome = store.write("k", "stale", Some(1)).unwrap();
        assert_eq!(outcome, WriteOutcome::Conflict { current: None });

        let outcome = store.write("k", "two", None).unwrap();
        assert_eq!(outcome, WriteOutcome::Written { revision: 3 });
        assert_eq!(store.read("k").unwrap().unwrap().revision, 3);

        let outcome = store.write("k", "stale", Some(1)).unwrap();
        assert_eq!(outcome, WriteOutcome::Conflict { current: Some(3) });
        assert_eq!(store.read("k").unwrap().unwrap().value, "two");
    }

    #[test]
    fn test_unicode_value() {
        let store = create_test_store();
        let value = r#"{"topics":["Ciencia","科学","🌍"]}"#;
        store.write("k", value, None).unwrap();
        assert_eq!(store.read("k").unwrap().unwrap().value, value);
    }

    #[test]
    fn test_describe_mentions_namespace() {
        let store = create_test_store();
        assert_eq!(store.describe(), "sqlite::memory:#test");
        assert_eq!(store.namespace(), "test");
        assert_eq!(store.path().to_string_lossy(), ":memory:");
    }

    #[test]
    fn test_namespaces_are_isolated() {
        let path = temp_db_path("namespaces");
        remove_db(&path);

        let alpha = SqliteStore::open(&path, "alpha").unwrap();
        let beta = SqliteStore::open(&path, "beta").unwrap();

        alpha.write("newsPreferences", "a", None).unwrap();
        assert!(beta.read("newsPreferences").unwrap().is_none());

        beta.write("newsPreferences", "b", None).unwrap();
        assert_eq!(alpha.read("newsPreferences").unwrap().unwrap().value, "a");
        assert_eq!(alpha.keys().unwrap(), vec!["newsPreferences".to_string()]);

        drop(alpha);
        drop(beta);
        remove_db(&path);
    }

    #[test]
    fn test_values_survive_reopen() {
        let path = temp_db_path("reopen");
        remove_db(&path);

        {
            let store = SqliteStore::open(&path, "test").unwrap();
            store.write("k", "persisted", None).unwrap();
        }

        let store = SqliteStore::open(&path, "test").unwrap();
        let stored = store.read("k").unwrap().unwrap();
        assert_eq!(stored.value, "persisted");
        assert_eq!(stored.revision, 1);

        drop(store);
        remove_db(&path);
    }

    #[test]
    fn test_second_handle_sees_conflict() {
        let path = temp_db_path("handles");
        remove_db(&path);

        let first = SqliteStore::open(&path, "test").unwrap();
        let second = SqliteStore::open(&path, "test").unwrap();

        first.write("k", "v1", None).unwrap();
        let seen = second.read("k").unwrap().unwrap().revision;
        first.write("k", "v2", Some(seen)).unwrap();

        let outcome = second.write("k", "late", Some(seen)).unwrap();
        assert_eq!(outcome, WriteOutcome::Conflict { current: Some(2) });

        drop(first);
        drop(second);
        remove_db(&path);
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let root = std::env::temp_dir().join(format!("newsprefs_dirs_{}", std::process::id()));
        let nested_path = root.join("nested/prefs.db");
        let _ = std::fs::remove_dir_all(&root);

        let store = SqliteStore::open(&nested_path, "test").unwrap();
        assert!(nested_path.exists());

        drop(store);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn test_boxed_store_delegates() {
        let boxed: Box<dyn KeyValueStore> = Box::new(create_test_store());
        boxed.write("k", "x", None).unwrap();
        assert_eq!(boxed.read("k").unwrap().unwrap().value, "x");
        assert!(boxed.describe().starts_with("sqlite:"));
    }
}
