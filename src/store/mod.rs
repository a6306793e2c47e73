//! Option record persistence.
//!
//! The store is a key-value collaborator: records are keyed by `pk` and
//! carry an ISO-8601 expiry timestamp. The expiry scan compares timestamps
//! as RFC 3339 strings (fixed-width UTC), matching the upstream indexer's
//! string-filter semantics, so every writer must use [`OptionRecord::expiry_string`]
//! formatting.

use crate::error::StoreError;
use anyhow::Context;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

/// A persisted option position awaiting expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionRecord {
    /// Unique option identifier (primary key)
    pub pk: String,
    /// When the option expires
    pub expiry_date: DateTime<Utc>,
}

impl OptionRecord {
    pub fn new(pk: &str, expiry_date: DateTime<Utc>) -> Self {
        Self {
            pk: pk.to_string(),
            expiry_date,
        }
    }

    /// Canonical on-disk expiry encoding.
    pub fn expiry_string(&self) -> String {
        format_expiry(self.expiry_date)
    }
}

fn format_expiry(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Key-value store holding option records.
///
/// `delete` of an absent key is a benign no-op so that concurrent sweeps
/// racing on the same expired record cannot fail each other.
#[cfg_attr(test, mockall::automock)]
pub trait OptionStore: Send + Sync {
    /// Insert or replace a record.
    fn put(&self, record: &OptionRecord) -> Result<(), StoreError>;

    /// Ids of all records with `expiry_date < now`, in scan order.
    ///
    /// Full-table predicate scan; acceptable at expected volumes.
    fn scan_expired(&self, now: DateTime<Utc>) -> Result<Vec<String>, StoreError>;

    /// Remove a record by id.
    fn delete(&self, pk: &str) -> Result<(), StoreError>;

    /// All records, for inspection tooling.
    fn list(&self) -> Result<Vec<OptionRecord>, StoreError>;
}

/// SQLite-backed option store.
pub struct SqliteOptionStore {
    conn: Mutex<Connection>,
    table: String,
}

impl SqliteOptionStore {
    /// Open (and initialize if needed) the store at the given path.
    ///
    /// `table` must be a plain identifier; it is validated by config before
    /// it reaches this constructor.
    pub fn new<P: AsRef<Path>>(db_path: P, table: &str) -> anyhow::Result<Self> {
        let conn = Connection::open(db_path.as_ref())
            .with_context(|| format!("Failed to open database at {:?}", db_path.as_ref()))?;

        let store = Self {
            conn: Mutex::new(conn),
            table: table.to_string(),
        };
        store.init_schema()?;

        info!("Option store initialized at {:?}", db_path.as_ref());
        Ok(store)
    }

    fn init_schema(&self) -> anyhow::Result<()> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                pk TEXT PRIMARY KEY,
                expiry_date TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_{table}_expiry ON {table}(expiry_date);
            "#,
            table = self.table
        ))?;

        debug!("Option store schema initialized");
        Ok(())
    }
}

impl OptionStore for SqliteOptionStore {
    fn put(&self, record: &OptionRecord) -> Result<(), StoreError> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.execute(
            &format!(
                "INSERT INTO {} (pk, expiry_date) VALUES (?1, ?2)
                 ON CONFLICT(pk) DO UPDATE SET expiry_date = ?2",
                self.table
            ),
            params![record.pk, record.expiry_string()],
        )
        .map_err(|e| StoreError::WriteFailed(e.into()))?;
        Ok(())
    }

    fn scan_expired(&self, now: DateTime<Utc>) -> Result<Vec<String>, StoreError> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let mut stmt = conn
            .prepare(&format!(
                "SELECT pk FROM {} WHERE expiry_date < ?1",
                self.table
            ))
            .map_err(|e| StoreError::ScanFailed(e.into()))?;

        let ids = stmt
            .query_map(params![format_expiry(now)], |row| row.get::<_, String>(0))
            .map_err(|e| StoreError::ScanFailed(e.into()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::ScanFailed(e.into()))?;

        Ok(ids)
    }

    fn delete(&self, pk: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        // Zero rows affected means the record was already gone; not an error.
        conn.execute(
            &format!("DELETE FROM {} WHERE pk = ?1", self.table),
            params![pk],
        )
        .map_err(|e| StoreError::DeleteFailed(e.into()))?;
        Ok(())
    }

    fn list(&self) -> Result<Vec<OptionRecord>, StoreError> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let mut stmt = conn
            .prepare(&format!(
                "SELECT pk, expiry_date FROM {} ORDER BY expiry_date",
                self.table
            ))
            .map_err(|e| StoreError::ScanFailed(e.into()))?;

        let records = stmt
            .query_map([], |row| {
                let pk: String = row.get(0)?;
                let expiry: String = row.get(1)?;
                Ok((pk, expiry))
            })
            .map_err(|e| StoreError::ScanFailed(e.into()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::ScanFailed(e.into()))?;

        records
            .into_iter()
            .map(|(pk, expiry)| {
                let expiry_date = DateTime::parse_from_rfc3339(&expiry)
                    .map_err(|e| StoreError::ScanFailed(e.into()))?
                    .with_timezone(&Utc);
                Ok(OptionRecord { pk, expiry_date })
            })
            .collect()
    }
}

/// In-memory store for tests and paper mode.
#[derive(Default)]
pub struct MemoryOptionStore {
    records: Mutex<std::collections::BTreeMap<String, OptionRecord>>,
}

impl MemoryOptionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OptionStore for MemoryOptionStore {
    fn put(&self, record: &OptionRecord) -> Result<(), StoreError> {
        self.records
            .lock()
            .expect("store mutex poisoned")
            .insert(record.pk.clone(), record.clone());
        Ok(())
    }

    fn scan_expired(&self, now: DateTime<Utc>) -> Result<Vec<String>, StoreError> {
        let now = format_expiry(now);
        Ok(self
            .records
            .lock()
            .expect("store mutex poisoned")
            .values()
            .filter(|r| r.expiry_string() < now)
            .map(|r| r.pk.clone())
            .collect())
    }

    fn delete(&self, pk: &str) -> Result<(), StoreError> {
        self.records.lock().expect("store mutex poisoned").remove(pk);
        Ok(())
    }

    fn list(&self) -> Result<Vec<OptionRecord>, StoreError> {
        Ok(self
            .records
            .lock()
            .expect("store mutex poisoned")
            .values()
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn seeded_sqlite() -> (tempfile::TempDir, SqliteOptionStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteOptionStore::new(dir.path().join("options.db"), "options").unwrap();
        store
            .put(&OptionRecord::new("opt-1", ts("2020-01-01T00:00:00Z")))
            .unwrap();
        store
            .put(&OptionRecord::new("opt-2", ts("2999-01-01T00:00:00Z")))
            .unwrap();
        (dir, store)
    }

    #[test]
    fn test_scan_returns_only_expired_ids() {
        let (_dir, store) = seeded_sqlite();

        let expired = store.scan_expired(ts("2024-01-01T00:00:00Z")).unwrap();
        assert_eq!(expired, vec!["opt-1".to_string()]);
    }

    #[test]
    fn test_expiry_boundary_is_strict() {
        let (_dir, store) = seeded_sqlite();

        // A record expiring exactly at `now` is not yet expired.
        let expired = store.scan_expired(ts("2020-01-01T00:00:00Z")).unwrap();
        assert!(expired.is_empty());
    }

    #[test]
    fn test_delete_is_idempotent() {
        let (_dir, store) = seeded_sqlite();

        store.delete("opt-1").unwrap();
        // Deleting an already-absent record is a benign no-op.
        store.delete("opt-1").unwrap();
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_put_replaces_existing_record() {
        let (_dir, store) = seeded_sqlite();

        store
            .put(&OptionRecord::new("opt-1", ts("2030-06-01T12:00:00Z")))
            .unwrap();
        let records = store.list().unwrap();
        let opt1 = records.iter().find(|r| r.pk == "opt-1").unwrap();
        assert_eq!(opt1.expiry_date, ts("2030-06-01T12:00:00Z"));
    }

    #[test]
    fn test_memory_store_matches_sqlite_scan_semantics() {
        let store = MemoryOptionStore::new();
        store
            .put(&OptionRecord::new("opt-1", ts("2020-01-01T00:00:00Z")))
            .unwrap();
        store
            .put(&OptionRecord::new("opt-2", ts("2999-01-01T00:00:00Z")))
            .unwrap();

        let expired = store.scan_expired(ts("2024-01-01T00:00:00Z")).unwrap();
        assert_eq!(expired, vec!["opt-1".to_string()]);
    }
}
