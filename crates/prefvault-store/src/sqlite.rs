// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Key-value store backed by SQLite.
//
// Values arrive here already encrypted; this layer only provides durability
// and atomic commits.  Staged writes are applied in one transaction.

use std::path::Path;

use prefvault_core::error::{PrefvaultError, Result};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, instrument};

use crate::kv::{KeyValueStore, PendingOp};

/// SQLite schema for the preferences namespace.
const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS preferences (
        key   TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
"#;

/// Convert a `rusqlite::Error` into a `PrefvaultError::Persistence`.
fn db_err(context: &str) -> impl FnOnce(rusqlite::Error) -> PrefvaultError + '_ {
    move |e| PrefvaultError::Persistence(format!("{context}: {e}"))
}

/// Durable key-value namespace in a single SQLite table.
///
/// All methods are synchronous because `rusqlite` does not support async
/// natively.  In an async context, wrap calls in `tokio::task::spawn_blocking`.
pub struct SqliteKvStore {
    conn: Connection,
    pending: Vec<PendingOp>,
}

impl SqliteKvStore {
    /// Open (or create) the preferences database at `path`.
    ///
    /// WAL journal mode with full synchronous writes: a returned `commit`
    /// has reached the disk.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).map_err(db_err("open"))?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(db_err("WAL pragma"))?;
        conn.pragma_update(None, "synchronous", "FULL")
            .map_err(db_err("synchronous pragma"))?;

        Self::init(conn)
    }

    /// Open an in-memory database (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err("open"))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(CREATE_TABLE_SQL)
            .map_err(db_err("create table"))?;
        debug!("preferences database ready");
        Ok(Self {
            conn,
            pending: Vec::new(),
        })
    }
}

impl KeyValueStore for SqliteKvStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM preferences WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err("get"))
    }

    fn contains(&self, key: &str) -> Result<bool> {
        self.conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM preferences WHERE key = ?1)",
                params![key],
                |row| row.get(0),
            )
            .map_err(db_err("contains"))
    }

    fn put(&mut self, key: &str, value: &str) -> Result<()> {
        self.pending
            .push(PendingOp::Put(key.to_owned(), value.to_owned()));
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.pending.push(PendingOp::Remove(key.to_owned()));
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.pending.push(PendingOp::Clear);
        Ok(())
    }

    #[instrument(skip(self), fields(ops = self.pending.len()))]
    fn commit(&mut self) -> Result<()> {
        // A failed transaction rolls back on drop, and the batch is gone
        // either way.
        let ops = std::mem::take(&mut self.pending);
        let tx = self.conn.transaction().map_err(db_err("begin"))?;

        for op in &ops {
            let written = match op {
                PendingOp::Put(key, value) => tx.execute(
                    "INSERT INTO preferences (key, value) VALUES (?1, ?2)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                    params![key, value],
                ),
                PendingOp::Remove(key) => {
                    tx.execute("DELETE FROM preferences WHERE key = ?1", params![key])
                }
                PendingOp::Clear => tx.execute("DELETE FROM preferences", []),
            };
            written.map_err(db_err("write"))?;
        }

        tx.commit().map_err(db_err("commit"))?;
        debug!("preferences committed");
        Ok(())
    }

    fn rollback(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staged_then_committed() {
        let mut kv = SqliteKvStore::open_in_memory().unwrap();
        kv.put("user_name", "blob-1").unwrap();
        assert!(!kv.contains("user_name").unwrap());

        kv.commit().unwrap();
        assert!(kv.contains("user_name").unwrap());
        assert_eq!(kv.get("user_name").unwrap().as_deref(), Some("blob-1"));

        kv.put("user_name", "blob-2").unwrap();
        kv.commit().unwrap();
        assert_eq!(kv.get("user_name").unwrap().as_deref(), Some("blob-2"));
    }

    #[test]
    fn remove_and_clear() {
        let mut kv = SqliteKvStore::open_in_memory().unwrap();
        kv.put("a", "1").unwrap();
        kv.put("b", "2").unwrap();
        kv.commit().unwrap();

        kv.remove("a").unwrap();
        kv.commit().unwrap();
        assert!(!kv.contains("a").unwrap());
        assert!(kv.contains("b").unwrap());

        kv.clear().unwrap();
        kv.commit().unwrap();
        assert_eq!(kv.get("b").unwrap(), None);
    }

    #[test]
    fn rollback_discards_batch() {
        let mut kv = SqliteKvStore::open_in_memory().unwrap();
        kv.put("a", "1").unwrap();
        kv.rollback();
        kv.commit().unwrap();
        assert!(!kv.contains("a").unwrap());
    }

    #[test]
    fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.db");
        {
            let mut kv = SqliteKvStore::open(&path).unwrap();
            kv.put("total_usage_time_seconds", "blob").unwrap();
            kv.commit().unwrap();
            // Staged but never committed: lost with the process.
            kv.put("user_name", "unflushed").unwrap();
        }

        let kv = SqliteKvStore::open(&path).unwrap();
        assert_eq!(
            kv.get("total_usage_time_seconds").unwrap().as_deref(),
            Some("blob")
        );
        assert!(!kv.contains("user_name").unwrap());
    }
}
