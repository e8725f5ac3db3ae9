// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Durable key-value collaborator.
//
// Writes are staged and only become visible (and durable) together at
// `commit`, which is what makes a whole-record write all-or-nothing.

use std::collections::HashMap;

use prefvault_core::error::Result;

/// A string key-value namespace with an explicit durability point.
///
/// `get` and `contains` see committed state only.  `put`, `remove` and
/// `clear` are staged in order and applied atomically by `commit`;
/// `rollback` drops whatever is staged.  A failed `commit` applies nothing.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn contains(&self, key: &str) -> Result<bool>;

    fn put(&mut self, key: &str, value: &str) -> Result<()>;

    fn remove(&mut self, key: &str) -> Result<()>;

    /// Stage removal of every key in the namespace.
    fn clear(&mut self) -> Result<()>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self);
}

/// A staged write waiting for `commit`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PendingOp {
    Put(String, String),
    Remove(String),
    Clear,
}

/// Key-value store living entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    committed: HashMap<String, String>,
    pending: Vec<PendingOp>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from existing committed contents.
    pub fn with_entries(entries: HashMap<String, String>) -> Self {
        Self {
            committed: entries,
            pending: Vec::new(),
        }
    }

    /// Copy of the committed contents.
    pub fn entries(&self) -> HashMap<String, String> {
        self.committed.clone()
    }
}

impl KeyValueStore for MemoryKvStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.committed.get(key).cloned())
    }

    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.committed.contains_key(key))
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

    fn commit(&mut self) -> Result<()> {
        for op in self.pending.drain(..) {
            match op {
                PendingOp::Put(key, value) => {
                    self.committed.insert(key, value);
                }
                PendingOp::Remove(key) => {
                    self.committed.remove(&key);
                }
                PendingOp::Clear => self.committed.clear(),
            }
        }
        Ok(())
    }

    fn rollback(&mut self) {
        self.pending.clear();
    }
}
