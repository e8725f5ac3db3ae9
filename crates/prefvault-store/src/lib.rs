// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! prefvault-store — the encrypted configuration record and everything that
//! writes to it.
//!
//! - [`kv`] / [`sqlite`]: durable key-value collaborators with staged,
//!   all-or-nothing commits.
//! - [`store`]: `ConfigurationStore`, the single owner of the record.
//! - [`accumulator`]: `UsageAccumulator`, the foreground session timer.
//! - [`service`]: `ConfigService`, the async facade with snapshot
//!   publication.

pub mod accumulator;
pub mod kv;
pub mod service;
pub mod sqlite;
pub mod store;

pub use accumulator::{TrackingState, UsageAccumulator};
pub use kv::{KeyValueStore, MemoryKvStore};
pub use service::ConfigService;
pub use sqlite::SqliteKvStore;
pub use store::{ConfigUpdate, ConfigurationStore};
