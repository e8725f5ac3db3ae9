// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Async facade over the store and the usage accumulator.
//
// Storage work runs on tokio's blocking pool and every call hands back a
// `Result` once the work is committed.  Committed records are published on
// a watch channel; observers only ever move forward in revision order.

use std::sync::Arc;

use prefvault_core::error::{PrefvaultError, Result};
use prefvault_core::types::{ConfigSnapshot, UserConfiguration};
use tokio::sync::watch;
use tracing::{debug, instrument};

use crate::accumulator::{TrackingState, UsageAccumulator};
use crate::store::{ConfigUpdate, ConfigurationStore};

/// Cloneable handle shared by every caller in the process.
#[derive(Clone)]
pub struct ConfigService {
    store: Arc<ConfigurationStore>,
    accumulator: Arc<UsageAccumulator>,
    snapshots: Arc<watch::Sender<ConfigSnapshot>>,
}

impl ConfigService {
    /// Wrap `store`.  The first snapshot is read synchronously.
    pub fn new(store: ConfigurationStore) -> Self {
        let store = Arc::new(store);
        let accumulator = Arc::new(UsageAccumulator::new(Arc::clone(&store)));
        let (tx, _rx) = watch::channel(store.load_snapshot());
        Self {
            store,
            accumulator,
            snapshots: Arc::new(tx),
        }
    }

    /// Receiver that sees every newer committed record.
    pub fn subscribe(&self) -> watch::Receiver<ConfigSnapshot> {
        self.snapshots.subscribe()
    }

    pub async fn load(&self) -> Result<UserConfiguration> {
        self.run_blocking(|store, _| Ok(store.load())).await
    }

    pub async fn save(&self, config: UserConfiguration) -> Result<()> {
        self.run_blocking(move |store, _| store.save(config)).await
    }

    #[instrument(skip(self))]
    pub async fn update(&self, update: ConfigUpdate) -> Result<UserConfiguration> {
        self.run_blocking(move |store, _| store.update_field(update))
            .await
    }

    pub async fn clear(&self) -> Result<()> {
        self.run_blocking(|store, _| store.clear()).await
    }

    pub async fn has_stored_configuration(&self) -> Result<bool> {
        self.run_blocking(|store, _| Ok(store.has_stored_configuration()))
            .await
    }

    pub async fn export_configuration(&self) -> Result<serde_json::Value> {
        self.run_blocking(|store, _| store.export_configuration())
            .await
    }

    pub async fn import_configuration(&self, value: serde_json::Value) -> Result<()> {
        self.run_blocking(move |store, _| store.import_configuration(value))
            .await
    }

    pub async fn start_tracking(&self) -> Result<()> {
        self.run_blocking(|_, acc| acc.start()).await
    }

    pub async fn pause_tracking(&self) -> Result<()> {
        self.run_blocking(|_, acc| acc.pause()).await
    }

    pub async fn resume_tracking(&self) -> Result<()> {
        self.run_blocking(|_, acc| acc.resume()).await
    }

    pub async fn stop_tracking(&self) -> Result<()> {
        self.run_blocking(|_, acc| acc.stop()).await
    }

    pub fn tracking_state(&self) -> TrackingState {
        self.accumulator.state()
    }

    /// Usage total including the open session.  Cheap enough to poll once a
    /// second.
    pub fn total_including_current(&self) -> u64 {
        self.accumulator.total_including_current()
    }

    /// Run `op` on the blocking pool, then publish whatever is now committed.
    ///
    /// The snapshot is published even when `op` fails, since a partially
    /// successful accumulator call may still have committed.
    async fn run_blocking<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&ConfigurationStore, &UsageAccumulator) -> Result<T> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let accumulator = Arc::clone(&self.accumulator);
        let (result, snapshot) = tokio::task::spawn_blocking(move || {
            let result = op(&store, &accumulator);
            (result, store.load_snapshot())
        })
        .await
        .map_err(|e| PrefvaultError::Task(e.to_string()))?;

        self.publish(snapshot);
        result
    }

    fn publish(&self, snapshot: ConfigSnapshot) {
        let revision = snapshot.revision;
        let published = self.snapshots.send_if_modified(|current| {
            if snapshot.revision > current.revision {
                *current = snapshot;
                true
            } else {
                false
            }
        });
        if published {
            debug!(revision, "configuration snapshot published");
        }
    }
}
