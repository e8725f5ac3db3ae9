// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Usage accumulator — folds foreground sessions into the persisted usage
// total.
//
//   Idle ──start──▶ Tracking ──pause──▶ Paused
//    ▲                │  ▲                │
//    └──────stop──────┘  └─────resume─────┘
//    ▲                                    │
//    └────────────────stop────────────────┘
//
// Every transition out of Tracking writes the elapsed whole seconds through
// the store before returning, so a crash loses at most the session that was
// still open.
//
// Transitions serialize on a mutex that is held across the store write.  The
// live total reads only atomics, so it never waits for that write.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use prefvault_core::clock::Clock;
use prefvault_core::error::Result;
use tracing::{debug, instrument, warn};

use crate::store::ConfigurationStore;

/// Where the accumulator is in the foreground lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackingState {
    #[default]
    Idle,
    Tracking,
    Paused,
}

/// `started_at` value while no interval is open.
const NO_SESSION: i64 = i64::MIN;

/// Session timer wired to a [`ConfigurationStore`].
pub struct UsageAccumulator {
    store: Arc<ConfigurationStore>,
    clock: Arc<dyn Clock>,
    state: Mutex<TrackingState>,
    /// Start of the open interval in epoch millis, or `NO_SESSION`.
    started_at: AtomicI64,
}

impl UsageAccumulator {
    /// Uses the store's clock.
    pub fn new(store: Arc<ConfigurationStore>) -> Self {
        let clock = Arc::clone(store.clock());
        Self {
            store,
            clock,
            state: Mutex::new(TrackingState::Idle),
            started_at: AtomicI64::new(NO_SESSION),
        }
    }

    pub fn state(&self) -> TrackingState {
        *self.lock()
    }

    /// Begin a session.  Only acts from `Idle`.
    ///
    /// The last access time is stamped after the session has started; if
    /// that write fails the error is returned but tracking continues.
    #[instrument(skip(self))]
    pub fn start(&self) -> Result<()> {
        let mut state = self.lock();
        if *state != TrackingState::Idle {
            return Ok(());
        }
        self.begin(&mut state);
        debug!("usage tracking started");
        self.store.update_last_access_time().map(drop)
    }

    /// Close the current interval and flush it.  Only acts from `Tracking`.
    ///
    /// When the flush fails the accumulator stays `Tracking` with the same
    /// session start, so a later `pause` or `stop` can retry.
    #[instrument(skip(self))]
    pub fn pause(&self) -> Result<()> {
        let mut state = self.lock();
        if *state != TrackingState::Tracking {
            return Ok(());
        }
        let started_at = self.started_at.swap(NO_SESSION, Ordering::AcqRel);
        if let Err(e) = self.fold(started_at) {
            self.started_at.store(started_at, Ordering::Release);
            return Err(e);
        }
        *state = TrackingState::Paused;
        debug!("usage tracking paused");
        Ok(())
    }

    /// Start a fresh interval.  Only acts from `Paused`.
    #[instrument(skip(self))]
    pub fn resume(&self) -> Result<()> {
        let mut state = self.lock();
        if *state != TrackingState::Paused {
            return Ok(());
        }
        self.begin(&mut state);
        debug!("usage tracking resumed");
        self.store.update_last_access_time().map(drop)
    }

    /// Return to `Idle`, flushing an open interval first.
    ///
    /// The session is discarded even when the flush fails.
    #[instrument(skip(self))]
    pub fn stop(&self) -> Result<()> {
        let mut state = self.lock();
        let started_at = self.started_at.swap(NO_SESSION, Ordering::AcqRel);
        let folded = match *state {
            TrackingState::Tracking => self.fold(started_at),
            TrackingState::Paused | TrackingState::Idle => Ok(()),
        };
        *state = TrackingState::Idle;
        if let Err(e) = &folded {
            warn!(error = %e, "final usage flush failed; interval dropped");
        } else {
            debug!("usage tracking stopped");
        }
        folded
    }

    /// Persisted total plus the open interval, if any.  Writes nothing and
    /// does not wait for a flush in progress; while one runs, the interval
    /// being flushed is left out until its commit lands.
    pub fn total_including_current(&self) -> u64 {
        let open = self.elapsed_seconds(self.started_at.load(Ordering::Acquire));
        let stored = match self.store.committed_usage_seconds() {
            Some(stored) => stored,
            None => self.store.load().total_usage_seconds,
        };
        stored.saturating_add(open)
    }

    // -- internals -----------------------------------------------------------

    fn lock(&self) -> MutexGuard<'_, TrackingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self, state: &mut TrackingState) {
        *state = TrackingState::Tracking;
        self.started_at
            .store(self.clock.now_millis(), Ordering::Release);
    }

    fn fold(&self, started_at: i64) -> Result<()> {
        let elapsed = self.elapsed_seconds(started_at);
        self.store.add_usage_seconds(elapsed)?;
        debug!(elapsed, "session folded into usage total");
        Ok(())
    }

    /// Whole seconds since `started_at`; zero with no open interval or when
    /// the clock went back.
    fn elapsed_seconds(&self, started_at: i64) -> u64 {
        if started_at == NO_SESSION {
            return 0;
        }
        let millis = self.clock.now_millis().saturating_sub(started_at).max(0);
        u64::try_from(millis / 1_000).unwrap_or(0)
    }
}
