//! The lease gate.
//!
//! Counts outstanding reader and writer leases and the sync lock under one
//! mutex. Waiters re-check the state each time it changes.
//!
//! Admission rules:
//! - readers and writers wait while the sync lock is set, and under the
//!   single-writer policy while a writer lease is outstanding;
//! - sync first waits for the lock to be free and takes it, which stops new
//!   leases, then waits for outstanding leases to drain.
//!
//! There is no fairness and no timeout.

use parking_lot::Mutex;
use tokio::sync::Notify;

/// Point-in-time view of the gate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GateState {
    /// Outstanding reader leases.
    pub readers: usize,
    /// Outstanding writer leases.
    pub writers: usize,
    /// Whether a sync holds or is acquiring the gate.
    pub sync_locked: bool,
}

#[derive(Debug)]
pub(crate) struct Gate {
    state: Mutex<GateState>,
    changed: Notify,
    single_writer: bool,
}

impl Gate {
    pub fn new(single_writer: bool) -> Self {
        Self {
            state: Mutex::new(GateState::default()),
            changed: Notify::new(),
            single_writer,
        }
    }

    pub fn state(&self) -> GateState {
        *self.state.lock()
    }

    fn blocks_leases(&self, state: &GateState) -> bool {
        state.sync_locked || (self.single_writer && state.writers > 0)
    }

    pub async fn enter_reader(&self) {
        self.wait_until(|state| {
            if self.blocks_leases(state) {
                return false;
            }
            state.readers += 1;
            true
        })
        .await;
    }

    pub async fn enter_writer(&self) {
        self.wait_until(|state| {
            if self.blocks_leases(state) {
                return false;
            }
            state.writers += 1;
            true
        })
        .await;
    }

    pub async fn lock_sync(&self) {
        self.wait_until(|state| {
            if state.sync_locked {
                return false;
            }
            state.sync_locked = true;
            true
        })
        .await;
    }

    pub async fn drained(&self) {
        self.wait_until(|state| state.readers == 0 && state.writers == 0)
            .await;
    }

    pub fn exit_reader(&self) {
        self.update(|state| state.readers = state.readers.saturating_sub(1));
    }

    pub fn exit_writer(&self) {
        self.update(|state| state.writers = state.writers.saturating_sub(1));
    }

    pub fn unlock_sync(&self) {
        self.update(|state| state.sync_locked = false);
    }

    fn update(&self, change: impl FnOnce(&mut GateState)) {
        change(&mut self.state.lock());
        self.changed.notify_waiters();
    }

    /// Waits until `admit` returns true. `admit` runs under the state lock
    /// and may claim a slot before returning.
    async fn wait_until(&self, mut admit: impl FnMut(&mut GateState) -> bool) {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            // registered before the check so a release in between is not lost
            notified.as_mut().enable();

            let admitted = admit(&mut self.state.lock());
            if admitted {
                return;
            }
            notified.await;
        }
    }
}
