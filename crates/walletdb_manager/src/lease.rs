//! Lease guards handed out by the manager.
//!
//! Each guard releases its slot in the gate when dropped, so a lease is
//! returned on every exit path including errors and cancellation.

use crate::gate::Gate;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use walletdb_core::WalletStorage;

/// Shared access to the active instance.
pub struct ReaderLease {
    gate: Arc<Gate>,
    storage: Arc<dyn WalletStorage>,
}

impl ReaderLease {
    pub(crate) fn new(gate: Arc<Gate>, storage: Arc<dyn WalletStorage>) -> Self {
        Self { gate, storage }
    }

    /// The active instance.
    pub fn storage(&self) -> &Arc<dyn WalletStorage> {
        &self.storage
    }
}

impl Deref for ReaderLease {
    type Target = dyn WalletStorage;

    fn deref(&self) -> &Self::Target {
        self.storage.as_ref()
    }
}

impl Drop for ReaderLease {
    fn drop(&mut self) {
        self.gate.exit_reader();
    }
}

impl fmt::Debug for ReaderLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaderLease").finish_non_exhaustive()
    }
}

/// Mutating access to the active instance.
pub struct WriterLease {
    gate: Arc<Gate>,
    storage: Arc<dyn WalletStorage>,
}

impl WriterLease {
    pub(crate) fn new(gate: Arc<Gate>, storage: Arc<dyn WalletStorage>) -> Self {
        Self { gate, storage }
    }

    /// The active instance.
    pub fn storage(&self) -> &Arc<dyn WalletStorage> {
        &self.storage
    }
}

impl Deref for WriterLease {
    type Target = dyn WalletStorage;

    fn deref(&self) -> &Self::Target {
        self.storage.as_ref()
    }
}

impl Drop for WriterLease {
    fn drop(&mut self) {
        self.gate.exit_writer();
    }
}

impl fmt::Debug for WriterLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriterLease").finish_non_exhaustive()
    }
}

/// Exclusive access to every instance.
///
/// The guard exists from the moment the sync lock is taken, before
/// outstanding leases have drained, so cancelling an acquisition still
/// clears the lock.
#[derive(Debug)]
pub struct SyncLease {
    gate: Arc<Gate>,
}

impl SyncLease {
    pub(crate) fn new(gate: Arc<Gate>) -> Self {
        Self { gate }
    }
}

impl Drop for SyncLease {
    fn drop(&mut self) {
        self.gate.unlock_sync();
    }
}
