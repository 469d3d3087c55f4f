//! Error types for the storage manager.

use thiserror::Error;
use walletdb_core::{ErrorKind, WalletError};
use walletdb_sync_engine::SyncError;

/// Result type for manager operations.
pub type ManagerResult<T> = Result<T, ManagerError>;

/// Errors that can occur in the storage manager.
#[derive(Error, Debug)]
pub enum ManagerError {
    /// Error raised by a storage instance or a wallet rule.
    #[error(transparent)]
    Wallet(#[from] WalletError),

    /// Error raised while synchronizing two instances.
    #[error(transparent)]
    Sync(#[from] SyncError),
}

impl ManagerError {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ManagerError::Wallet(e) => e.kind(),
            ManagerError::Sync(e) => e.kind(),
        }
    }

    /// Returns true if the caller's request was at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::InvalidParameter | ErrorKind::Unauthorized | ErrorKind::NotFound
        )
    }
}
