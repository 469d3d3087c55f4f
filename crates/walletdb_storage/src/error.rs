//! Error types for snapshot files.

use std::io;
use thiserror::Error;
use walletdb_core::WalletError;

/// Result type for snapshot operations.
pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// Errors that can occur while reading or writing a snapshot file.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The snapshot could not be encoded.
    #[error("snapshot encode failed: {0}")]
    Encode(String),

    /// The snapshot file is corrupted or not a snapshot.
    #[error("snapshot corrupted: {0}")]
    Corrupted(String),

    /// The snapshot was written by an incompatible format version.
    #[error("unsupported snapshot version {found}, expected {expected}")]
    UnsupportedVersion {
        /// Version found in the file.
        found: u32,
        /// Version this build reads.
        expected: u32,
    },
}

impl From<SnapshotError> for WalletError {
    fn from(err: SnapshotError) -> Self {
        match err {
            SnapshotError::Io(e) => WalletError::Io(e),
            other => WalletError::storage(other.to_string()),
        }
    }
}
