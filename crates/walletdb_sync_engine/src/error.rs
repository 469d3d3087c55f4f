//! Error types for the sync engine.

use thiserror::Error;
use walletdb_core::{EntityKind, ErrorKind, WalletError};
use walletdb_sync_protocol::ProtocolError;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Storage instance error.
    #[error(transparent)]
    Wallet(#[from] WalletError),

    /// Wire encoding error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A row references a remote id the cursor has never seen.
    #[error("no local id mapped for remote {kind} {remote_id}")]
    MissingIdMapping {
        /// Kind of the referenced row.
        kind: EntityKind,
        /// Remote id of the referenced row.
        remote_id: i64,
    },

    /// A remote id is already mapped to a different local id.
    #[error("remote {kind} {remote_id} already maps to {existing}, not {incoming}")]
    IdMapConflict {
        /// Kind of the row.
        kind: EntityKind,
        /// Remote id.
        remote_id: i64,
        /// Local id already recorded.
        existing: i64,
        /// Local id that was about to be recorded.
        incoming: i64,
    },

    /// A chunk tried to create a user; users only arrive through
    /// `find_or_insert_user`.
    #[error("sync may not insert user {identity_key}")]
    UserInsertDuringSync {
        /// Identity key carried by the chunk.
        identity_key: String,
    },

    /// A chunk was not addressed to this instance or user.
    #[error("chunk mismatch: {0}")]
    ChunkMismatch(String),
}

impl SyncError {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::Wallet(e) => e.kind(),
            SyncError::Protocol(_) => ErrorKind::Codec,
            SyncError::MissingIdMapping { .. } => ErrorKind::InvalidOperation,
            SyncError::IdMapConflict { .. } | SyncError::UserInsertDuringSync { .. } => {
                ErrorKind::Internal
            }
            SyncError::ChunkMismatch(_) => ErrorKind::InvalidParameter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        assert_eq!(
            SyncError::UserInsertDuringSync {
                identity_key: "02ab".into()
            }
            .kind(),
            ErrorKind::Internal
        );
        assert_eq!(
            SyncError::IdMapConflict {
                kind: EntityKind::Output,
                remote_id: 1,
                existing: 2,
                incoming: 3,
            }
            .kind(),
            ErrorKind::Internal
        );
        assert_eq!(
            SyncError::from(WalletError::unauthorized("nope")).kind(),
            ErrorKind::Unauthorized
        );
        assert_eq!(
            SyncError::ChunkMismatch("wrong user".into()).kind(),
            ErrorKind::InvalidParameter
        );
    }

    #[test]
    fn error_display() {
        let err = SyncError::MissingIdMapping {
            kind: EntityKind::Transaction,
            remote_id: 5,
        };
        assert_eq!(err.to_string(), "no local id mapped for remote transaction 5");
    }
}
