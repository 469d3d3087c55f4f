//! Error types for walletdb core.

use crate::entity::EntityKind;
use std::fmt;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type WalletResult<T> = Result<T, WalletError>;

/// Coarse classification shared by every walletdb error type.
///
/// Callers match on the kind rather than on crate-specific variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Caller supplied inconsistent or missing arguments.
    InvalidParameter,
    /// Operation called out of sequence.
    InvalidOperation,
    /// Invariant violation inside walletdb or a storage instance.
    Internal,
    /// Caller identity does not match the bound identity.
    Unauthorized,
    /// Deliberately unimplemented feature.
    NotImplemented,
    /// A referenced row does not exist.
    NotFound,
    /// Backend failure (I/O, snapshot files).
    Storage,
    /// Serialization failure.
    Codec,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::InvalidParameter => "invalid parameter",
            ErrorKind::InvalidOperation => "invalid operation",
            ErrorKind::Internal => "internal",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::NotImplemented => "not implemented",
            ErrorKind::NotFound => "not found",
            ErrorKind::Storage => "storage",
            ErrorKind::Codec => "codec",
        };
        f.write_str(name)
    }
}

/// Errors that can occur in walletdb core and storage operations.
#[derive(Debug, Error)]
pub enum WalletError {
    /// An argument was missing or inconsistent.
    #[error("invalid parameter `{parameter}`: {message}")]
    InvalidParameter {
        /// Name of the offending parameter.
        parameter: String,
        /// What is wrong with it.
        message: String,
    },

    /// The operation is not valid in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },

    /// An internal invariant was violated.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the violated invariant.
        message: String,
    },

    /// The caller is not the identity this instance is bound to.
    #[error("unauthorized: {message}")]
    Unauthorized {
        /// Description of the mismatch.
        message: String,
    },

    /// The requested feature is not implemented.
    #[error("not implemented: {feature}")]
    NotImplemented {
        /// The missing feature.
        feature: String,
    },

    /// A row was not found.
    #[error("{kind} not found: {key}")]
    NotFound {
        /// Kind of the missing row.
        kind: EntityKind,
        /// Key that was looked up.
        key: String,
    },

    /// Backend storage failure.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the failure.
        message: String,
    },

    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl WalletError {
    /// Creates an invalid parameter error.
    pub fn invalid_parameter(parameter: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates an unauthorized error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Creates a not implemented error.
    pub fn not_implemented(feature: impl Into<String>) -> Self {
        Self::NotImplemented {
            feature: feature.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(kind: EntityKind, key: impl fmt::Display) -> Self {
        Self::NotFound {
            kind,
            key: key.to_string(),
        }
    }

    /// Creates a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Returns the coarse classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            WalletError::InvalidParameter { .. } => ErrorKind::InvalidParameter,
            WalletError::InvalidOperation { .. } => ErrorKind::InvalidOperation,
            WalletError::Internal { .. } => ErrorKind::Internal,
            WalletError::Unauthorized { .. } => ErrorKind::Unauthorized,
            WalletError::NotImplemented { .. } => ErrorKind::NotImplemented,
            WalletError::NotFound { .. } => ErrorKind::NotFound,
            WalletError::Storage { .. } | WalletError::Io(_) => ErrorKind::Storage,
            WalletError::Json(_) => ErrorKind::Codec,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds() {
        assert_eq!(
            WalletError::invalid_parameter("chain", "mismatch").kind(),
            ErrorKind::InvalidParameter
        );
        assert_eq!(
            WalletError::invalid_operation("not available").kind(),
            ErrorKind::InvalidOperation
        );
        assert_eq!(WalletError::internal("corrupt").kind(), ErrorKind::Internal);
        assert_eq!(WalletError::unauthorized("who").kind(), ErrorKind::Unauthorized);
        assert_eq!(
            WalletError::not_implemented("single user mode").kind(),
            ErrorKind::NotImplemented
        );
    }

    #[test]
    fn error_display() {
        let err = WalletError::invalid_parameter("chain", "expected main");
        assert_eq!(err.to_string(), "invalid parameter `chain`: expected main");

        let err = WalletError::not_found(EntityKind::OutputBasket, "default");
        assert_eq!(err.to_string(), "outputBasket not found: default");
    }
}
