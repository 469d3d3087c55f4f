//! # walletdb core
//!
//! Shared building blocks for walletdb.
//!
//! This crate provides:
//! - The entity record model (users, baskets, transactions, outputs, ...)
//! - Natural keys, the only portable row identity between instances
//! - The [`WalletStorage`] provider trait every storage instance implements
//! - The error taxonomy shared by the other walletdb crates
//!
//! ## Key Invariants
//!
//! - Local primary keys are unique only inside the instance that assigned them
//! - Rows are never hard-deleted; `is_deleted` replicates like any update
//! - `updated_at` only moves forward

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod entity;

mod config;
mod error;
mod settings;
mod storage;
mod types;

pub use config::{StorageConfig, DEFAULT_MAX_OUTPUT_SCRIPT};
pub use entity::{
    Certificate, CertificateField, Commission, Entity, EntityKind, EntityRow, NaturalKey, Output,
    OutputBasket, OutputTag, OutputTagMap, ProvenTx, ProvenTxReq, SyncState, Transaction, TxLabel,
    TxLabelMap, User,
};
pub use error::{ErrorKind, WalletError, WalletResult};
pub use settings::Settings;
pub use storage::{RowQuery, StorageExt, WalletStorage};
pub use types::{
    new_reference, now, Chain, ProvenTxReqStatus, SyncStatus, Timestamp, TransactionStatus,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
