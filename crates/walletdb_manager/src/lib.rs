//! # walletdb Manager
//!
//! Coordinates one active storage instance and its backups for a single
//! wallet owner.
//!
//! This crate provides:
//! - A lease gate: shared reader leases, writer leases (single writer by
//!   default) and an exclusive sync lease
//! - Identity checks and the cached local user id
//! - Wallet operations (create, process, abort and internalize actions;
//!   certificates; output baskets) and queries
//! - Backup fan-out and switching the active instance
//!
//! # Leases
//!
//! Every lease is a guard that releases its slot when dropped. A sync
//! request stops new leases immediately and waits for outstanding ones to
//! finish, so readers never observe a partially applied sync.
//!
//! ```rust,ignore
//! let manager = WalletStorageManager::with_backups(
//!     "02ab...",
//!     active,
//!     vec![backup],
//!     ManagerConfig::default(),
//! );
//! let auth = AuthId::new("02ab...");
//!
//! manager.make_available(&auth).await?;
//! let created = manager.create_action(&auth, args).await?;
//! manager.update_backups(&auth).await?;
//! ```
//!
//! # Key Invariants
//!
//! - No lease is granted while a sync holds or is acquiring the gate
//! - A sync starts only after every outstanding lease is released
//! - Calls for any identity other than the bound one are `Unauthorized`

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use panic!/unwrap()/expect()
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

mod actions;
mod auth;
mod backup;
mod config;
mod error;
mod gate;
mod lease;
mod manager;
mod queries;

pub use actions::{
    AbortActionResult, CreateActionArgs, CreateActionInput, CreateActionOutput,
    CreateActionResult, InternalizeActionArgs, InternalizeActionResult, InternalizeOutput,
    ProcessActionArgs, ProcessActionResult, RelinquishCertificateArgs,
};
pub use auth::AuthId;
pub use backup::BackupReport;
pub use config::ManagerConfig;
pub use error::{ManagerError, ManagerResult};
pub use gate::GateState;
pub use lease::{ReaderLease, SyncLease, WriterLease};
pub use manager::WalletStorageManager;
pub use queries::{
    CertificateWithFields, FindCertificatesArgs, FindOutputsArgs, ListActionsArgs,
    ListActionsResult, ListCertificatesArgs, ListOutputsArgs, ListOutputsResult, Paging,
    QueryMode, WalletAction, WalletOutput, DEFAULT_LIMIT,
};
