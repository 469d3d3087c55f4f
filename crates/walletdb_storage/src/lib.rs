//! # walletdb storage
//!
//! A concrete [`WalletStorage`](walletdb_core::WalletStorage) that keeps every
//! table in memory.
//!
//! [`InMemoryStorage`] is what tests, the CLI and the sync engine run
//! against. It enforces the same row rules a database-backed instance would:
//!
//! - Local ids are allocated per table and never reused
//! - Natural keys are unique per kind
//! - Foreign keys must name existing rows
//! - Maps and proven rows are scoped to a user through the rows they reference
//!
//! Contents can be persisted as a CBOR snapshot file and restored later.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod memory;
mod tables;

pub use error::{SnapshotError, SnapshotResult};
pub use memory::{InMemoryStorage, SCHEMA_VERSION, SNAPSHOT_VERSION};
