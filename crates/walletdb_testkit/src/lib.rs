//! # walletdb testkit
//!
//! Test utilities for walletdb.
//!
//! This crate provides:
//! - Ready-to-use storage instances and seeded wallets
//! - Property-based test generators using proptest
//! - Temporary snapshot locations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use walletdb_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn seeded_wallet_has_rows() {
//!     let storage = TestStorage::memory("primary").await;
//!     let wallet = seed_wallet(&storage, "alice").await;
//!     assert!(wallet.transaction_id > 0);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
