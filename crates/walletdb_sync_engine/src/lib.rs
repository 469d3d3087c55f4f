//! # walletdb sync engine
//!
//! Chunked, resumable replication of one user's rows between two storage
//! instances.
//!
//! This crate provides:
//! - [`SyncCursor`]: the persisted per-remote progress and id map
//! - [`get_sync_chunk`]: the reader side, producing budgeted chunks
//! - [`process_sync_chunk`]: the writer side, merging chunks kind by kind
//! - [`EntityMerge`] strategies keyed by natural key with last-writer-wins
//! - [`run_sync`]: the request/merge loop over the [`SyncReader`] and
//!   [`SyncWriter`] seams
//!
//! ## Key Invariants
//!
//! - Kinds are merged in dependency order, so a row's parents are mapped
//!   before the row arrives
//! - Local ids never cross instances; the cursor's id map is consulted,
//!   never guessed
//! - An incoming row only overwrites a local one when strictly newer
//! - Re-applying a chunk inserts nothing

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod chunker;
mod config;
mod cursor;
mod driver;
mod error;
pub mod merge;
mod peer;
mod processor;
mod sync_map;

pub use chunker::get_sync_chunk;
pub use config::{SyncConfig, DEFAULT_MAX_ITEMS, DEFAULT_MAX_ROUGH_SIZE};
pub use cursor::SyncCursor;
pub use driver::{run_sync, SyncTotals};
pub use error::{SyncError, SyncResult};
pub use merge::{
    merge_incoming, EntityMerge, MergeContext, MergeOutcome, MergeRegistry, MergeRules,
};
pub use peer::{LocalSyncPeer, LoopbackReader, SyncPeer, SyncReader, SyncWriter};
pub use processor::process_sync_chunk;
pub use sync_map::{EntitySyncMap, SyncMap};
