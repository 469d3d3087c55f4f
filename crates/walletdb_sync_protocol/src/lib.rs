//! # walletdb sync protocol
//!
//! Wire shapes exchanged between two storage instances during sync.
//!
//! This crate provides:
//! - [`RequestSyncChunkArgs`], built by the writer from its cursor
//! - [`SyncChunk`], the reader's answer, rows grouped by kind
//! - [`ProcessSyncChunkResult`], the writer's merge outcome
//! - [`SyncMessage`] framing with JSON (camelCase) and CBOR encodings
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod codec;
mod error;
mod messages;

pub use codec::{WireFormat, PROTOCOL_VERSION};
pub use error::{ProtocolError, ProtocolResult};
pub use messages::{
    ProcessSyncChunkResult, RequestSyncChunkArgs, SyncChunk, SyncChunkOffset, SyncMessage,
};
