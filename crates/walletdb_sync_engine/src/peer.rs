//! The transport seam between two instances.
//!
//! A sync run needs a reader that produces chunks and a writer that merges
//! them. Both are traits so that a remote instance can sit behind any
//! transport; [`LocalSyncPeer`] serves an in-process [`WalletStorage`].

use crate::chunker::get_sync_chunk;
use crate::config::SyncConfig;
use crate::cursor::SyncCursor;
use crate::error::{SyncError, SyncResult};
use crate::merge::MergeRegistry;
use crate::processor::process_sync_chunk;
use async_trait::async_trait;
use std::sync::Arc;
use walletdb_core::{Settings, StorageExt, User, WalletError, WalletStorage};
use walletdb_sync_protocol::{
    ProcessSyncChunkResult, RequestSyncChunkArgs, SyncChunk, SyncMessage,
};

/// Either end of a sync run.
#[async_trait]
pub trait SyncPeer: Send + Sync {
    /// Settings of the instance behind the peer.
    async fn settings(&self) -> SyncResult<Settings>;
}

/// Produces chunks.
#[async_trait]
pub trait SyncReader: SyncPeer {
    /// Returns the next chunk for `args`.
    async fn get_sync_chunk(&self, args: &RequestSyncChunkArgs) -> SyncResult<SyncChunk>;
}

/// Merges chunks and owns the cursor.
#[async_trait]
pub trait SyncWriter: SyncPeer {
    /// Returns the user with `identity_key`, creating it when missing.
    async fn find_or_insert_user(&self, identity_key: &str) -> SyncResult<(User, bool)>;

    /// Builds the next request for `reader` from this instance's cursor.
    async fn request_sync_chunk_args(
        &self,
        identity_key: &str,
        reader: &Settings,
        config: &SyncConfig,
    ) -> SyncResult<RequestSyncChunkArgs>;

    /// Merges a chunk requested with `args`.
    async fn process_sync_chunk(
        &self,
        args: &RequestSyncChunkArgs,
        chunk: &SyncChunk,
    ) -> SyncResult<ProcessSyncChunkResult>;

    /// Records on the cursor for `reader` that it failed to produce a chunk.
    async fn record_remote_error(
        &self,
        identity_key: &str,
        reader: &Settings,
        message: &str,
    ) -> SyncResult<()>;
}

/// Peer over an in-process storage instance.
#[derive(Clone)]
pub struct LocalSyncPeer {
    storage: Arc<dyn WalletStorage>,
    registry: Arc<MergeRegistry>,
}

impl LocalSyncPeer {
    /// Creates a peer with the standard merge strategies.
    pub fn new(storage: Arc<dyn WalletStorage>) -> Self {
        Self {
            storage,
            registry: Arc::new(MergeRegistry::standard()),
        }
    }

    /// The storage instance behind the peer.
    pub fn storage(&self) -> &Arc<dyn WalletStorage> {
        &self.storage
    }

    async fn cursor(&self, identity_key: &str, reader: &Settings) -> SyncResult<SyncCursor> {
        let user = self.storage.find_user(identity_key).await?.ok_or_else(|| {
            WalletError::invalid_operation(format!("user {identity_key} must exist before sync"))
        })?;
        SyncCursor::load_or_create(self.storage.as_ref(), user.user_id, reader).await
    }
}

#[async_trait]
impl SyncPeer for LocalSyncPeer {
    async fn settings(&self) -> SyncResult<Settings> {
        Ok(self.storage.settings()?)
    }
}

#[async_trait]
impl SyncReader for LocalSyncPeer {
    async fn get_sync_chunk(&self, args: &RequestSyncChunkArgs) -> SyncResult<SyncChunk> {
        get_sync_chunk(self.storage.as_ref(), args).await
    }
}

#[async_trait]
impl SyncWriter for LocalSyncPeer {
    async fn find_or_insert_user(&self, identity_key: &str) -> SyncResult<(User, bool)> {
        Ok(self.storage.find_or_insert_user(identity_key).await?)
    }

    async fn request_sync_chunk_args(
        &self,
        identity_key: &str,
        reader: &Settings,
        config: &SyncConfig,
    ) -> SyncResult<RequestSyncChunkArgs> {
        let local = self.storage.settings()?;
        let cursor = self.cursor(identity_key, reader).await?;
        Ok(cursor.build_request(identity_key, &local, config))
    }

    async fn process_sync_chunk(
        &self,
        args: &RequestSyncChunkArgs,
        chunk: &SyncChunk,
    ) -> SyncResult<ProcessSyncChunkResult> {
        process_sync_chunk(self.storage.as_ref(), &self.registry, args, chunk).await
    }

    async fn record_remote_error(
        &self,
        identity_key: &str,
        reader: &Settings,
        message: &str,
    ) -> SyncResult<()> {
        let mut cursor = self.cursor(identity_key, reader).await?;
        cursor.record_remote_error(message);
        cursor.save(self.storage.as_ref()).await
    }
}

/// Reader that passes every request and chunk through binary message
/// frames, as a network transport would.
pub struct LoopbackReader<R> {
    inner: R,
}

impl<R: SyncReader> LoopbackReader<R> {
    /// Wraps a reader.
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<R: SyncReader> SyncPeer for LoopbackReader<R> {
    async fn settings(&self) -> SyncResult<Settings> {
        self.inner.settings().await
    }
}

#[async_trait]
impl<R: SyncReader> SyncReader for LoopbackReader<R> {
    async fn get_sync_chunk(&self, args: &RequestSyncChunkArgs) -> SyncResult<SyncChunk> {
        let request = SyncMessage::RequestSyncChunk(args.clone()).encode()?;
        let SyncMessage::RequestSyncChunk(received) = SyncMessage::decode(&request)? else {
            return Err(SyncError::ChunkMismatch("expected a chunk request".into()));
        };

        let reply = match self.inner.get_sync_chunk(&received).await {
            Ok(chunk) => SyncMessage::SyncChunk(Box::new(chunk)),
            Err(err) => SyncMessage::Error {
                message: err.to_string(),
            },
        }
        .encode()?;

        match SyncMessage::decode(&reply)? {
            SyncMessage::SyncChunk(chunk) => Ok(*chunk),
            SyncMessage::Error { message } => Err(WalletError::storage(message).into()),
            _ => Err(SyncError::ChunkMismatch("expected a chunk".into())),
        }
    }
}
