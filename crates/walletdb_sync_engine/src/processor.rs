//! Writer side of the chunk protocol.

use crate::cursor::SyncCursor;
use crate::error::{SyncError, SyncResult};
use crate::merge::{merge_incoming, MergeContext, MergeOutcome, MergeRegistry};
use tracing::debug;
use walletdb_core::{StorageExt, WalletStorage};
use walletdb_sync_protocol::{ProcessSyncChunkResult, RequestSyncChunkArgs, SyncChunk};

/// Merges a chunk into `local` and advances the cursor it was requested with.
///
/// On failure the cursor records the error and keeps every id mapping
/// learned before the failing row; per-kind counts are not advanced, so the
/// same chunk is requested again on the next run.
pub async fn process_sync_chunk(
    local: &dyn WalletStorage,
    registry: &MergeRegistry,
    args: &RequestSyncChunkArgs,
    chunk: &SyncChunk,
) -> SyncResult<ProcessSyncChunkResult> {
    if chunk.from_storage_identity_key != args.from_storage_identity_key {
        return Err(SyncError::ChunkMismatch(format!(
            "chunk from {}, requested from {}",
            chunk.from_storage_identity_key, args.from_storage_identity_key
        )));
    }
    chunk
        .validate_addressing(&args.to_storage_identity_key, &args.identity_key)
        .map_err(|e| SyncError::ChunkMismatch(e.to_string()))?;

    let user = local
        .find_user(&args.identity_key)
        .await?
        .ok_or_else(|| SyncError::UserInsertDuringSync {
            identity_key: args.identity_key.clone(),
        })?;
    let mut cursor = SyncCursor::load(local, user.user_id, &args.from_storage_identity_key).await?;

    let ctx = MergeContext {
        storage: local,
        user_id: user.user_id,
    };
    match merge_chunk(ctx, registry, &mut cursor, chunk).await {
        Ok(result) => {
            cursor.record_chunk(chunk);
            if result.done {
                cursor.complete_pass();
            }
            cursor.save(local).await?;
            debug!(
                inserts = result.inserts,
                updates = result.updates,
                done = result.done,
                "merged sync chunk"
            );
            Ok(result)
        }
        Err(err) => {
            cursor.record_error(err.to_string());
            cursor.save(local).await?;
            Err(err)
        }
    }
}

async fn merge_chunk(
    ctx: MergeContext<'_>,
    registry: &MergeRegistry,
    cursor: &mut SyncCursor,
    chunk: &SyncChunk,
) -> SyncResult<ProcessSyncChunkResult> {
    let mut result = ProcessSyncChunkResult {
        done: chunk.is_empty(),
        ..ProcessSyncChunkResult::default()
    };
    for strategy in registry.iter() {
        for row in chunk.rows_of(strategy.kind()) {
            match merge_incoming(strategy, ctx, cursor.map_mut(), row).await? {
                MergeOutcome::Inserted => result.inserts += 1,
                MergeOutcome::Updated => result.updates += 1,
                MergeOutcome::Unchanged => {}
            }
        }
    }
    Ok(result)
}
