//! The chunk loop.

use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::peer::{SyncReader, SyncWriter};
use std::ops::AddAssign;
use tracing::{debug, info, warn};
use walletdb_core::WalletError;
use walletdb_sync_protocol::ProcessSyncChunkResult;

/// Accumulated outcome of one sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncTotals {
    /// Rows inserted into the writer.
    pub inserts: usize,
    /// Rows updated in the writer.
    pub updates: usize,
    /// Chunks exchanged, the final empty one included.
    pub chunks: usize,
}

impl AddAssign<ProcessSyncChunkResult> for SyncTotals {
    fn add_assign(&mut self, result: ProcessSyncChunkResult) {
        self.inserts += result.inserts;
        self.updates += result.updates;
        self.chunks += 1;
    }
}

impl AddAssign for SyncTotals {
    fn add_assign(&mut self, other: SyncTotals) {
        self.inserts += other.inserts;
        self.updates += other.updates;
        self.chunks += other.chunks;
    }
}

/// Pulls every change of `identity_key`'s rows from `reader` into `writer`.
///
/// The writer learns the user first, then requests chunks from its cursor
/// until a chunk completes the pass. A failed chunk ends the run; the
/// cursor keeps what was merged so the run can simply be repeated. A reader
/// failure is recorded on the writer's cursor before it is returned.
pub async fn run_sync(
    reader: &dyn SyncReader,
    writer: &dyn SyncWriter,
    identity_key: &str,
    config: &SyncConfig,
) -> SyncResult<SyncTotals> {
    let reader_settings = reader.settings().await?;
    let writer_settings = writer.settings().await?;
    if reader_settings.storage_identity_key == writer_settings.storage_identity_key {
        return Err(WalletError::invalid_parameter(
            "storageIdentityKey",
            "an instance cannot sync with itself",
        )
        .into());
    }
    if reader_settings.chain != writer_settings.chain {
        return Err(WalletError::invalid_parameter(
            "chain",
            format!(
                "reader is on {}, writer is on {}",
                reader_settings.chain, writer_settings.chain
            ),
        )
        .into());
    }

    writer.find_or_insert_user(identity_key).await?;

    let mut totals = SyncTotals::default();
    loop {
        let args = writer
            .request_sync_chunk_args(identity_key, &reader_settings, config)
            .await?;
        let chunk = match reader.get_sync_chunk(&args).await {
            Ok(chunk) => chunk,
            Err(err) => {
                if let Err(record) = writer
                    .record_remote_error(identity_key, &reader_settings, &err.to_string())
                    .await
                {
                    warn!(error = %record, "could not record reader failure");
                }
                return Err(err);
            }
        };
        let result = writer.process_sync_chunk(&args, &chunk).await?;
        totals += result;
        debug!(chunk = totals.chunks, rows = chunk.row_count(), "sync round");
        if result.done {
            break;
        }
    }

    info!(
        from = %reader_settings.storage_name,
        to = %writer_settings.storage_name,
        inserts = totals.inserts,
        updates = totals.updates,
        chunks = totals.chunks,
        "sync pass complete"
    );
    Ok(totals)
}
