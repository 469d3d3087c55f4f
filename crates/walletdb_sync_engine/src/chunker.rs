//! Reader side of the chunk protocol.

use crate::error::{SyncError, SyncResult};
use tracing::debug;
use walletdb_core::{EntityKind, RowQuery, StorageExt, WalletStorage};
use walletdb_sync_protocol::{RequestSyncChunkArgs, SyncChunk};

/// Remaining chunk budget.
struct Budget {
    items: usize,
    size: usize,
    taken: usize,
}

impl Budget {
    /// Returns false once the row no longer fits. The first row always fits.
    fn take(&mut self, size: usize) -> bool {
        if self.items == 0 || (self.taken > 0 && size > self.size) {
            return false;
        }
        self.items -= 1;
        self.size = self.size.saturating_sub(size);
        self.taken += 1;
        true
    }
}

/// Produces the next chunk of the requesting user's rows.
///
/// Every pass walks the user's full row set. Kinds are visited in
/// dependency order. For each kind, rows are skipped up to the kind's offset
/// and appended while both budgets hold. The first exhausted budget ends the chunk so
/// that no row is sent ahead of a parent still waiting in an earlier kind.
pub async fn get_sync_chunk(
    storage: &dyn WalletStorage,
    args: &RequestSyncChunkArgs,
) -> SyncResult<SyncChunk> {
    let settings = storage.settings()?;
    if args.from_storage_identity_key != settings.storage_identity_key {
        return Err(SyncError::ChunkMismatch(format!(
            "request addressed to {}, this instance is {}",
            args.from_storage_identity_key, settings.storage_identity_key
        )));
    }
    let mut chunk = SyncChunk::new(
        settings.storage_identity_key,
        args.to_storage_identity_key.clone(),
        args.identity_key.clone(),
    );
    let Some(user) = storage.find_user(&args.identity_key).await? else {
        debug!(identity_key = %args.identity_key, "user unknown here, nothing to send");
        return Ok(chunk);
    };
    chunk.user = Some(user.clone());

    let mut budget = Budget {
        items: args.max_items.max(1),
        size: args.max_rough_size,
        taken: 0,
    };
    'kinds: for kind in EntityKind::SYNC_ORDER {
        if kind == EntityKind::User {
            continue;
        }
        let query = RowQuery::new(kind)
            .for_user(user.user_id)
            .include_deleted(true)
            .paged(args.offset_for(kind), budget.items);
        for row in storage.find_rows(&query).await? {
            if !budget.take(row.rough_size()) {
                break 'kinds;
            }
            chunk.push_row(row);
        }
        if budget.items == 0 {
            break;
        }
    }

    debug!(
        from = %chunk.from_storage_identity_key,
        to = %chunk.to_storage_identity_key,
        rows = budget.taken,
        "produced sync chunk"
    );
    Ok(chunk)
}
