//! Sync command implementation.
//!
//! Loads both snapshots, merges the owner's rows from the source into the
//! destination chunk by chunk and writes the destination back. Every run
//! walks the source's full row set; the destination keeps a cursor for the
//! source, so an interrupted run resumes where it stopped and rows it
//! already holds merge as no-ops.

use std::path::Path;
use std::sync::Arc;
use tracing::info;
use walletdb_core::WalletStorage;
use walletdb_sync_engine::{run_sync, LocalSyncPeer, SyncConfig, SyncTotals};

/// Chunking and output options for the sync command.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Maximum rows per chunk.
    pub max_items: Option<usize>,
    /// Maximum rough byte size per chunk.
    pub max_size: Option<usize>,
    /// Merge without saving the destination.
    pub dry_run: bool,
}

impl SyncOptions {
    fn config(&self) -> SyncConfig {
        let mut config = SyncConfig::new();
        if let Some(items) = self.max_items {
            config = config.with_max_items(items);
        }
        if let Some(size) = self.max_size {
            config = config.with_max_rough_size(size);
        }
        config
    }
}

/// Runs the sync command.
pub fn run(
    from: &Path,
    to: &Path,
    identity_key: &str,
    options: SyncOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let totals = super::runtime()?.block_on(sync(from, to, identity_key, options))?;

    if options.dry_run {
        println!("Dry run - destination not saved");
    } else {
        println!("✓ Sync complete");
    }
    println!("  From: {:?}", from);
    println!("  To: {:?}", to);
    println!("  Inserted: {}", totals.inserts);
    println!("  Updated: {}", totals.updates);
    println!("  Chunks: {}", totals.chunks);

    Ok(())
}

async fn sync(
    from: &Path,
    to: &Path,
    identity_key: &str,
    options: SyncOptions,
) -> Result<SyncTotals, Box<dyn std::error::Error>> {
    let source = Arc::new(super::open(from).await?);
    let destination = Arc::new(super::open(to).await?);

    let reader = LocalSyncPeer::new(source);
    let writer = LocalSyncPeer::new(Arc::clone(&destination) as Arc<dyn WalletStorage>);
    let totals = run_sync(&reader, &writer, identity_key, &options.config()).await?;

    if !options.dry_run {
        destination.save_snapshot(to)?;
        info!(path = %to.display(), "destination saved");
    }
    Ok(totals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use walletdb_core::{Chain, EntityKind, OutputBasket, StorageExt};
    use walletdb_testkit::TempSnapshotDir;

    fn init(dir: &TempSnapshotDir, name: &str) -> std::path::PathBuf {
        let path = dir.file(&format!("{name}.wdb"));
        crate::commands::init::run(&path, name, Some(name.into()), Chain::Test, false).unwrap();
        path
    }

    #[test]
    fn sync_copies_rows_and_resumes() {
        let dir = TempSnapshotDir::new();
        let main = init(&dir, "main");
        let backup = init(&dir, "backup");

        let rt = crate::commands::runtime().unwrap();
        rt.block_on(async {
            let storage = crate::commands::open(&main).await.unwrap();
            let (user, _) = storage.find_or_insert_user("alice").await.unwrap();
            for name in ["default", "savings", "gifts"] {
                let mut basket = OutputBasket::new(user.user_id, name);
                storage.insert_entity(&mut basket).await.unwrap();
            }
            storage.save_snapshot(&main).unwrap();
        });

        let options = SyncOptions {
            max_items: Some(2),
            ..Default::default()
        };
        let totals = rt.block_on(sync(&main, &backup, "alice", options)).unwrap();
        assert_eq!(totals.inserts, 3);
        assert!(totals.chunks >= 2);

        let restored = rt.block_on(crate::commands::open(&backup)).unwrap();
        assert_eq!(restored.counts()[&EntityKind::OutputBasket], 3);
        assert_eq!(restored.sync_states().len(), 1);

        let again = rt.block_on(sync(&main, &backup, "alice", options)).unwrap();
        assert_eq!(again.inserts, 0);
    }

    #[test]
    fn dry_run_leaves_destination_untouched() {
        let dir = TempSnapshotDir::new();
        let main = init(&dir, "main");
        let backup = init(&dir, "backup");

        let rt = crate::commands::runtime().unwrap();
        rt.block_on(async {
            let storage = crate::commands::open(&main).await.unwrap();
            let (user, _) = storage.find_or_insert_user("alice").await.unwrap();
            let mut basket = OutputBasket::new(user.user_id, "default");
            storage.insert_entity(&mut basket).await.unwrap();
            storage.save_snapshot(&main).unwrap();
        });

        let options = SyncOptions {
            dry_run: true,
            ..Default::default()
        };
        let totals = rt.block_on(sync(&main, &backup, "alice", options)).unwrap();
        assert_eq!(totals.inserts, 1);

        let untouched = rt.block_on(crate::commands::open(&backup)).unwrap();
        assert_eq!(untouched.counts()[&EntityKind::OutputBasket], 0);
        assert!(untouched.sync_states().is_empty());
    }

    #[test]
    fn sync_into_itself_fails() {
        let dir = TempSnapshotDir::new();
        let main = init(&dir, "main");
        assert!(run(&main, &main, "alice", SyncOptions::default()).is_err());
    }
}
