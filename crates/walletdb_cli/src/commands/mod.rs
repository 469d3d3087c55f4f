//! CLI command implementations.

pub mod init;
pub mod inspect;
pub mod sync;

use std::path::Path;
use tokio::runtime::Runtime;
use walletdb_core::{StorageConfig, WalletStorage};
use walletdb_storage::InMemoryStorage;

/// Builds the single-threaded runtime commands drive storage calls on.
pub(crate) fn runtime() -> std::io::Result<Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
}

/// Opens a snapshot and makes it available.
pub(crate) async fn open(path: &Path) -> Result<InMemoryStorage, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No snapshot found at {:?}", path).into());
    }
    let storage = InMemoryStorage::open_snapshot(path, StorageConfig::default())?;
    storage.make_available().await?;
    Ok(storage)
}
