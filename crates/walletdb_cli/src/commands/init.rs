//! Init command implementation.

use std::path::Path;
use tracing::info;
use walletdb_core::{Chain, StorageConfig, WalletStorage};
use walletdb_storage::InMemoryStorage;

/// Runs the init command.
pub fn run(
    path: &Path,
    name: &str,
    identity_key: Option<String>,
    chain: Chain,
    force: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() && !force {
        return Err(format!("{:?} already exists (use --force to replace it)", path).into());
    }

    let mut config = StorageConfig::new(name).chain(chain);
    if let Some(key) = identity_key {
        config = config.storage_identity_key(key);
    }
    let storage = InMemoryStorage::new(config);
    let settings = super::runtime()?.block_on(storage.make_available())?;
    storage.save_snapshot(path)?;
    info!(path = %path.display(), "snapshot created");

    println!("✓ Snapshot created");
    println!("  Path: {:?}", path);
    println!("  Name: {}", settings.storage_name);
    println!("  Identity key: {}", settings.storage_identity_key);
    println!("  Chain: {}", settings.chain);

    Ok(())
}
