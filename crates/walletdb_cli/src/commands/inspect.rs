//! Inspect command implementation.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use walletdb_core::{
    EntityKind, RowQuery, Settings, StorageExt, SyncState, SyncStatus, Timestamp, User,
    WalletStorage,
};
use walletdb_storage::InMemoryStorage;

/// Snapshot inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Snapshot path.
    pub path: String,
    /// File size in bytes.
    pub file_size: u64,
    /// Instance settings.
    pub settings: Settings,
    /// Rows per kind, soft-deleted rows included.
    pub counts: BTreeMap<String, usize>,
    /// Users and their cursors (if requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<UserSummary>>,
}

/// One user of the instance.
#[derive(Debug, Serialize)]
pub struct UserSummary {
    /// Local user id.
    pub user_id: i64,
    /// Identity key.
    pub identity_key: String,
    /// Instance the user considers active.
    pub active_storage: Option<String>,
    /// Cursors against remote instances.
    pub cursors: Vec<CursorSummary>,
}

/// One sync cursor.
#[derive(Debug, Serialize)]
pub struct CursorSummary {
    /// Remote instance identity key.
    pub storage_identity_key: String,
    /// Remote instance name.
    pub storage_name: String,
    /// Status after the last chunk.
    pub status: SyncStatus,
    /// Newest merged `updated_at` as of the last completed pass.
    pub when: Option<Timestamp>,
    /// Last local error.
    pub error: Option<String>,
    /// Last error reported by the remote instance.
    pub remote_error: Option<String>,
}

/// Runs the inspect command.
pub fn run(path: &Path, show_users: bool, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let result = super::runtime()?.block_on(inspect(path, show_users))?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_text_output(&result),
    }

    Ok(())
}

async fn inspect(path: &Path, show_users: bool) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let storage = super::open(path).await?;
    let settings = storage.settings()?;
    let counts = storage
        .counts()
        .into_iter()
        .map(|(kind, count)| (kind.to_string(), count))
        .collect();
    let users = if show_users {
        Some(user_summaries(&storage).await?)
    } else {
        None
    };

    Ok(InspectResult {
        path: path.display().to_string(),
        file_size: std::fs::metadata(path)?.len(),
        settings,
        counts,
        users,
    })
}

async fn user_summaries(
    storage: &InMemoryStorage,
) -> Result<Vec<UserSummary>, Box<dyn std::error::Error>> {
    let users: Vec<User> = storage
        .find_entities(&RowQuery::new(EntityKind::User))
        .await?;

    let states = storage.sync_states();
    let mut summaries = Vec::with_capacity(users.len());
    for user in users {
        summaries.push(UserSummary {
            user_id: user.user_id,
            identity_key: user.identity_key,
            active_storage: user.active_storage,
            cursors: states
                .iter()
                .filter(|state| state.user_id == user.user_id)
                .cloned()
                .map(|state: SyncState| CursorSummary {
                    storage_identity_key: state.storage_identity_key,
                    storage_name: state.storage_name,
                    status: state.status,
                    when: state.when,
                    error: state.error_local,
                    remote_error: state.error_other,
                })
                .collect(),
        });
    }
    Ok(summaries)
}

fn print_text_output(result: &InspectResult) {
    println!("walletdb Snapshot Inspection");
    println!("============================");
    println!();
    println!("Path: {}", result.path);
    println!("Size: {}", format_size(result.file_size));
    println!();
    println!("Instance:");
    println!("  Name:         {}", result.settings.storage_name);
    println!("  Identity key: {}", result.settings.storage_identity_key);
    println!("  Chain:        {}", result.settings.chain);
    println!("  Backend:      {}", result.settings.db_type);
    println!();
    println!("Rows:");
    for (kind, count) in &result.counts {
        println!("  {:<20} {}", kind, count);
    }

    if let Some(users) = &result.users {
        println!();
        println!("Users:");
        for user in users {
            println!(
                "  [{}] {} (active: {})",
                user.user_id,
                user.identity_key,
                user.active_storage.as_deref().unwrap_or("-")
            );
            for cursor in &user.cursors {
                let when = cursor
                    .when
                    .map(|w| w.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string());
                println!(
                    "      {} ({}) {:?}, last pass {}",
                    cursor.storage_name, cursor.storage_identity_key, cursor.status, when
                );
                if let Some(error) = &cursor.error {
                    println!("      error: {}", error);
                }
                if let Some(error) = &cursor.remote_error {
                    println!("      remote error: {}", error);
                }
            }
        }
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} bytes", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use walletdb_testkit::TempSnapshotDir;

    #[test]
    fn sizes() {
        assert_eq!(format_size(10), "10 bytes");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn inspect_counts_rows_and_users() {
        let dir = TempSnapshotDir::new();
        let path = dir.file("main.wdb");
        crate::commands::init::run(
            &path,
            "main",
            Some("main".into()),
            walletdb_core::Chain::Test,
            false,
        )
        .unwrap();

        let rt = crate::commands::runtime().unwrap();
        let storage = rt.block_on(crate::commands::open(&path)).unwrap();
        rt.block_on(storage.find_or_insert_user("alice")).unwrap();
        storage.save_snapshot(&path).unwrap();

        let result = rt.block_on(inspect(&path, true)).unwrap();
        assert_eq!(result.settings.storage_identity_key, "main");
        assert_eq!(result.counts["user"], 1);
        let users = result.users.unwrap();
        assert_eq!(users[0].identity_key, "alice");
        assert!(users[0].cursors.is_empty());
    }
}
