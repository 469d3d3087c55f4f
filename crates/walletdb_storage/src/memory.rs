//! In-memory storage instance.

use crate::error::{SnapshotError, SnapshotResult};
use crate::tables::Tables;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;
use walletdb_core::{
    new_reference, EntityKind, EntityRow, NaturalKey, RowQuery, Settings, StorageConfig,
    SyncState, WalletError, WalletResult, WalletStorage,
};

/// Schema version reported by [`WalletStorage::migrate`].
pub const SCHEMA_VERSION: &str = "walletdb-memory-v1";

/// Snapshot file format version.
pub const SNAPSHOT_VERSION: u32 = 1;

const DB_TYPE: &str = "memory";

#[derive(Serialize, Deserialize)]
struct SnapshotFile {
    version: u32,
    tables: Tables,
}

/// A wallet storage instance held entirely in memory.
///
/// Local ids are allocated per table starting at 1. All rows live behind a
/// single `RwLock`, so each trait call is atomic with respect to the others.
/// The contents can be written to and restored from a CBOR snapshot file.
///
/// # Example
///
/// ```rust
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use walletdb_core::{StorageConfig, StorageExt, WalletStorage};
/// use walletdb_storage::InMemoryStorage;
///
/// let storage = InMemoryStorage::new(StorageConfig::new("primary"));
/// storage.make_available().await.unwrap();
/// let (user, inserted) = storage.find_or_insert_user("02ab").await.unwrap();
/// assert!(inserted);
/// assert_eq!(user.user_id, 1);
/// # }
/// ```
#[derive(Debug)]
pub struct InMemoryStorage {
    config: StorageConfig,
    tables: RwLock<Tables>,
    available: AtomicBool,
}

impl InMemoryStorage {
    /// Creates an empty, not yet available instance.
    #[must_use]
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            tables: RwLock::new(Tables::default()),
            available: AtomicBool::new(false),
        }
    }

    /// Restores an instance from a snapshot file.
    ///
    /// The instance still has to be made available before use.
    pub fn open_snapshot(path: impl AsRef<Path>, config: StorageConfig) -> SnapshotResult<Self> {
        let file = File::open(path.as_ref())?;
        let snapshot: SnapshotFile = ciborium::from_reader(BufReader::new(file))
            .map_err(|e| SnapshotError::Corrupted(e.to_string()))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: snapshot.version,
                expected: SNAPSHOT_VERSION,
            });
        }
        debug!(path = %path.as_ref().display(), "opened snapshot");
        Ok(Self {
            config,
            tables: RwLock::new(snapshot.tables),
            available: AtomicBool::new(false),
        })
    }

    /// Writes the current contents to `path`.
    ///
    /// The file is written to a temporary sibling and renamed into place.
    pub fn save_snapshot(&self, path: impl AsRef<Path>) -> SnapshotResult<()> {
        let path = path.as_ref();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let snapshot = SnapshotFile {
            version: SNAPSHOT_VERSION,
            tables: self.tables.read().clone(),
        };

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            ciborium::into_writer(&snapshot, &mut writer)
                .map_err(|e| SnapshotError::Encode(e.to_string()))?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| SnapshotError::Io(e.error))?;
        debug!(path = %path.display(), "saved snapshot");
        Ok(())
    }

    /// Number of rows per kind, soft-deleted rows included.
    #[must_use]
    pub fn counts(&self) -> BTreeMap<EntityKind, usize> {
        let tables = self.tables.read();
        EntityKind::SYNC_ORDER
            .iter()
            .map(|&kind| (kind, tables.len(kind)))
            .collect()
    }

    /// Every sync cursor held by the instance, ordered by id.
    #[must_use]
    pub fn sync_states(&self) -> Vec<SyncState> {
        self.tables.read().sync_states.values().cloned().collect()
    }

    fn ensure_available(&self) -> WalletResult<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(WalletError::invalid_operation(
                "storage instance is not available",
            ))
        }
    }
}

#[async_trait]
impl WalletStorage for InMemoryStorage {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    async fn make_available(&self) -> WalletResult<Settings> {
        let existing = self.tables.read().settings.clone();
        let settings = match existing {
            Some(settings) => settings,
            None => {
                let key = self
                    .config
                    .storage_identity_key
                    .clone()
                    .unwrap_or_else(new_reference);
                self.migrate(&self.config.storage_name, &key).await?;
                self.tables
                    .read()
                    .settings
                    .clone()
                    .ok_or_else(|| WalletError::internal("migrate left no settings"))?
            }
        };
        self.available.store(true, Ordering::Release);
        debug!(
            storage = %settings.storage_name,
            identity = %settings.storage_identity_key,
            "storage available"
        );
        Ok(settings)
    }

    async fn migrate(&self, storage_name: &str, storage_identity_key: &str) -> WalletResult<String> {
        let mut tables = self.tables.write();
        if tables.settings.is_none() {
            tables.settings = Some(Settings::new(
                storage_identity_key,
                storage_name,
                self.config.chain,
                DB_TYPE,
                self.config.max_output_script,
            ));
            debug!(storage = storage_name, "migrated fresh instance");
        }
        Ok(SCHEMA_VERSION.to_string())
    }

    async fn destroy(&self) -> WalletResult<()> {
        *self.tables.write() = Tables::default();
        self.available.store(false, Ordering::Release);
        debug!(storage = %self.config.storage_name, "destroyed");
        Ok(())
    }

    fn settings(&self) -> WalletResult<Settings> {
        self.ensure_available()?;
        self.tables
            .read()
            .settings
            .clone()
            .ok_or_else(|| WalletError::invalid_operation("storage instance has no settings"))
    }

    async fn find_by_natural_key(&self, key: &NaturalKey) -> WalletResult<Option<EntityRow>> {
        self.ensure_available()?;
        Ok(self.tables.read().find_by_key(key).cloned())
    }

    async fn find_by_id(&self, kind: EntityKind, id: i64) -> WalletResult<Option<EntityRow>> {
        self.ensure_available()?;
        Ok(self.tables.read().get(kind, id).cloned())
    }

    async fn find_rows(&self, query: &RowQuery) -> WalletResult<Vec<EntityRow>> {
        self.ensure_available()?;
        Ok(self.tables.read().select(query))
    }

    async fn insert_row(&self, mut row: EntityRow) -> WalletResult<i64> {
        self.ensure_available()?;
        let mut tables = self.tables.write();
        let key = row.natural_key();
        if tables.find_by_key(&key).is_some() {
            return Err(WalletError::invalid_parameter(
                row.kind().name(),
                format!("duplicate natural key {key}"),
            ));
        }
        tables.check_references(&row)?;
        let id = tables.allocate_id(row.kind());
        row.set_id(id);
        debug!(kind = %row.kind(), id, "insert");
        tables.put(row);
        Ok(id)
    }

    async fn update_row(&self, row: &EntityRow) -> WalletResult<()> {
        self.ensure_available()?;
        let mut tables = self.tables.write();
        if tables.get(row.kind(), row.id()).is_none() {
            return Err(WalletError::not_found(row.kind(), row.id()));
        }
        if let Some(other) = tables.find_by_key(&row.natural_key()) {
            if other.id() != row.id() {
                return Err(WalletError::invalid_parameter(
                    row.kind().name(),
                    format!("natural key {} belongs to id {}", row.natural_key(), other.id()),
                ));
            }
        }
        tables.check_references(row)?;
        tables.put(row.clone());
        Ok(())
    }

    async fn find_sync_state(
        &self,
        user_id: i64,
        storage_identity_key: &str,
    ) -> WalletResult<Option<SyncState>> {
        self.ensure_available()?;
        Ok(self
            .tables
            .read()
            .sync_states
            .values()
            .find(|s| s.user_id == user_id && s.storage_identity_key == storage_identity_key)
            .cloned())
    }

    async fn insert_sync_state(&self, state: &SyncState) -> WalletResult<i64> {
        self.ensure_available()?;
        let mut tables = self.tables.write();
        let duplicate = tables.sync_states.values().any(|s| {
            s.ref_num == state.ref_num
                || (s.user_id == state.user_id
                    && s.storage_identity_key == state.storage_identity_key)
        });
        if duplicate {
            return Err(WalletError::invalid_parameter(
                "syncState",
                format!("sync state for {} already exists", state.storage_identity_key),
            ));
        }
        tables.next_sync_state_id += 1;
        let id = tables.next_sync_state_id;
        let mut state = state.clone();
        state.sync_state_id = id;
        tables.sync_states.insert(id, state);
        Ok(id)
    }

    async fn update_sync_state(&self, state: &SyncState) -> WalletResult<()> {
        self.ensure_available()?;
        let mut tables = self.tables.write();
        match tables.sync_states.get_mut(&state.sync_state_id) {
            Some(slot) => {
                *slot = state.clone();
                Ok(())
            }
            None => Err(WalletError::invalid_parameter(
                "syncState",
                format!("no sync state with id {}", state.sync_state_id),
            )),
        }
    }
}
