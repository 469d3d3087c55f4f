//! The storage manager.

use crate::auth::{AuthId, UserBinding};
use crate::config::ManagerConfig;
use crate::error::ManagerResult;
use crate::gate::{Gate, GateState};
use crate::lease::{ReaderLease, SyncLease, WriterLease};
use parking_lot::RwLock;
use std::future::Future;
use std::sync::Arc;
use tracing::info;
use walletdb_core::{Settings, StorageExt, User, WalletStorage};

/// Fronts one active storage instance and its backups for a single wallet
/// owner.
///
/// Ordinary reads and writes take reader or writer leases on the active
/// instance; structural work (sync, backups, switching the active
/// instance) takes the exclusive sync lease.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use walletdb_core::StorageConfig;
/// use walletdb_manager::{AuthId, ManagerConfig, WalletStorageManager};
/// use walletdb_storage::InMemoryStorage;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let active = Arc::new(InMemoryStorage::new(StorageConfig::new("main")));
/// let manager = WalletStorageManager::new("alice", active, ManagerConfig::default());
/// let auth = AuthId::new("alice");
///
/// manager.make_available(&auth).await?;
/// let (user, _) = manager.find_or_insert_user(&auth).await?;
/// assert_eq!(user.identity_key, "alice");
/// # Ok(())
/// # }
/// ```
pub struct WalletStorageManager {
    config: ManagerConfig,
    stores: RwLock<Vec<Arc<dyn WalletStorage>>>,
    gate: Arc<Gate>,
    binding: UserBinding,
}

impl WalletStorageManager {
    /// Creates a manager for `identity_key` with `active` as the only
    /// instance.
    pub fn new(
        identity_key: impl Into<String>,
        active: Arc<dyn WalletStorage>,
        config: ManagerConfig,
    ) -> Self {
        Self::with_backups(identity_key, active, Vec::new(), config)
    }

    /// Creates a manager with backups already attached.
    pub fn with_backups(
        identity_key: impl Into<String>,
        active: Arc<dyn WalletStorage>,
        backups: Vec<Arc<dyn WalletStorage>>,
        config: ManagerConfig,
    ) -> Self {
        let mut stores = Vec::with_capacity(backups.len() + 1);
        stores.push(active);
        stores.extend(backups);
        Self {
            gate: Arc::new(Gate::new(config.single_writer)),
            config,
            stores: RwLock::new(stores),
            binding: UserBinding::new(identity_key),
        }
    }

    /// Identity key the manager is bound to.
    pub fn identity_key(&self) -> &str {
        self.binding.identity_key()
    }

    /// Manager configuration.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Current gate counters.
    pub fn gate_state(&self) -> GateState {
        self.gate.state()
    }

    /// The active instance.
    pub fn active(&self) -> Arc<dyn WalletStorage> {
        Arc::clone(&self.stores.read()[0])
    }

    /// Every instance, active first.
    pub fn stores(&self) -> Vec<Arc<dyn WalletStorage>> {
        self.stores.read().clone()
    }

    /// The backup instances.
    pub fn backups(&self) -> Vec<Arc<dyn WalletStorage>> {
        self.stores.read()[1..].to_vec()
    }

    /// Settings of the active instance.
    pub fn active_settings(&self) -> ManagerResult<Settings> {
        Ok(self.active().settings()?)
    }

    /// Returns true when the active instance is available.
    pub fn is_available(&self) -> bool {
        self.active().is_available()
    }

    /// Cached local id of the owner in the active instance.
    pub fn cached_user_id(&self) -> Option<i64> {
        self.binding.cached()
    }

    pub(crate) fn set_stores(&self, stores: Vec<Arc<dyn WalletStorage>>) {
        *self.stores.write() = stores;
    }

    pub(crate) fn push_store(&self, storage: Arc<dyn WalletStorage>) {
        self.stores.write().push(storage);
    }

    pub(crate) fn binding(&self) -> &UserBinding {
        &self.binding
    }

    // Leases

    /// Waits for shared access to the active instance.
    pub async fn acquire_reader(&self) -> ReaderLease {
        self.gate.enter_reader().await;
        ReaderLease::new(Arc::clone(&self.gate), self.active())
    }

    /// Waits for mutating access to the active instance.
    pub async fn acquire_writer(&self) -> WriterLease {
        self.gate.enter_writer().await;
        WriterLease::new(Arc::clone(&self.gate), self.active())
    }

    /// Waits for exclusive access: takes the sync lock, then waits for
    /// outstanding leases to drain.
    pub async fn acquire_sync(&self) -> SyncLease {
        self.gate.lock_sync().await;
        let lease = SyncLease::new(Arc::clone(&self.gate));
        self.gate.drained().await;
        lease
    }

    /// Runs `f` on the active instance under a reader lease.
    pub async fn run_as_reader<F, Fut, T>(&self, f: F) -> ManagerResult<T>
    where
        F: FnOnce(Arc<dyn WalletStorage>) -> Fut,
        Fut: Future<Output = ManagerResult<T>>,
    {
        let lease = self.acquire_reader().await;
        f(Arc::clone(lease.storage())).await
    }

    /// Runs `f` on the active instance under a writer lease.
    pub async fn run_as_writer<F, Fut, T>(&self, f: F) -> ManagerResult<T>
    where
        F: FnOnce(Arc<dyn WalletStorage>) -> Fut,
        Fut: Future<Output = ManagerResult<T>>,
    {
        let lease = self.acquire_writer().await;
        f(Arc::clone(lease.storage())).await
    }

    /// Runs `f` on every instance, active first, under the sync lease.
    pub async fn run_as_sync<F, Fut, T>(&self, f: F) -> ManagerResult<T>
    where
        F: FnOnce(Vec<Arc<dyn WalletStorage>>) -> Fut,
        Fut: Future<Output = ManagerResult<T>>,
    {
        let _lease = self.acquire_sync().await;
        f(self.stores()).await
    }

    // User resolution

    /// Local id of the owner in `storage`, inserting the user on first
    /// use. Call with a writer lease held.
    pub(crate) async fn user_id_for_writer(&self, storage: &dyn WalletStorage) -> ManagerResult<i64> {
        if let Some(user_id) = self.binding.cached() {
            return Ok(user_id);
        }
        let (user, _) = storage.find_or_insert_user(self.identity_key()).await?;
        Ok(self.binding.remember(user.user_id)?)
    }

    /// Local id of the owner in `storage`, if it exists. Call with a
    /// reader lease held.
    pub(crate) async fn user_id_for_reader(
        &self,
        storage: &dyn WalletStorage,
    ) -> ManagerResult<Option<i64>> {
        if let Some(user_id) = self.binding.cached() {
            return Ok(Some(user_id));
        }
        Ok(storage
            .find_user(self.identity_key())
            .await?
            .map(|user| user.user_id))
    }

    // Instance lifecycle

    /// Makes the active instance available and returns its settings.
    pub async fn make_available(&self, auth: &AuthId) -> ManagerResult<Settings> {
        self.binding.authorize(auth)?;
        let lease = self.acquire_writer().await;
        let settings = lease.make_available().await?;
        info!(storage = %settings.storage_name, "active storage available");
        Ok(settings)
    }

    /// Migrates the active instance, returning its schema version.
    pub async fn migrate(
        &self,
        auth: &AuthId,
        storage_name: &str,
        storage_identity_key: &str,
    ) -> ManagerResult<String> {
        self.binding.authorize(auth)?;
        let lease = self.acquire_writer().await;
        let version = lease.migrate(storage_name, storage_identity_key).await?;
        info!(storage = storage_name, version = %version, "active storage migrated");
        Ok(version)
    }

    /// Drops every row held by the active instance.
    pub async fn destroy(&self, auth: &AuthId) -> ManagerResult<()> {
        self.binding.authorize(auth)?;
        let lease = self.acquire_writer().await;
        lease.destroy().await?;
        self.binding.reset();
        info!("active storage destroyed");
        Ok(())
    }

    /// Returns the owner's user row in the active instance, creating it
    /// when missing. The flag is true when inserted.
    pub async fn find_or_insert_user(&self, auth: &AuthId) -> ManagerResult<(User, bool)> {
        self.binding.authorize(auth)?;
        let lease = self.acquire_writer().await;
        let (user, inserted) = lease.find_or_insert_user(self.identity_key()).await?;
        self.binding.remember(user.user_id)?;
        Ok((user, inserted))
    }
}

impl std::fmt::Debug for WalletStorageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletStorageManager")
            .field("identity_key", &self.identity_key())
            .field("stores", &self.stores.read().len())
            .field("gate", &self.gate.state())
            .finish()
    }
}
