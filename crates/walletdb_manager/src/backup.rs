//! Structural operations that run under the sync lease.

use crate::auth::AuthId;
use crate::error::ManagerResult;
use crate::manager::WalletStorageManager;
use std::sync::Arc;
use tracing::info;
use walletdb_core::{Entity, Settings, StorageExt, WalletError, WalletStorage};
use walletdb_sync_engine::{run_sync, LocalSyncPeer, SyncReader, SyncTotals, SyncWriter};

/// Outcome of syncing the active instance into one backup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupReport {
    /// Identity key of the backup.
    pub storage_identity_key: String,
    /// Name of the backup.
    pub storage_name: String,
    /// Rows merged into it.
    pub totals: SyncTotals,
}

impl WalletStorageManager {
    /// Pulls the owner's rows from `reader` into the active instance.
    pub async fn sync_from_reader(
        &self,
        auth: &AuthId,
        reader: &dyn SyncReader,
    ) -> ManagerResult<SyncTotals> {
        self.binding().authorize(auth)?;
        let _lease = self.acquire_sync().await;
        let writer = LocalSyncPeer::new(self.active());
        Ok(run_sync(reader, &writer, self.identity_key(), &self.config().sync).await?)
    }

    /// Pushes the owner's rows from the active instance into `writer`.
    pub async fn sync_to_writer(
        &self,
        auth: &AuthId,
        writer: &dyn SyncWriter,
    ) -> ManagerResult<SyncTotals> {
        self.binding().authorize(auth)?;
        let _lease = self.acquire_sync().await;
        let reader = LocalSyncPeer::new(self.active());
        Ok(run_sync(&reader, writer, self.identity_key(), &self.config().sync).await?)
    }

    /// Brings every backup up to date with the active instance. Stops at
    /// the first backup that fails.
    pub async fn update_backups(&self, auth: &AuthId) -> ManagerResult<Vec<BackupReport>> {
        self.binding().authorize(auth)?;
        let _lease = self.acquire_sync().await;
        let reader = LocalSyncPeer::new(self.active());

        let mut reports = Vec::new();
        for backup in self.backups() {
            let settings = backup.settings()?;
            let writer = LocalSyncPeer::new(backup);
            let totals = run_sync(&reader, &writer, self.identity_key(), &self.config().sync).await?;
            reports.push(BackupReport {
                storage_identity_key: settings.storage_identity_key,
                storage_name: settings.storage_name,
                totals,
            });
        }
        info!(backups = reports.len(), "backups updated");
        Ok(reports)
    }

    /// Makes the instance with `storage_identity_key` the active one.
    ///
    /// The current active instance is synced into it first, then it moves
    /// to the front and records itself as the owner's active storage. The
    /// cached user id is dropped because ids differ between instances.
    pub async fn set_active(
        &self,
        auth: &AuthId,
        storage_identity_key: &str,
    ) -> ManagerResult<SyncTotals> {
        self.binding().authorize(auth)?;
        let _lease = self.acquire_sync().await;

        let mut stores = self.stores();
        let index = stores
            .iter()
            .position(|s| matches!(s.settings(), Ok(settings) if settings.storage_identity_key == storage_identity_key))
            .ok_or_else(|| {
                WalletError::invalid_parameter(
                    "storageIdentityKey",
                    format!("{storage_identity_key} is not an instance of this wallet"),
                )
            })?;
        if index == 0 {
            return Ok(SyncTotals::default());
        }

        let target = Arc::clone(&stores[index]);
        let reader = LocalSyncPeer::new(self.active());
        let writer = LocalSyncPeer::new(Arc::clone(&target));
        let totals = run_sync(&reader, &writer, self.identity_key(), &self.config().sync).await?;

        let (mut user, _) = target.find_or_insert_user(self.identity_key()).await?;
        user.active_storage = Some(storage_identity_key.to_string());
        user.touch();
        target.update_entity(&user).await?;

        let target = stores.remove(index);
        stores.insert(0, target);
        self.set_stores(stores);
        self.binding().reset();

        info!(active = storage_identity_key, "active storage switched");
        Ok(totals)
    }

    /// Attaches a backup instance, making it available first.
    pub async fn add_storage(
        &self,
        auth: &AuthId,
        storage: Arc<dyn WalletStorage>,
    ) -> ManagerResult<Settings> {
        self.binding().authorize(auth)?;
        let _lease = self.acquire_sync().await;

        let settings = if storage.is_available() {
            storage.settings()?
        } else {
            storage.make_available().await?
        };
        let active = self.active().settings()?;
        if settings.chain != active.chain {
            return Err(WalletError::invalid_parameter(
                "chain",
                format!("backup is on {}, wallet is on {}", settings.chain, active.chain),
            )
            .into());
        }
        let duplicate = self.stores().iter().any(|s| {
            matches!(s.settings(), Ok(existing) if existing.storage_identity_key == settings.storage_identity_key)
        });
        if duplicate {
            return Err(WalletError::invalid_parameter(
                "storageIdentityKey",
                format!("{} is already attached", settings.storage_identity_key),
            )
            .into());
        }

        self.push_store(storage);
        info!(backup = %settings.storage_name, "backup storage added");
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{CreateActionArgs, CreateActionOutput};
    use crate::config::ManagerConfig;
    use std::time::Duration;
    use walletdb_core::{Chain, EntityKind, ErrorKind, Transaction};
    use walletdb_testkit::TestStorage;

    const ALICE: &str = "alice";

    async fn wallet_with_backup() -> (Arc<WalletStorageManager>, TestStorage, TestStorage, AuthId) {
        let main = TestStorage::memory("main").await;
        let backup = TestStorage::memory("backup").await;
        let manager = WalletStorageManager::with_backups(
            ALICE,
            main.dyn_storage(),
            vec![backup.dyn_storage()],
            ManagerConfig::default(),
        );
        (Arc::new(manager), main, backup, AuthId::new(ALICE))
    }

    async fn spend(manager: &WalletStorageManager, auth: &AuthId, description: &str) -> String {
        let args = CreateActionArgs {
            description: description.into(),
            outputs: vec![CreateActionOutput {
                satoshis: 50,
                locking_script: vec![0x51],
                output_description: String::new(),
                basket: Some("default".into()),
                tags: vec!["cold".into()],
                custom_instructions: None,
            }],
            labels: vec!["bills".into()],
            ..Default::default()
        };
        manager.create_action(auth, args).await.unwrap().reference
    }

    #[tokio::test]
    async fn update_backups_copies_wallet() {
        let (manager, main, backup, auth) = wallet_with_backup().await;
        spend(&manager, &auth, "rent").await;

        let reports = manager.update_backups(&auth).await.unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].storage_identity_key, "backup");
        assert!(reports[0].totals.inserts > 0);

        for kind in [
            EntityKind::Transaction,
            EntityKind::Output,
            EntityKind::OutputBasket,
            EntityKind::TxLabelMap,
            EntityKind::OutputTagMap,
        ] {
            assert_eq!(backup.counts()[&kind], main.counts()[&kind], "{kind}");
        }

        let again = manager.update_backups(&auth).await.unwrap();
        assert_eq!(again[0].totals.inserts, 0);
    }

    #[tokio::test]
    async fn set_active_switches_and_resets_user() {
        let (manager, _main, backup, auth) = wallet_with_backup().await;
        let reference = spend(&manager, &auth, "rent").await;
        let old_user_id = manager.cached_user_id();
        assert!(old_user_id.is_some());

        manager.set_active(&auth, "backup").await.unwrap();
        assert_eq!(manager.active_settings().unwrap().storage_identity_key, "backup");
        assert_eq!(manager.cached_user_id(), None);
        assert_eq!(manager.backups().len(), 1);

        let user = backup.find_user(ALICE).await.unwrap().unwrap();
        assert_eq!(user.active_storage.as_deref(), Some("backup"));

        // writes now land in the new active instance
        manager.abort_action(&auth, &reference).await.unwrap();
        let query = walletdb_core::RowQuery::new(EntityKind::Transaction);
        let txs: Vec<Transaction> = backup.find_entities(&query).await.unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].status, walletdb_core::TransactionStatus::Failed);
    }

    #[tokio::test]
    async fn set_active_to_current_is_noop() {
        let (manager, _main, _backup, auth) = wallet_with_backup().await;
        let totals = manager.set_active(&auth, "main").await.unwrap();
        assert_eq!(totals, SyncTotals::default());

        let err = manager.set_active(&auth, "elsewhere").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    }

    #[tokio::test]
    async fn add_storage_checks_chain_and_duplicates() {
        let (manager, _main, backup, auth) = wallet_with_backup().await;

        let err = manager
            .add_storage(&auth, backup.dyn_storage())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);

        let mainnet = TestStorage::on_chain("mainnet", Chain::Main).await;
        let err = manager
            .add_storage(&auth, mainnet.dyn_storage())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);

        let second = TestStorage::memory("second").await;
        manager.add_storage(&auth, second.dyn_storage()).await.unwrap();
        assert_eq!(manager.backups().len(), 2);
    }

    #[tokio::test]
    async fn sync_waits_for_outstanding_writer() {
        let (manager, _main, _backup, auth) = wallet_with_backup().await;
        let writer = manager.acquire_writer().await;

        let pending = {
            let manager = Arc::clone(&manager);
            let auth = auth.clone();
            tokio::spawn(async move { manager.update_backups(&auth).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!pending.is_finished());

        drop(writer);
        let reports = tokio::time::timeout(Duration::from_secs(5), pending)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(reports.len(), 1);
    }

    #[tokio::test]
    async fn sync_from_reader_pulls_into_active() {
        let (manager, _main, _backup, auth) = wallet_with_backup().await;
        let other = TestStorage::memory("other").await;
        walletdb_testkit::seed_wallet(other.storage.as_ref(), ALICE).await;

        let reader = LocalSyncPeer::new(other.dyn_storage());
        let totals = manager.sync_from_reader(&auth, &reader).await.unwrap();
        assert_eq!(totals.inserts, 12);

        let baskets = manager.find_output_baskets(&auth, None).await.unwrap();
        assert_eq!(baskets.len(), 1);
    }
}
