//! Test fixtures and storage helpers.
//!
//! Provides ready-to-use storage instances and a seeded wallet that touches
//! every entity kind.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use walletdb_core::{
    Certificate, CertificateField, Chain, Commission, Output, OutputBasket, OutputTag,
    OutputTagMap, ProvenTx, ProvenTxReq, StorageConfig, StorageExt, Transaction,
    TransactionStatus, TxLabel, TxLabelMap, WalletStorage,
};
use walletdb_storage::InMemoryStorage;

/// An available in-memory storage instance.
///
/// The instance identity key equals its name, which keeps assertions
/// readable.
#[derive(Clone)]
pub struct TestStorage {
    /// The storage instance.
    pub storage: Arc<InMemoryStorage>,
}

impl TestStorage {
    /// Creates an available instance on the test chain.
    pub async fn memory(name: &str) -> Self {
        Self::on_chain(name, Chain::Test).await
    }

    /// Creates an available instance on `chain`.
    pub async fn on_chain(name: &str, chain: Chain) -> Self {
        let config = StorageConfig::new(name)
            .storage_identity_key(name)
            .chain(chain);
        let storage = InMemoryStorage::new(config);
        storage
            .make_available()
            .await
            .expect("Failed to make storage available");
        Self {
            storage: Arc::new(storage),
        }
    }

    /// The instance as a trait object.
    pub fn dyn_storage(&self) -> Arc<dyn WalletStorage> {
        self.storage.clone()
    }
}

impl std::ops::Deref for TestStorage {
    type Target = InMemoryStorage;

    fn deref(&self) -> &Self::Target {
        &self.storage
    }
}

/// Local ids of the rows created by [`seed_wallet`].
#[derive(Debug, Clone, Copy)]
pub struct SeededWallet {
    /// User.
    pub user_id: i64,
    /// Basket `default`.
    pub basket_id: i64,
    /// Label `payroll`.
    pub tx_label_id: i64,
    /// Tag `cold`.
    pub output_tag_id: i64,
    /// Identity certificate.
    pub certificate_id: i64,
    /// Completed, proven transaction.
    pub transaction_id: i64,
    /// First output of the transaction.
    pub output_id: i64,
    /// Proof of the transaction.
    pub proven_tx_id: i64,
}

/// Txid used for the seeded transaction.
pub const SEED_TXID: &str = "9f1c0d6a8e3b4f2a7c5d1e0b3a6f9c2d4e8b1a7f3c6d0e9b2a5f8c1d4e7b0a3c";

/// Creates one row of every kind for `identity_key`.
pub async fn seed_wallet(storage: &dyn WalletStorage, identity_key: &str) -> SeededWallet {
    let (user, _) = storage
        .find_or_insert_user(identity_key)
        .await
        .expect("Failed to insert user");
    let user_id = user.user_id;

    let mut basket = OutputBasket::new(user_id, "default");
    insert(storage, &mut basket).await;
    let mut label = TxLabel::new(user_id, "payroll");
    insert(storage, &mut label).await;
    let mut tag = OutputTag::new(user_id, "cold");
    insert(storage, &mut tag).await;

    let mut certificate = Certificate::new(user_id, "identity", "serial-1", "certifier-key", "subject-key");
    certificate.signature = "3044".to_string();
    insert(storage, &mut certificate).await;
    let mut field = CertificateField::new(user_id, certificate.certificate_id, "email", "enc:alice");
    insert(storage, &mut field).await;

    let mut tx = Transaction::new(user_id, "salary", 50_000);
    tx.status = TransactionStatus::Completed;
    tx.is_outgoing = false;
    tx.txid = Some(SEED_TXID.to_string());
    tx.raw_tx = Some(vec![1, 0, 0, 0, 1]);
    insert(storage, &mut tx).await;

    let mut output = Output::new(user_id, tx.transaction_id, 0, 50_000);
    output.basket_id = Some(basket.basket_id);
    output.txid = Some(SEED_TXID.to_string());
    output.locking_script = Some(vec![0x76, 0xa9, 0x14]);
    insert(storage, &mut output).await;

    let mut commission = Commission::new(user_id, tx.transaction_id, 10);
    insert(storage, &mut commission).await;
    let mut tag_map = OutputTagMap::new(output.output_id, tag.output_tag_id);
    insert(storage, &mut tag_map).await;
    let mut label_map = TxLabelMap::new(tx.transaction_id, label.tx_label_id);
    insert(storage, &mut label_map).await;

    let mut proven = ProvenTx::new(SEED_TXID, 800_000, 7);
    proven.block_hash = "00000000000000000001".to_string();
    insert(storage, &mut proven).await;
    tx.proven_tx_id = Some(proven.proven_tx_id);
    storage
        .update_entity(&tx)
        .await
        .expect("Failed to link transaction");

    let mut req = ProvenTxReq::new(SEED_TXID, vec![1, 0, 0, 0, 1]);
    req.proven_tx_id = Some(proven.proven_tx_id);
    insert(storage, &mut req).await;

    SeededWallet {
        user_id,
        basket_id: basket.basket_id,
        tx_label_id: label.tx_label_id,
        output_tag_id: tag.output_tag_id,
        certificate_id: certificate.certificate_id,
        transaction_id: tx.transaction_id,
        output_id: output.output_id,
        proven_tx_id: proven.proven_tx_id,
    }
}

async fn insert<T: walletdb_core::Entity>(storage: &dyn WalletStorage, entity: &mut T) {
    storage
        .insert_entity(entity)
        .await
        .unwrap_or_else(|e| panic!("Failed to insert {}: {e}", T::KIND));
}

/// A temporary directory for snapshot files.
pub struct TempSnapshotDir {
    dir: TempDir,
}

impl TempSnapshotDir {
    /// Creates a fresh directory.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Path of a snapshot file named `name` inside the directory.
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// The directory itself.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

impl Default for TempSnapshotDir {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use walletdb_core::EntityKind;

    #[tokio::test]
    async fn seeded_wallet_touches_every_kind() {
        let storage = TestStorage::memory("primary").await;
        seed_wallet(storage.storage.as_ref(), "alice").await;
        let counts = storage.counts();
        for kind in EntityKind::SYNC_ORDER {
            assert_eq!(counts[&kind], 1, "{kind}");
        }
    }

    #[tokio::test]
    async fn identity_key_is_the_name() {
        let storage = TestStorage::memory("backup").await;
        assert_eq!(storage.settings().unwrap().storage_identity_key, "backup");
    }
}
