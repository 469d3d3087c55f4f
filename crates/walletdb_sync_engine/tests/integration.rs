//! Integration tests for the chunk loop between two storage instances.

use async_trait::async_trait;
use chrono::Duration;
use walletdb_core::{
    Chain, EntityKind, ErrorKind, Output, OutputBasket, ProvenTx, RowQuery, Settings,
    StorageExt, SyncStatus, Transaction, WalletError, WalletStorage,
};
use walletdb_sync_engine::{
    process_sync_chunk, run_sync, LocalSyncPeer, LoopbackReader, MergeRegistry, SyncConfig,
    SyncCursor, SyncError, SyncPeer, SyncReader, SyncResult, SyncTotals, SyncWriter,
};
use walletdb_sync_protocol::{RequestSyncChunkArgs, SyncChunk};
use walletdb_testkit::prelude::*;

const ALICE: &str = "alice";

async fn sync(reader: &TestStorage, writer: &TestStorage, config: SyncConfig) -> SyncResult<SyncTotals> {
    let reader = LocalSyncPeer::new(reader.dyn_storage());
    let writer = LocalSyncPeer::new(writer.dyn_storage());
    run_sync(&reader, &writer, ALICE, &config).await
}

async fn cursor_of(storage: &TestStorage, remote: &TestStorage) -> SyncCursor {
    let user = storage.find_user(ALICE).await.unwrap().unwrap();
    SyncCursor::load_or_create(storage.storage.as_ref(), user.user_id, &remote.settings().unwrap())
        .await
        .unwrap()
}

/// Asserts every row `local` learned from `remote` matches its source.
async fn assert_converged(local: &TestStorage, remote: &TestStorage) {
    let cursor = cursor_of(local, remote).await;
    let registry = MergeRegistry::standard();
    for strategy in registry.iter() {
        let kind = strategy.kind();
        let entry = cursor.map().entry(kind).unwrap();
        for (&remote_id, &local_id) in &entry.id_map {
            let a = local.find_by_id(kind, local_id).await.unwrap().unwrap();
            let b = remote.find_by_id(kind, remote_id).await.unwrap().unwrap();
            assert!(
                strategy
                    .equals_business_fields(&a, &b, Some(cursor.map()))
                    .unwrap(),
                "{kind} {remote_id} -> {local_id} diverged"
            );
        }
    }
}

#[tokio::test]
async fn full_sync_into_empty_backup() {
    let active = TestStorage::memory("active").await;
    let backup = TestStorage::memory("backup").await;
    let seeded = seed_wallet(active.storage.as_ref(), ALICE).await;

    let totals = sync(&active, &backup, SyncConfig::default()).await.unwrap();
    assert_eq!(totals.inserts, 12);
    assert_eq!(totals.updates, 0);

    for kind in EntityKind::SYNC_ORDER {
        assert_eq!(backup.counts()[&kind], 1, "{kind}");
    }

    let cursor = cursor_of(&backup, &active).await;
    assert_eq!(cursor.state().status, SyncStatus::Success);
    assert!(cursor.state().init);
    assert!(cursor.when().is_some());

    // the proof arrived after the transaction and was linked by txid
    let local_tx_id = cursor
        .map()
        .local_id(EntityKind::Transaction, seeded.transaction_id)
        .unwrap();
    let local_proven_id = cursor
        .map()
        .local_id(EntityKind::ProvenTx, seeded.proven_tx_id)
        .unwrap();
    let tx: Transaction = backup.find_entity_by_id(local_tx_id).await.unwrap().unwrap();
    assert_eq!(tx.proven_tx_id, Some(local_proven_id));

    assert_converged(&backup, &active).await;
}

#[tokio::test]
async fn second_pass_inserts_nothing() {
    let active = TestStorage::memory("active").await;
    let backup = TestStorage::memory("backup").await;
    seed_wallet(active.storage.as_ref(), ALICE).await;

    sync(&active, &backup, SyncConfig::default()).await.unwrap();
    let before = backup.counts();
    let again = sync(&active, &backup, SyncConfig::default()).await.unwrap();
    assert_eq!(again.inserts, 0);
    assert_eq!(again.updates, 0);
    assert_eq!(backup.counts(), before);
}

#[tokio::test]
async fn small_chunks_reach_the_same_state() {
    let active = TestStorage::memory("active").await;
    let backup = TestStorage::memory("backup").await;
    seed_wallet(active.storage.as_ref(), ALICE).await;
    let user = active.find_user(ALICE).await.unwrap().unwrap();
    for i in 0..10 {
        let mut basket = OutputBasket::new(user.user_id, format!("basket-{i}"));
        active.insert_entity(&mut basket).await.unwrap();
    }

    let totals = sync(&active, &backup, SyncConfig::new().with_max_items(3))
        .await
        .unwrap();
    assert_eq!(totals.inserts, 22);
    assert!(totals.chunks >= 8);
    assert_eq!(backup.counts()[&EntityKind::OutputBasket], 11);
    assert_converged(&backup, &active).await;
}

#[tokio::test]
async fn round_trip_converges() {
    let active = TestStorage::memory("active").await;
    let backup = TestStorage::memory("backup").await;
    seed_wallet(active.storage.as_ref(), ALICE).await;

    sync(&active, &backup, SyncConfig::default()).await.unwrap();
    let back = sync(&backup, &active, SyncConfig::default()).await.unwrap();
    assert_eq!(back.inserts, 0);

    assert_converged(&backup, &active).await;
    assert_converged(&active, &backup).await;
}

#[tokio::test]
async fn newer_changes_and_soft_deletes_replicate() {
    let active = TestStorage::memory("active").await;
    let backup = TestStorage::memory("backup").await;
    let seeded = seed_wallet(active.storage.as_ref(), ALICE).await;
    sync(&active, &backup, SyncConfig::default()).await.unwrap();

    let mut basket: OutputBasket = active
        .find_entity_by_id(seeded.basket_id)
        .await
        .unwrap()
        .unwrap();
    basket.is_deleted = true;
    basket.number_of_desired_utxos = 9;
    basket.updated_at = basket.updated_at + Duration::seconds(5);
    active.update_entity(&basket).await.unwrap();

    let totals = sync(&active, &backup, SyncConfig::default()).await.unwrap();
    assert_eq!(totals.inserts, 0);
    assert!(totals.updates >= 1);

    let query = RowQuery::new(EntityKind::OutputBasket).include_deleted(true);
    let copies: Vec<OutputBasket> = backup.find_entities(&query).await.unwrap();
    assert_eq!(copies.len(), 1);
    assert!(copies[0].is_deleted);
    assert_eq!(copies[0].number_of_desired_utxos, 9);
    assert_eq!(copies[0].updated_at, basket.updated_at);
}

#[tokio::test]
async fn older_incoming_rows_do_not_overwrite() {
    let active = TestStorage::memory("active").await;
    let backup = TestStorage::memory("backup").await;
    seed_wallet(active.storage.as_ref(), ALICE).await;
    sync(&active, &backup, SyncConfig::default()).await.unwrap();

    let query = RowQuery::new(EntityKind::OutputBasket);
    let mut local: OutputBasket = backup.find_entities(&query).await.unwrap().remove(0);
    local.minimum_desired_utxo_value = 777;
    local.updated_at = local.updated_at + Duration::seconds(60);
    backup.update_entity(&local).await.unwrap();

    // touch the source row, but less recently than the backup's edit
    let mut remote: OutputBasket = active.find_entities(&query).await.unwrap().remove(0);
    remote.minimum_desired_utxo_value = 1;
    remote.updated_at = remote.updated_at + Duration::seconds(30);
    active.update_entity(&remote).await.unwrap();

    let totals = sync(&active, &backup, SyncConfig::default()).await.unwrap();
    assert_eq!(totals.updates, 0);
    let kept: OutputBasket = backup
        .find_entity_by_id(local.basket_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(kept.minimum_desired_utxo_value, 777);
}

#[tokio::test]
async fn sync_through_binary_frames() {
    let active = TestStorage::memory("active").await;
    let backup = TestStorage::memory("backup").await;
    seed_wallet(active.storage.as_ref(), ALICE).await;

    let reader = LoopbackReader::new(LocalSyncPeer::new(active.dyn_storage()));
    let writer = LocalSyncPeer::new(backup.dyn_storage());
    let totals = run_sync(&reader, &writer, ALICE, &SyncConfig::default())
        .await
        .unwrap();
    assert_eq!(totals.inserts, 12);
    assert_converged(&backup, &active).await;
}

#[tokio::test]
async fn self_sync_is_rejected() {
    let active = TestStorage::memory("active").await;
    let err = sync(&active, &active, SyncConfig::default()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidParameter);
}

#[tokio::test]
async fn chain_mismatch_is_rejected() {
    let main = TestStorage::on_chain("main", Chain::Main).await;
    let test = TestStorage::memory("test").await;
    seed_wallet(main.storage.as_ref(), ALICE).await;
    let err = sync(&main, &test, SyncConfig::default()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    assert!(test.find_user(ALICE).await.unwrap().is_none());
}

fn reader_settings() -> Settings {
    Settings::new("R", "reader", Chain::Test, "memory", 10_000)
}

#[tokio::test]
async fn foreign_keys_are_remapped_to_local_ids() {
    let writer = TestStorage::memory("W").await;
    let peer = LocalSyncPeer::new(writer.dyn_storage());
    peer.find_or_insert_user(ALICE).await.unwrap();
    let args = peer
        .request_sync_chunk_args(ALICE, &reader_settings(), &SyncConfig::default())
        .await
        .unwrap();

    let mut chunk = SyncChunk::new("R", "W", ALICE);
    let mut tx = Transaction::new(42, "remote", 1000);
    tx.transaction_id = 5;
    let mut output = Output::new(42, 5, 0, 1000);
    output.output_id = 9;
    chunk.transactions.push(tx);
    chunk.outputs.push(output);

    let result = peer.process_sync_chunk(&args, &chunk).await.unwrap();
    assert_eq!(result.inserts, 2);
    assert_eq!(result.updates, 0);
    assert!(!result.done);

    let user = writer.find_user(ALICE).await.unwrap().unwrap();
    let cursor = SyncCursor::load(writer.storage.as_ref(), user.user_id, "R").await.unwrap();
    let local_tx = cursor.map().local_id(EntityKind::Transaction, 5).unwrap();
    let local_output = cursor.map().local_id(EntityKind::Output, 9).unwrap();
    let output: Output = writer.find_entity_by_id(local_output).await.unwrap().unwrap();
    assert_eq!(output.transaction_id, local_tx);
    assert_eq!(output.user_id, user.user_id);

    // applying the same chunk again is a no-op
    let again = peer.process_sync_chunk(&args, &chunk).await.unwrap();
    assert_eq!(again.inserts, 0);
}

#[tokio::test]
async fn unknown_user_is_never_inserted() {
    let writer = TestStorage::memory("W").await;
    let args = walletdb_sync_protocol::RequestSyncChunkArgs {
        from_storage_identity_key: "R".into(),
        to_storage_identity_key: "W".into(),
        identity_key: ALICE.into(),
        max_rough_size: 1000,
        max_items: 10,
        offsets: Vec::new(),
    };
    let mut chunk = SyncChunk::new("R", "W", ALICE);
    chunk.user = Some(walletdb_core::User::new(ALICE));

    let err = process_sync_chunk(
        writer.storage.as_ref(),
        &MergeRegistry::standard(),
        &args,
        &chunk,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, SyncError::UserInsertDuringSync { .. }));
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert!(writer.find_user(ALICE).await.unwrap().is_none());
}

#[tokio::test]
async fn failed_chunk_keeps_mappings_but_not_progress() {
    let writer = TestStorage::memory("W").await;
    let peer = LocalSyncPeer::new(writer.dyn_storage());
    peer.find_or_insert_user(ALICE).await.unwrap();
    let args = peer
        .request_sync_chunk_args(ALICE, &reader_settings(), &SyncConfig::default())
        .await
        .unwrap();

    let mut chunk = SyncChunk::new("R", "W", ALICE);
    let mut basket = OutputBasket::new(42, "default");
    basket.basket_id = 3;
    chunk.output_baskets.push(basket);
    let mut orphan = Output::new(42, 77, 0, 10);
    orphan.output_id = 1;
    chunk.outputs.push(orphan);

    let err = peer.process_sync_chunk(&args, &chunk).await.unwrap_err();
    assert!(matches!(
        err,
        SyncError::MissingIdMapping { kind: EntityKind::Transaction, remote_id: 77 }
    ));

    let user = writer.find_user(ALICE).await.unwrap().unwrap();
    let cursor = SyncCursor::load(writer.storage.as_ref(), user.user_id, "R").await.unwrap();
    assert_eq!(cursor.state().status, SyncStatus::Error);
    assert!(cursor.state().error_local.is_some());
    assert!(cursor.map().local_id(EntityKind::OutputBasket, 3).is_some());
    assert!(cursor.map().counts().all(|(_, count)| count == 0));

    let retry = peer
        .request_sync_chunk_args(ALICE, &reader_settings(), &SyncConfig::default())
        .await
        .unwrap();
    assert_eq!(retry.offsets, args.offsets);
}

#[tokio::test]
async fn rows_imported_from_a_third_instance_reach_backups() {
    let a = TestStorage::memory("A").await;
    let b = TestStorage::memory("B").await;
    let c = TestStorage::memory("C").await;
    seed_wallet(c.storage.as_ref(), ALICE).await;

    let (user, _) = a.find_or_insert_user(ALICE).await.unwrap();
    let mut basket = OutputBasket::new(user.user_id, "a-only");
    basket.updated_at = basket.updated_at + Duration::hours(1);
    a.insert_entity(&mut basket).await.unwrap();

    sync(&a, &b, SyncConfig::default()).await.unwrap();
    // C's rows are all older than anything B has seen from A
    let imported = sync(&c, &a, SyncConfig::default()).await.unwrap();
    assert_eq!(imported.inserts, 12);

    let forwarded = sync(&a, &b, SyncConfig::default()).await.unwrap();
    assert_eq!(forwarded.inserts, 12);
    let (a_counts, b_counts) = (a.counts(), b.counts());
    for kind in EntityKind::SYNC_ORDER {
        assert_eq!(b_counts[&kind], a_counts[&kind], "{kind}");
    }
    assert_converged(&b, &a).await;
}

/// Reader whose instance is reachable for settings but fails every chunk.
struct UnavailableReader {
    inner: LocalSyncPeer,
}

#[async_trait]
impl SyncPeer for UnavailableReader {
    async fn settings(&self) -> SyncResult<Settings> {
        self.inner.settings().await
    }
}

#[async_trait]
impl SyncReader for UnavailableReader {
    async fn get_sync_chunk(&self, _args: &RequestSyncChunkArgs) -> SyncResult<SyncChunk> {
        Err(WalletError::storage("disk unavailable").into())
    }
}

#[tokio::test]
async fn reader_failure_is_recorded_on_the_writer_cursor() {
    let active = TestStorage::memory("active").await;
    let backup = TestStorage::memory("backup").await;
    seed_wallet(active.storage.as_ref(), ALICE).await;

    let reader = UnavailableReader {
        inner: LocalSyncPeer::new(active.dyn_storage()),
    };
    let writer = LocalSyncPeer::new(backup.dyn_storage());
    let err = run_sync(&reader, &writer, ALICE, &SyncConfig::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("disk unavailable"));

    let cursor = cursor_of(&backup, &active).await;
    assert_eq!(cursor.state().status, SyncStatus::Error);
    assert!(cursor
        .state()
        .error_other
        .as_deref()
        .is_some_and(|message| message.contains("disk unavailable")));
    assert!(cursor.state().error_local.is_none());

    // a later successful pass clears the failure
    sync(&active, &backup, SyncConfig::default()).await.unwrap();
    let cursor = cursor_of(&backup, &active).await;
    assert_eq!(cursor.state().status, SyncStatus::Success);
    assert!(cursor.state().error_other.is_none());
}

#[tokio::test]
async fn newer_output_remaps_references_and_keeps_identity() {
    let active = TestStorage::memory("active").await;
    let backup = TestStorage::memory("backup").await;
    let seeded = seed_wallet(active.storage.as_ref(), ALICE).await;
    sync(&active, &backup, SyncConfig::default()).await.unwrap();

    let cursor = cursor_of(&backup, &active).await;
    let local_output_id = cursor
        .map()
        .local_id(EntityKind::Output, seeded.output_id)
        .unwrap();
    let before: Output = backup
        .find_entity_by_id(local_output_id)
        .await
        .unwrap()
        .unwrap();

    let mut spending = OutputBasket::new(seeded.user_id, "spending");
    active.insert_entity(&mut spending).await.unwrap();
    let mut spend = Transaction::new(seeded.user_id, "spend", -50_000);
    active.insert_entity(&mut spend).await.unwrap();
    let mut output: Output = active
        .find_entity_by_id(seeded.output_id)
        .await
        .unwrap()
        .unwrap();
    output.basket_id = Some(spending.basket_id);
    output.spent_by = Some(spend.transaction_id);
    output.spendable = false;
    output.updated_at = output.updated_at + Duration::seconds(10);
    active.update_entity(&output).await.unwrap();

    let totals = sync(&active, &backup, SyncConfig::default()).await.unwrap();
    assert_eq!(totals.inserts, 2);
    assert_eq!(totals.updates, 1);

    let cursor = cursor_of(&backup, &active).await;
    let local_basket = cursor
        .map()
        .local_id(EntityKind::OutputBasket, spending.basket_id)
        .unwrap();
    let local_spend = cursor
        .map()
        .local_id(EntityKind::Transaction, spend.transaction_id)
        .unwrap();
    let merged: Output = backup
        .find_entity_by_id(local_output_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(merged.basket_id, Some(local_basket));
    assert_ne!(merged.basket_id, before.basket_id);
    assert_eq!(merged.spent_by, Some(local_spend));
    assert!(!merged.spendable);
    assert_eq!(merged.updated_at, output.updated_at);
    assert_eq!(merged.transaction_id, before.transaction_id);
    assert_eq!(merged.vout, before.vout);
    assert_eq!(merged.user_id, before.user_id);
    assert_eq!(merged.created_at, before.created_at);

    // an older copy changes nothing
    let mut stale = output.clone();
    stale.basket_id = Some(seeded.basket_id);
    stale.spent_by = None;
    stale.spendable = true;
    stale.updated_at = before.updated_at;
    active.update_entity(&stale).await.unwrap();

    let totals = sync(&active, &backup, SyncConfig::default()).await.unwrap();
    assert_eq!(totals.updates, 0);
    let kept: Output = backup
        .find_entity_by_id(local_output_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(kept, merged);
}

#[tokio::test]
async fn proof_update_leaves_transactions_alone() {
    let active = TestStorage::memory("active").await;
    let backup = TestStorage::memory("backup").await;
    let seeded = seed_wallet(active.storage.as_ref(), ALICE).await;
    sync(&active, &backup, SyncConfig::default()).await.unwrap();

    let user = backup.find_user(ALICE).await.unwrap().unwrap();
    let mut pending = Transaction::new(user.user_id, "pending", 1);
    pending.txid = Some(SEED_TXID.to_string());
    backup.insert_entity(&mut pending).await.unwrap();

    let mut proven: ProvenTx = active
        .find_entity_by_id(seeded.proven_tx_id)
        .await
        .unwrap()
        .unwrap();
    proven.block_hash = "00000000000000000002".to_string();
    proven.updated_at = proven.updated_at + Duration::seconds(5);
    active.update_entity(&proven).await.unwrap();

    let totals = sync(&active, &backup, SyncConfig::default()).await.unwrap();
    assert_eq!(totals.updates, 1);

    let cursor = cursor_of(&backup, &active).await;
    let local_proven_id = cursor
        .map()
        .local_id(EntityKind::ProvenTx, seeded.proven_tx_id)
        .unwrap();
    let local_proven: ProvenTx = backup
        .find_entity_by_id(local_proven_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(local_proven.block_hash, proven.block_hash);

    let untouched: Transaction = backup
        .find_entity_by_id(pending.transaction_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(untouched, pending);
}
