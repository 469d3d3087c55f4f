//! Property tests for last-writer-wins merging.

use proptest::prelude::*;
use walletdb_core::{Entity, EntityKind, OutputBasket, StorageExt};
use walletdb_sync_engine::{merge_incoming, MergeContext, MergeOutcome, MergeRegistry, SyncMap};
use walletdb_testkit::prelude::*;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime")
}

/// Merges `incoming` over a local copy of `local` and returns the outcome
/// and the resulting local row.
fn merge_over(local: OutputBasket, incoming: OutputBasket) -> (MergeOutcome, OutputBasket, SyncMap) {
    runtime().block_on(async move {
        let storage = TestStorage::memory("local").await;
        let (user, _) = storage.find_or_insert_user("alice").await.unwrap();
        let mut local = local;
        local.user_id = user.user_id;
        storage.insert_entity(&mut local).await.unwrap();

        let registry = MergeRegistry::standard();
        let strategy = registry.get(EntityKind::OutputBasket).unwrap();
        let ctx = MergeContext {
            storage: storage.storage.as_ref(),
            user_id: user.user_id,
        };
        let mut maps = SyncMap::new();
        let outcome = merge_incoming(strategy, ctx, &mut maps, incoming.into_row())
            .await
            .unwrap();
        let merged: OutputBasket = storage
            .find_entity_by_id(local.basket_id)
            .await
            .unwrap()
            .unwrap();
        (outcome, merged, maps)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn newer_row_wins_older_row_loses(
        local in output_basket_strategy(0),
        mut incoming in output_basket_strategy(99),
    ) {
        incoming.name.clone_from(&local.name);
        incoming.basket_id = 500;
        let (outcome, merged, maps) = merge_over(local.clone(), incoming.clone());

        prop_assert_eq!(maps.local_id(EntityKind::OutputBasket, 500), Some(merged.basket_id));
        prop_assert_eq!(&merged.name, &local.name);
        if incoming.updated_at > local.updated_at {
            prop_assert_eq!(outcome, MergeOutcome::Updated);
            prop_assert_eq!(merged.updated_at, incoming.updated_at);
            prop_assert_eq!(merged.number_of_desired_utxos, incoming.number_of_desired_utxos);
            prop_assert_eq!(merged.minimum_desired_utxo_value, incoming.minimum_desired_utxo_value);
            prop_assert_eq!(merged.is_deleted, incoming.is_deleted);
        } else {
            prop_assert_eq!(outcome, MergeOutcome::Unchanged);
            prop_assert_eq!(merged.updated_at, local.updated_at);
            prop_assert_eq!(merged.number_of_desired_utxos, local.number_of_desired_utxos);
            prop_assert_eq!(merged.minimum_desired_utxo_value, local.minimum_desired_utxo_value);
            prop_assert_eq!(merged.is_deleted, local.is_deleted);
        }
    }

    #[test]
    fn unmatched_row_is_inserted_for_the_local_user(
        local in output_basket_strategy(0),
        mut incoming in output_basket_strategy(99),
    ) {
        prop_assume!(incoming.name != local.name);
        incoming.basket_id = 500;
        let (outcome, merged, maps) = merge_over(local.clone(), incoming);

        prop_assert_eq!(outcome, MergeOutcome::Inserted);
        let inserted = maps.local_id(EntityKind::OutputBasket, 500);
        prop_assert!(inserted.is_some());
        prop_assert_ne!(inserted, Some(merged.basket_id));
    }
}
