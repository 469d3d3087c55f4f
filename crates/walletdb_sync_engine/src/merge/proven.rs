//! Transaction and proven transaction merges.
//!
//! Proven transactions merge after transactions, so a transaction may arrive
//! before the proof it points at. The link is then resolved by txid from
//! whichever side arrives second: a transaction merged after its proof links
//! itself, and a newly inserted proof links the transactions that came
//! before it. Updating a proof that already exists links nothing.

use super::{EntityMerge, MergeContext, RuleMerge};
use crate::error::SyncResult;
use crate::sync_map::SyncMap;
use async_trait::async_trait;
use tracing::debug;
use walletdb_core::{
    Entity, EntityKind, EntityRow, NaturalKey, ProvenTx, RowQuery, StorageExt, Transaction,
};

/// Transaction merge that resolves `proven_tx_id` from a local proof with
/// the same txid when the cursor has no mapping yet.
#[derive(Default)]
pub struct TransactionMerge {
    rules: RuleMerge<Transaction>,
}

impl TransactionMerge {
    /// Creates the strategy.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EntityMerge for TransactionMerge {
    fn kind(&self) -> EntityKind {
        EntityKind::Transaction
    }

    async fn remap_foreign_keys(
        &self,
        ctx: MergeContext<'_>,
        incoming: EntityRow,
        maps: &SyncMap,
    ) -> SyncResult<EntityRow> {
        let row = self.rules.remap_foreign_keys(ctx, incoming, maps).await?;
        let mut tx = Transaction::from_row(row)?;
        if tx.proven_tx_id.is_none() {
            if let Some(txid) = tx.txid.clone() {
                let key = NaturalKey::ProvenTx { txid };
                if let Some(proven) = ctx.storage.find_entity::<ProvenTx>(&key).await? {
                    tx.proven_tx_id = Some(proven.proven_tx_id);
                }
            }
        }
        Ok(tx.into_row())
    }

    async fn find_candidate(
        &self,
        ctx: MergeContext<'_>,
        incoming: &EntityRow,
    ) -> SyncResult<Option<EntityRow>> {
        self.rules.find_candidate(ctx, incoming).await
    }

    fn equals_business_fields(
        &self,
        a: &EntityRow,
        b: &EntityRow,
        maps: Option<&SyncMap>,
    ) -> SyncResult<bool> {
        self.rules.equals_business_fields(a, b, maps)
    }

    async fn merge_insert(&self, ctx: MergeContext<'_>, incoming: EntityRow) -> SyncResult<EntityRow> {
        self.rules.merge_insert(ctx, incoming).await
    }

    async fn merge_update(
        &self,
        ctx: MergeContext<'_>,
        local: EntityRow,
        incoming: &EntityRow,
    ) -> SyncResult<bool> {
        self.rules.merge_update(ctx, local, incoming).await
    }
}

/// Proven transaction merge that links the user's unlinked transactions
/// with the same txid when the proof is first inserted.
#[derive(Default)]
pub struct ProvenTxMerge {
    rules: RuleMerge<ProvenTx>,
}

impl ProvenTxMerge {
    /// Creates the strategy.
    pub fn new() -> Self {
        Self::default()
    }

    async fn link_transactions(&self, ctx: MergeContext<'_>, proven: &ProvenTx) -> SyncResult<()> {
        let query = RowQuery::new(EntityKind::Transaction)
            .for_user(ctx.user_id)
            .include_deleted(true);
        let unlinked = ctx
            .storage
            .find_entities::<Transaction>(&query)
            .await?
            .into_iter()
            .filter(|t| t.proven_tx_id.is_none() && t.txid.as_deref() == Some(&proven.txid));
        for mut tx in unlinked {
            tx.proven_tx_id = Some(proven.proven_tx_id);
            ctx.storage.update_entity(&tx).await?;
            debug!(
                transaction_id = tx.transaction_id,
                proven_tx_id = proven.proven_tx_id,
                "linked transaction to proof"
            );
        }
        Ok(())
    }
}

#[async_trait]
impl EntityMerge for ProvenTxMerge {
    fn kind(&self) -> EntityKind {
        EntityKind::ProvenTx
    }

    async fn remap_foreign_keys(
        &self,
        ctx: MergeContext<'_>,
        incoming: EntityRow,
        maps: &SyncMap,
    ) -> SyncResult<EntityRow> {
        self.rules.remap_foreign_keys(ctx, incoming, maps).await
    }

    async fn find_candidate(
        &self,
        ctx: MergeContext<'_>,
        incoming: &EntityRow,
    ) -> SyncResult<Option<EntityRow>> {
        self.rules.find_candidate(ctx, incoming).await
    }

    fn equals_business_fields(
        &self,
        a: &EntityRow,
        b: &EntityRow,
        maps: Option<&SyncMap>,
    ) -> SyncResult<bool> {
        self.rules.equals_business_fields(a, b, maps)
    }

    async fn merge_insert(&self, ctx: MergeContext<'_>, incoming: EntityRow) -> SyncResult<EntityRow> {
        let row = self.rules.merge_insert(ctx, incoming).await?;
        self.link_transactions(ctx, &ProvenTx::from_row(row.clone())?)
            .await?;
        Ok(row)
    }

    async fn merge_update(
        &self,
        ctx: MergeContext<'_>,
        local: EntityRow,
        incoming: &EntityRow,
    ) -> SyncResult<bool> {
        self.rules.merge_update(ctx, local, incoming).await
    }
}
