//! Per-entity merge of incoming rows into a local instance.
//!
//! Each incoming row goes through the same steps:
//!
//! 1. foreign keys are rewritten from remote ids to local ids
//! 2. a local candidate is looked up by natural key
//! 3. a found candidate takes the incoming mutable fields when the incoming
//!    row is strictly newer; otherwise the row is inserted
//! 4. the remote id is recorded against the local id
//!
//! [`EntityMerge`] is the object-safe seam the processor drives. Most kinds
//! use [`RuleMerge`], which delegates to the typed [`MergeRules`] on the
//! entity; transactions and proven transactions add their txid link on top.

mod proven;
mod rules;

use crate::error::{SyncError, SyncResult};
use crate::sync_map::SyncMap;
use async_trait::async_trait;
use std::marker::PhantomData;
use walletdb_core::{Entity, EntityKind, EntityRow, WalletStorage};

pub use proven::{ProvenTxMerge, TransactionMerge};
pub use rules::MergeRules;

/// What merging one row did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// A new local row was inserted.
    Inserted,
    /// An existing row took newer field values.
    Updated,
    /// An existing row was already current.
    Unchanged,
}

/// The local side of a merge.
#[derive(Clone, Copy)]
pub struct MergeContext<'a> {
    /// Instance rows are merged into.
    pub storage: &'a dyn WalletStorage,
    /// Local id of the user whose rows are merged.
    pub user_id: i64,
}

/// Merge strategy for one entity kind.
#[async_trait]
pub trait EntityMerge: Send + Sync {
    /// Kind this strategy merges.
    fn kind(&self) -> EntityKind;

    /// Rewrites the row's foreign keys from remote to local ids.
    async fn remap_foreign_keys(
        &self,
        ctx: MergeContext<'_>,
        incoming: EntityRow,
        maps: &SyncMap,
    ) -> SyncResult<EntityRow>;

    /// Looks up the local row with the same natural key.
    async fn find_candidate(
        &self,
        ctx: MergeContext<'_>,
        incoming: &EntityRow,
    ) -> SyncResult<Option<EntityRow>>;

    /// Compares business fields, ignoring ids and timestamps.
    ///
    /// `b`'s foreign keys are remapped through `maps` when supplied.
    fn equals_business_fields(
        &self,
        a: &EntityRow,
        b: &EntityRow,
        maps: Option<&SyncMap>,
    ) -> SyncResult<bool>;

    /// Inserts a row that has no local counterpart. Returns it with its new
    /// local id.
    async fn merge_insert(&self, ctx: MergeContext<'_>, incoming: EntityRow) -> SyncResult<EntityRow>;

    /// Applies a newer incoming row to its local counterpart. Returns true
    /// when the local row changed.
    async fn merge_update(
        &self,
        ctx: MergeContext<'_>,
        local: EntityRow,
        incoming: &EntityRow,
    ) -> SyncResult<bool>;
}

/// Merges one incoming row and records its id mapping.
pub async fn merge_incoming(
    strategy: &dyn EntityMerge,
    ctx: MergeContext<'_>,
    maps: &mut SyncMap,
    incoming: EntityRow,
) -> SyncResult<MergeOutcome> {
    let kind = strategy.kind();
    let remote_id = incoming.id();
    let row = strategy.remap_foreign_keys(ctx, incoming, maps).await?;

    let (local_id, outcome) = match strategy.find_candidate(ctx, &row).await? {
        Some(local) => {
            let local_id = local.id();
            let changed = strategy.merge_update(ctx, local, &row).await?;
            let outcome = if changed {
                MergeOutcome::Updated
            } else {
                MergeOutcome::Unchanged
            };
            (local_id, outcome)
        }
        None => {
            let inserted = strategy.merge_insert(ctx, row).await?;
            (inserted.id(), MergeOutcome::Inserted)
        }
    };

    maps.merge_id_map(kind, remote_id, local_id)?;
    Ok(outcome)
}

/// Strategy that delegates to an entity's [`MergeRules`].
pub struct RuleMerge<T>(PhantomData<fn() -> T>);

impl<T> RuleMerge<T> {
    /// Creates the strategy.
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for RuleMerge<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn typed<T: Entity>(row: &EntityRow) -> SyncResult<T> {
    Ok(T::from_row(row.clone())?)
}

#[async_trait]
impl<T: MergeRules> EntityMerge for RuleMerge<T> {
    fn kind(&self) -> EntityKind {
        T::KIND
    }

    async fn remap_foreign_keys(
        &self,
        ctx: MergeContext<'_>,
        incoming: EntityRow,
        maps: &SyncMap,
    ) -> SyncResult<EntityRow> {
        let mut entity = T::from_row(incoming)?;
        entity.remap_foreign_keys(maps, ctx.user_id)?;
        Ok(entity.into_row())
    }

    async fn find_candidate(
        &self,
        ctx: MergeContext<'_>,
        incoming: &EntityRow,
    ) -> SyncResult<Option<EntityRow>> {
        Ok(ctx.storage.find_by_natural_key(&incoming.natural_key()).await?)
    }

    fn equals_business_fields(
        &self,
        a: &EntityRow,
        b: &EntityRow,
        maps: Option<&SyncMap>,
    ) -> SyncResult<bool> {
        typed::<T>(a)?.business_eq(&typed::<T>(b)?, maps)
    }

    async fn merge_insert(&self, ctx: MergeContext<'_>, incoming: EntityRow) -> SyncResult<EntityRow> {
        let mut entity = T::from_row(incoming)?;
        entity.prepare_insert(ctx.user_id)?;
        let mut row = entity.into_row();
        let id = ctx.storage.insert_row(row.clone()).await?;
        row.set_id(id);
        Ok(row)
    }

    async fn merge_update(
        &self,
        ctx: MergeContext<'_>,
        local: EntityRow,
        incoming: &EntityRow,
    ) -> SyncResult<bool> {
        let mut entity = T::from_row(local)?;
        let incoming = typed::<T>(incoming)?;
        if incoming.updated_at() <= entity.updated_at() {
            return Ok(false);
        }
        entity.copy_mutable_fields(&incoming);
        entity.set_updated_at(incoming.updated_at());
        ctx.storage.update_row(&entity.into_row()).await?;
        Ok(true)
    }
}

/// Strategies for every kind, iterated in dependency order.
pub struct MergeRegistry {
    strategies: Vec<Box<dyn EntityMerge>>,
}

impl MergeRegistry {
    /// The standard strategy set.
    pub fn standard() -> Self {
        use walletdb_core::{
            Certificate, CertificateField, Commission, Output, OutputBasket, OutputTag,
            OutputTagMap, ProvenTxReq, TxLabel, TxLabelMap, User,
        };

        let strategies: Vec<Box<dyn EntityMerge>> = vec![
            Box::new(RuleMerge::<User>::new()),
            Box::new(RuleMerge::<OutputBasket>::new()),
            Box::new(RuleMerge::<TxLabel>::new()),
            Box::new(RuleMerge::<OutputTag>::new()),
            Box::new(RuleMerge::<Certificate>::new()),
            Box::new(RuleMerge::<CertificateField>::new()),
            Box::new(TransactionMerge::new()),
            Box::new(RuleMerge::<Output>::new()),
            Box::new(RuleMerge::<Commission>::new()),
            Box::new(RuleMerge::<OutputTagMap>::new()),
            Box::new(RuleMerge::<TxLabelMap>::new()),
            Box::new(ProvenTxMerge::new()),
            Box::new(RuleMerge::<ProvenTxReq>::new()),
        ];
        Self { strategies }
    }

    /// Strategy for `kind`.
    pub fn get(&self, kind: EntityKind) -> SyncResult<&dyn EntityMerge> {
        self.strategies
            .iter()
            .find(|s| s.kind() == kind)
            .map(|s| s.as_ref())
            .ok_or_else(|| {
                SyncError::Wallet(walletdb_core::WalletError::not_implemented(format!(
                    "merge for {kind}"
                )))
            })
    }

    /// Strategies in dependency order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn EntityMerge> {
        self.strategies.iter().map(|s| s.as_ref())
    }
}

impl Default for MergeRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
