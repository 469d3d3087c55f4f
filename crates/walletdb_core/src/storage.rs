//! The storage provider interface.
//!
//! A [`WalletStorage`] is one physical copy of a wallet's data. The manager
//! and the sync engine only ever talk to instances through this trait, so a
//! remote instance can sit behind any transport that implements it.

use crate::entity::{Entity, EntityKind, EntityRow, NaturalKey, SyncState, User};
use crate::error::WalletResult;
use crate::settings::Settings;
use async_trait::async_trait;

/// Selection of rows of one kind, ordered by local id ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowQuery {
    /// Kind of row to return.
    pub kind: EntityKind,
    /// Restrict to rows owned by this user. Maps and proven rows are owned
    /// through the transactions and outputs they reference.
    pub user_id: Option<i64>,
    /// Number of matching rows to skip.
    pub offset: usize,
    /// Maximum number of rows to return.
    pub limit: Option<usize>,
    /// Whether soft-deleted rows are returned.
    pub include_deleted: bool,
}

impl RowQuery {
    /// Selects every live row of `kind`.
    #[must_use]
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            user_id: None,
            offset: 0,
            limit: None,
            include_deleted: false,
        }
    }

    /// Restricts the selection to one user.
    #[must_use]
    pub fn for_user(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Skips `offset` rows and returns at most `limit`.
    #[must_use]
    pub fn paged(mut self, offset: usize, limit: usize) -> Self {
        self.offset = offset;
        self.limit = Some(limit);
        self
    }

    /// Includes soft-deleted rows.
    #[must_use]
    pub fn include_deleted(mut self, include: bool) -> Self {
        self.include_deleted = include;
        self
    }
}

/// One physical copy of wallet data.
///
/// Implementations serialize their own internal writes; callers coordinate
/// structural sync through the storage manager.
#[async_trait]
pub trait WalletStorage: Send + Sync {
    /// Returns true once `make_available` has succeeded.
    fn is_available(&self) -> bool;

    /// Loads settings, migrating a fresh instance first, and marks the
    /// instance available.
    async fn make_available(&self) -> WalletResult<Settings>;

    /// Brings the schema up to date and records the instance identity.
    /// Returns the resulting schema version.
    async fn migrate(&self, storage_name: &str, storage_identity_key: &str)
        -> WalletResult<String>;

    /// Drops all data held by the instance.
    async fn destroy(&self) -> WalletResult<()>;

    /// Settings of an available instance.
    ///
    /// Returns `InvalidOperation` before `make_available`.
    fn settings(&self) -> WalletResult<Settings>;

    /// Looks up a row by natural key.
    async fn find_by_natural_key(&self, key: &NaturalKey) -> WalletResult<Option<EntityRow>>;

    /// Looks up a row by local id.
    async fn find_by_id(&self, kind: EntityKind, id: i64) -> WalletResult<Option<EntityRow>>;

    /// Returns the rows selected by `query`, ordered by local id.
    async fn find_rows(&self, query: &RowQuery) -> WalletResult<Vec<EntityRow>>;

    /// Inserts a row, assigning and returning a fresh local id.
    ///
    /// Fails with `InvalidParameter` when a row with the same natural key
    /// exists. Timestamps are stored as given.
    async fn insert_row(&self, row: EntityRow) -> WalletResult<i64>;

    /// Replaces the row with the same kind and id. Timestamps are stored as
    /// given.
    async fn update_row(&self, row: &EntityRow) -> WalletResult<()>;

    /// Looks up the sync cursor for a user and remote instance.
    async fn find_sync_state(
        &self,
        user_id: i64,
        storage_identity_key: &str,
    ) -> WalletResult<Option<SyncState>>;

    /// Inserts a sync cursor, returning its id.
    async fn insert_sync_state(&self, state: &SyncState) -> WalletResult<i64>;

    /// Updates a sync cursor by id.
    async fn update_sync_state(&self, state: &SyncState) -> WalletResult<()>;
}

/// Typed conveniences over [`WalletStorage`].
#[async_trait]
pub trait StorageExt: WalletStorage {
    /// Looks up a typed row by natural key.
    async fn find_entity<T: Entity>(&self, key: &NaturalKey) -> WalletResult<Option<T>> {
        match self.find_by_natural_key(key).await? {
            Some(row) => Ok(Some(T::from_row(row)?)),
            None => Ok(None),
        }
    }

    /// Looks up a typed row by local id.
    async fn find_entity_by_id<T: Entity>(&self, id: i64) -> WalletResult<Option<T>> {
        match self.find_by_id(T::KIND, id).await? {
            Some(row) => Ok(Some(T::from_row(row)?)),
            None => Ok(None),
        }
    }

    /// Returns typed rows; the query kind is forced to `T::KIND`.
    async fn find_entities<T: Entity>(&self, query: &RowQuery) -> WalletResult<Vec<T>> {
        let mut query = query.clone();
        query.kind = T::KIND;
        self.find_rows(&query)
            .await?
            .into_iter()
            .map(T::from_row)
            .collect()
    }

    /// Inserts a typed row and stores the assigned id back into it.
    async fn insert_entity<T: Entity>(&self, entity: &mut T) -> WalletResult<i64> {
        let id = self.insert_row(entity.clone().into_row()).await?;
        entity.set_id(id);
        Ok(id)
    }

    /// Updates a typed row.
    async fn update_entity<T: Entity>(&self, entity: &T) -> WalletResult<()> {
        self.update_row(&entity.clone().into_row()).await
    }

    /// Returns the row with the same natural key as `entity`, inserting
    /// `entity` when there is none. The flag is true when inserted.
    async fn find_or_insert_entity<T: Entity>(&self, mut entity: T) -> WalletResult<(T, bool)> {
        if let Some(found) = self.find_entity::<T>(&entity.natural_key()).await? {
            return Ok((found, false));
        }
        self.insert_entity(&mut entity).await?;
        Ok((entity, true))
    }

    /// Looks up a user by identity key.
    async fn find_user(&self, identity_key: &str) -> WalletResult<Option<User>> {
        let key = NaturalKey::User {
            identity_key: identity_key.to_string(),
        };
        self.find_entity::<User>(&key).await
    }

    /// Returns the user with `identity_key`, creating it when missing.
    async fn find_or_insert_user(&self, identity_key: &str) -> WalletResult<(User, bool)> {
        self.find_or_insert_entity(User::new(identity_key)).await
    }
}

impl<S: WalletStorage + ?Sized> StorageExt for S {}
