//! Persisted sync progress for one (user, remote instance) pair.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::sync_map::SyncMap;
use tracing::{debug, warn};
use walletdb_core::{
    now, EntityKind, Settings, SyncState, SyncStatus, Timestamp, WalletStorage,
};
use walletdb_sync_protocol::{RequestSyncChunkArgs, SyncChunk, SyncChunkOffset};

/// A loaded [`SyncState`] together with its parsed id map.
///
/// The cursor lives in the instance that merges chunks. Every change is
/// written back through [`SyncCursor::save`].
#[derive(Debug, Clone)]
pub struct SyncCursor {
    state: SyncState,
    map: SyncMap,
}

impl SyncCursor {
    /// Loads the cursor for `user_id` and the remote instance, creating it
    /// on first contact.
    pub async fn load_or_create(
        local: &dyn WalletStorage,
        user_id: i64,
        remote: &Settings,
    ) -> SyncResult<Self> {
        if let Some(state) = local
            .find_sync_state(user_id, &remote.storage_identity_key)
            .await?
        {
            let map = SyncMap::from_json(&state.sync_map)?;
            return Ok(Self { state, map });
        }

        let map = SyncMap::new();
        let mut cursor = Self {
            state: SyncState::new(
                user_id,
                remote.storage_identity_key.clone(),
                remote.storage_name.clone(),
                map.to_json()?,
            ),
            map,
        };
        cursor.save(local).await?;
        debug!(
            user_id,
            remote = %remote.storage_identity_key,
            ref_num = %cursor.state.ref_num,
            "created sync cursor"
        );
        Ok(cursor)
    }

    /// Loads an existing cursor.
    ///
    /// Chunks are only merged after a request was built, so a missing
    /// cursor means the chunk was not requested by this instance.
    pub async fn load(
        local: &dyn WalletStorage,
        user_id: i64,
        remote_storage_identity_key: &str,
    ) -> SyncResult<Self> {
        let state = local
            .find_sync_state(user_id, remote_storage_identity_key)
            .await?
            .ok_or_else(|| {
                SyncError::ChunkMismatch(format!(
                    "no sync cursor for {remote_storage_identity_key}"
                ))
            })?;
        let map = SyncMap::from_json(&state.sync_map)?;
        Ok(Self { state, map })
    }

    /// The persisted row.
    pub fn state(&self) -> &SyncState {
        &self.state
    }

    /// The id maps.
    pub fn map(&self) -> &SyncMap {
        &self.map
    }

    /// Mutable id maps, for merging.
    pub fn map_mut(&mut self) -> &mut SyncMap {
        &mut self.map
    }

    /// Newest merged `updated_at` as of the last completed pass.
    pub fn when(&self) -> Option<Timestamp> {
        self.state.when
    }

    /// Builds the next chunk request addressed to the remote instance.
    pub fn build_request(
        &self,
        for_identity_key: &str,
        local: &Settings,
        config: &SyncConfig,
    ) -> RequestSyncChunkArgs {
        RequestSyncChunkArgs {
            from_storage_identity_key: self.state.storage_identity_key.clone(),
            to_storage_identity_key: local.storage_identity_key.clone(),
            identity_key: for_identity_key.to_string(),
            max_rough_size: config.max_rough_size,
            max_items: config.max_items,
            offsets: self
                .map
                .counts()
                .map(|(kind, offset)| SyncChunkOffset {
                    name: kind.name().to_string(),
                    offset,
                })
                .collect(),
        }
    }

    /// Advances per-kind counts by the rows of a merged chunk.
    pub fn record_chunk(&mut self, chunk: &SyncChunk) {
        for kind in EntityKind::SYNC_ORDER {
            let rows = chunk.rows_of(kind);
            let newest = rows.iter().map(|r| r.updated_at()).max();
            let received = if kind == EntityKind::User { 0 } else { rows.len() };
            self.map.record_received(kind, received, newest);
        }
        self.state.status = SyncStatus::Updated;
    }

    /// Ends a pass: records the newest merged timestamp and resets counts.
    pub fn complete_pass(&mut self) {
        let newest = self.map.complete_pass();
        if newest > self.state.when {
            self.state.when = newest;
        }
        self.state.status = SyncStatus::Success;
        self.state.init = true;
        self.state.error_local = None;
        self.state.error_other = None;
    }

    /// Records a local failure. Counts are left where they were.
    pub fn record_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(
            remote = %self.state.storage_identity_key,
            error = %message,
            "sync chunk failed"
        );
        self.state.status = SyncStatus::Error;
        self.state.error_local = Some(message);
    }

    /// Records a failure reported by the remote instance.
    pub fn record_remote_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(
            remote = %self.state.storage_identity_key,
            error = %message,
            "remote instance failed to produce a chunk"
        );
        self.state.status = SyncStatus::Error;
        self.state.error_other = Some(message);
    }

    /// Writes the cursor back, inserting it when it has no id yet.
    pub async fn save(&mut self, local: &dyn WalletStorage) -> SyncResult<()> {
        self.state.sync_map = self.map.to_json()?;
        self.state.updated_at = now().max(self.state.updated_at);
        if self.state.sync_state_id == 0 {
            self.state.sync_state_id = local.insert_sync_state(&self.state).await?;
        } else {
            local.update_sync_state(&self.state).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use walletdb_core::{Chain, OutputBasket, StorageConfig, StorageExt, User};
    use walletdb_storage::InMemoryStorage;

    async fn local() -> InMemoryStorage {
        let storage = InMemoryStorage::new(StorageConfig::new("local").storage_identity_key("L"));
        storage.make_available().await.unwrap();
        storage
    }

    fn remote_settings() -> Settings {
        Settings::new("R", "remote", Chain::Test, "memory", 10_000)
    }

    #[tokio::test]
    async fn load_or_create_persists_once() {
        let local = local().await;
        let (user, _) = local.find_or_insert_user("alice").await.unwrap();

        let first = SyncCursor::load_or_create(&local, user.user_id, &remote_settings())
            .await
            .unwrap();
        assert_ne!(first.state().sync_state_id, 0);
        assert_eq!(first.state().status, SyncStatus::Unknown);
        assert!(!first.state().init);

        let second = SyncCursor::load_or_create(&local, user.user_id, &remote_settings())
            .await
            .unwrap();
        assert_eq!(second.state().sync_state_id, first.state().sync_state_id);
        assert_eq!(second.state().ref_num, first.state().ref_num);
    }

    #[tokio::test]
    async fn build_request_lists_every_kind_in_order() {
        let local = local().await;
        let (user, _) = local.find_or_insert_user("alice").await.unwrap();
        let cursor = SyncCursor::load_or_create(&local, user.user_id, &remote_settings())
            .await
            .unwrap();

        let args = cursor.build_request(
            "alice",
            &local.settings().unwrap(),
            &SyncConfig::new().with_max_items(5),
        );
        assert_eq!(args.from_storage_identity_key, "R");
        assert_eq!(args.to_storage_identity_key, "L");
        assert_eq!(args.max_items, 5);
        let names: Vec<_> = args.offsets.iter().map(|o| o.name.as_str()).collect();
        let expected: Vec<_> = EntityKind::SYNC_ORDER.iter().map(|k| k.name()).collect();
        assert_eq!(names, expected);
    }

    #[tokio::test]
    async fn progress_and_completion_survive_reload() {
        let local = local().await;
        let (user, _) = local.find_or_insert_user("alice").await.unwrap();
        let mut cursor = SyncCursor::load_or_create(&local, user.user_id, &remote_settings())
            .await
            .unwrap();

        let mut chunk = SyncChunk::new("R", "L", "alice");
        chunk.user = Some(User::new("alice"));
        chunk.output_baskets.push(OutputBasket::new(1, "a"));
        chunk.output_baskets.push(OutputBasket::new(1, "b"));
        let newest = chunk.output_baskets[1].updated_at;

        cursor.record_chunk(&chunk);
        cursor.save(&local).await.unwrap();
        let reloaded = SyncCursor::load_or_create(&local, user.user_id, &remote_settings())
            .await
            .unwrap();
        let args = reloaded.build_request("alice", &local.settings().unwrap(), &SyncConfig::new());
        assert_eq!(args.offset_for(EntityKind::OutputBasket), 2);
        assert_eq!(args.offset_for(EntityKind::User), 0);

        cursor.complete_pass();
        cursor.save(&local).await.unwrap();
        let reloaded = SyncCursor::load_or_create(&local, user.user_id, &remote_settings())
            .await
            .unwrap();
        assert_eq!(reloaded.state().status, SyncStatus::Success);
        assert!(reloaded.state().init);
        assert!(reloaded.when() >= Some(newest));
        let args = reloaded.build_request("alice", &local.settings().unwrap(), &SyncConfig::new());
        assert!(args.offsets.iter().all(|o| o.offset == 0));
    }

    #[tokio::test]
    async fn record_error_keeps_counts() {
        let local = local().await;
        let (user, _) = local.find_or_insert_user("alice").await.unwrap();
        let mut cursor = SyncCursor::load_or_create(&local, user.user_id, &remote_settings())
            .await
            .unwrap();
        cursor.map_mut().merge_id_map(EntityKind::TxLabel, 3, 1).unwrap();
        cursor.record_error("boom");
        cursor.save(&local).await.unwrap();

        let reloaded = SyncCursor::load_or_create(&local, user.user_id, &remote_settings())
            .await
            .unwrap();
        assert_eq!(reloaded.state().status, SyncStatus::Error);
        assert_eq!(reloaded.state().error_local.as_deref(), Some("boom"));
        assert_eq!(reloaded.map().local_id(EntityKind::TxLabel, 3), Some(1));
    }

    #[tokio::test]
    async fn remote_error_is_kept_apart_and_cleared_by_completion() {
        let local = local().await;
        let (user, _) = local.find_or_insert_user("alice").await.unwrap();
        let mut cursor = SyncCursor::load_or_create(&local, user.user_id, &remote_settings())
            .await
            .unwrap();
        cursor.record_remote_error("reader offline");
        cursor.save(&local).await.unwrap();

        let mut reloaded = SyncCursor::load(&local, user.user_id, "R").await.unwrap();
        assert_eq!(reloaded.state().status, SyncStatus::Error);
        assert_eq!(reloaded.state().error_other.as_deref(), Some("reader offline"));
        assert!(reloaded.state().error_local.is_none());

        reloaded.complete_pass();
        assert_eq!(reloaded.state().status, SyncStatus::Success);
        assert!(reloaded.state().error_other.is_none());
    }
}
