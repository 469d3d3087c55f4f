//! The id map document persisted inside a sync cursor.
//!
//! Serialized shape:
//!
//! ```json
//! { "<kind>": { "entityName": "...", "idMap": { "<remote>": <local> },
//!               "count": 0, "maxUpdatedAt": "..." } }
//! ```

use crate::error::{SyncError, SyncResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use walletdb_core::{EntityKind, Timestamp};

/// Progress and id correspondence for one entity kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySyncMap {
    /// Wire name of the kind.
    pub entity_name: String,
    /// Remote id to local id.
    #[serde(default)]
    pub id_map: BTreeMap<i64, i64>,
    /// Rows received for this kind in the current pass.
    #[serde(default)]
    pub count: usize,
    /// Newest `updated_at` seen for this kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_updated_at: Option<Timestamp>,
}

impl EntitySyncMap {
    fn new(kind: EntityKind) -> Self {
        Self {
            entity_name: kind.name().to_string(),
            id_map: BTreeMap::new(),
            count: 0,
            max_updated_at: None,
        }
    }
}

/// Per-kind id maps of one cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncMap {
    entries: BTreeMap<EntityKind, EntitySyncMap>,
}

impl Default for SyncMap {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncMap {
    /// Creates a map with an empty entry for every kind.
    pub fn new() -> Self {
        Self {
            entries: EntityKind::SYNC_ORDER
                .iter()
                .map(|&kind| (kind, EntitySyncMap::new(kind)))
                .collect(),
        }
    }

    /// Parses a persisted document; kinds missing from it start empty.
    pub fn from_json(document: &str) -> SyncResult<Self> {
        let mut map = if document.trim().is_empty() {
            Self::new()
        } else {
            let entries: BTreeMap<EntityKind, EntitySyncMap> = serde_json::from_str(document)
                .map_err(walletdb_core::WalletError::from)?;
            Self { entries }
        };
        for kind in EntityKind::SYNC_ORDER {
            map.entries
                .entry(kind)
                .or_insert_with(|| EntitySyncMap::new(kind));
        }
        Ok(map)
    }

    /// Serializes the document.
    pub fn to_json(&self) -> SyncResult<String> {
        Ok(serde_json::to_string(&self.entries).map_err(walletdb_core::WalletError::from)?)
    }

    /// Entry of one kind.
    pub fn entry(&self, kind: EntityKind) -> Option<&EntitySyncMap> {
        self.entries.get(&kind)
    }

    fn entry_mut(&mut self, kind: EntityKind) -> &mut EntitySyncMap {
        self.entries
            .entry(kind)
            .or_insert_with(|| EntitySyncMap::new(kind))
    }

    /// Local id mapped to `remote_id`, if known.
    pub fn local_id(&self, kind: EntityKind, remote_id: i64) -> Option<i64> {
        self.entries
            .get(&kind)
            .and_then(|e| e.id_map.get(&remote_id))
            .copied()
    }

    /// Local id mapped to `remote_id`; an unknown id is an error.
    pub fn require(&self, kind: EntityKind, remote_id: i64) -> SyncResult<i64> {
        self.local_id(kind, remote_id)
            .ok_or(SyncError::MissingIdMapping { kind, remote_id })
    }

    /// Records `remote_id -> local_id`.
    ///
    /// Re-recording the same pair is a no-op; mapping a known remote id to a
    /// different local id fails.
    pub fn merge_id_map(&mut self, kind: EntityKind, remote_id: i64, local_id: i64) -> SyncResult<()> {
        let entry = self.entry_mut(kind);
        match entry.id_map.get(&remote_id) {
            Some(&existing) if existing != local_id => Err(SyncError::IdMapConflict {
                kind,
                remote_id,
                existing,
                incoming: local_id,
            }),
            Some(_) => Ok(()),
            None => {
                entry.id_map.insert(remote_id, local_id);
                Ok(())
            }
        }
    }

    /// Adopts every mapping of `incoming`, failing on the first conflict.
    pub fn merge_all(&mut self, incoming: &SyncMap) -> SyncResult<()> {
        for (&kind, entry) in &incoming.entries {
            for (&remote, &local) in &entry.id_map {
                self.merge_id_map(kind, remote, local)?;
            }
        }
        Ok(())
    }

    /// Counts `received` rows of `kind` and advances its newest timestamp.
    pub fn record_received(&mut self, kind: EntityKind, received: usize, newest: Option<Timestamp>) {
        let entry = self.entry_mut(kind);
        entry.count += received;
        if newest > entry.max_updated_at {
            entry.max_updated_at = newest;
        }
    }

    /// Current per-kind counts, in dependency order.
    pub fn counts(&self) -> impl Iterator<Item = (EntityKind, usize)> + '_ {
        EntityKind::SYNC_ORDER
            .iter()
            .map(move |&kind| (kind, self.entries.get(&kind).map_or(0, |e| e.count)))
    }

    /// Ends a pass: resets counts and returns the newest timestamp seen.
    pub fn complete_pass(&mut self) -> Option<Timestamp> {
        let mut newest = None;
        for entry in self.entries.values_mut() {
            entry.count = 0;
            newest = newest.max(entry.max_updated_at);
        }
        newest
    }
}
