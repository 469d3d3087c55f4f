//! Persisted sync progress for one (user, remote instance) pair.

use crate::types::{new_reference, now, SyncStatus, Timestamp};
use serde::{Deserialize, Serialize};

/// Persisted sync cursor row.
///
/// The id map document is kept as an opaque string here; the sync engine
/// owns its structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    /// Local primary key (0 until inserted).
    pub sync_state_id: i64,
    /// Creation time.
    #[serde(rename = "created_at")]
    pub created_at: Timestamp,
    /// Last mutation time.
    #[serde(rename = "updated_at")]
    pub updated_at: Timestamp,
    /// Local user the cursor belongs to.
    pub user_id: i64,
    /// Identity key of the remote instance.
    pub storage_identity_key: String,
    /// Human readable name of the remote instance.
    pub storage_name: String,
    /// Outcome of the last chunk.
    pub status: SyncStatus,
    /// True once a full pass has completed.
    pub init: bool,
    /// Unique reference number.
    pub ref_num: String,
    /// Serialized id map document.
    pub sync_map: String,
    /// Newest source `updated_at` merged as of the last completed pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<Timestamp>,
    /// Satoshi balance observed at the last pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub satoshis: Option<i64>,
    /// Last error raised locally.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_local: Option<String>,
    /// Last error reported by the remote instance.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_other: Option<String>,
}

impl SyncState {
    /// Creates a cursor row with a fresh reference number.
    pub fn new(
        user_id: i64,
        storage_identity_key: impl Into<String>,
        storage_name: impl Into<String>,
        sync_map: String,
    ) -> Self {
        let at = now();
        Self {
            sync_state_id: 0,
            created_at: at,
            updated_at: at,
            user_id,
            storage_identity_key: storage_identity_key.into(),
            storage_name: storage_name.into(),
            status: SyncStatus::Unknown,
            init: false,
            ref_num: new_reference(),
            sync_map,
            when: None,
            satoshis: None,
            error_local: None,
            error_other: None,
        }
    }
}
