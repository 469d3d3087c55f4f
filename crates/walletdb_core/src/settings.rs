//! Per-instance settings row.

use crate::types::{now, Chain, Timestamp};
use serde::{Deserialize, Serialize};

/// Identity and capabilities of one storage instance.
///
/// Written by `migrate` and read back by `make_available`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Creation time.
    #[serde(rename = "created_at")]
    pub created_at: Timestamp,
    /// Last mutation time.
    #[serde(rename = "updated_at")]
    pub updated_at: Timestamp,
    /// Identity key of the instance; how remote peers address it.
    pub storage_identity_key: String,
    /// Human readable name.
    pub storage_name: String,
    /// Chain the instance holds data for.
    pub chain: Chain,
    /// Backend type, e.g. `memory`.
    pub db_type: String,
    /// Longest locking script stored inline.
    pub max_output_script: u32,
}

impl Settings {
    /// Creates a settings row.
    pub fn new(
        storage_identity_key: impl Into<String>,
        storage_name: impl Into<String>,
        chain: Chain,
        db_type: impl Into<String>,
        max_output_script: u32,
    ) -> Self {
        let at = now();
        Self {
            created_at: at,
            updated_at: at,
            storage_identity_key: storage_identity_key.into(),
            storage_name: storage_name.into(),
            chain,
            db_type: db_type.into(),
            max_output_script,
        }
    }
}
