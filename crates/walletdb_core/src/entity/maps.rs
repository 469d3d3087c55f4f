//! Many-to-many association rows.
//!
//! Maps carry no `user_id`; their owner is the owner of the output or
//! transaction they reference.

use super::NaturalKey;
use crate::types::{now, Timestamp};
use serde::{Deserialize, Serialize};

/// Association of an output with a tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputTagMap {
    /// Local primary key.
    pub output_tag_map_id: i64,
    /// Creation time.
    #[serde(rename = "created_at")]
    pub created_at: Timestamp,
    /// Last mutation time.
    #[serde(rename = "updated_at")]
    pub updated_at: Timestamp,
    /// Tag.
    pub output_tag_id: i64,
    /// Tagged output.
    pub output_id: i64,
    /// Soft-delete flag.
    pub is_deleted: bool,
}

impl OutputTagMap {
    /// Creates an association that has not been inserted yet.
    pub fn new(output_id: i64, output_tag_id: i64) -> Self {
        let at = now();
        Self {
            output_tag_map_id: 0,
            created_at: at,
            updated_at: at,
            output_tag_id,
            output_id,
            is_deleted: false,
        }
    }
}

impl_entity!(OutputTagMap, output_tag_map_id, key: |r: &OutputTagMap| {
    NaturalKey::OutputTagMap {
        output_id: r.output_id,
        output_tag_id: r.output_tag_id,
    }
});

/// Association of a transaction with a label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxLabelMap {
    /// Local primary key.
    pub tx_label_map_id: i64,
    /// Creation time.
    #[serde(rename = "created_at")]
    pub created_at: Timestamp,
    /// Last mutation time.
    #[serde(rename = "updated_at")]
    pub updated_at: Timestamp,
    /// Label.
    pub tx_label_id: i64,
    /// Labelled transaction.
    pub transaction_id: i64,
    /// Soft-delete flag.
    pub is_deleted: bool,
}

impl TxLabelMap {
    /// Creates an association that has not been inserted yet.
    pub fn new(transaction_id: i64, tx_label_id: i64) -> Self {
        let at = now();
        Self {
            tx_label_map_id: 0,
            created_at: at,
            updated_at: at,
            tx_label_id,
            transaction_id,
            is_deleted: false,
        }
    }
}

impl_entity!(TxLabelMap, tx_label_map_id, key: |r: &TxLabelMap| NaturalKey::TxLabelMap {
    transaction_id: r.transaction_id,
    tx_label_id: r.tx_label_id,
});
