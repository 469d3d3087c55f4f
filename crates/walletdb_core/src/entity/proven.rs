//! Proven transactions and proof requests.
//!
//! Neither row is owned by a user: a mined transaction is shared by every
//! user whose transactions reference its txid.

use super::NaturalKey;
use crate::types::{now, ProvenTxReqStatus, Timestamp};
use serde::{Deserialize, Serialize};

/// A mined transaction together with its merkle proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvenTx {
    /// Local primary key.
    pub proven_tx_id: i64,
    /// Creation time.
    #[serde(rename = "created_at")]
    pub created_at: Timestamp,
    /// Last mutation time.
    #[serde(rename = "updated_at")]
    pub updated_at: Timestamp,
    /// Transaction hash.
    pub txid: String,
    /// Block height.
    pub height: u32,
    /// Index of the transaction within its block.
    pub index: u32,
    /// Serialized merkle path.
    pub merkle_path: Vec<u8>,
    /// Serialized transaction.
    pub raw_tx: Vec<u8>,
    /// Block hash.
    pub block_hash: String,
    /// Merkle root of the block.
    pub merkle_root: String,
}

impl ProvenTx {
    /// Creates a proven transaction that has not been inserted yet.
    pub fn new(txid: impl Into<String>, height: u32, index: u32) -> Self {
        let at = now();
        Self {
            proven_tx_id: 0,
            created_at: at,
            updated_at: at,
            txid: txid.into(),
            height,
            index,
            merkle_path: Vec::new(),
            raw_tx: Vec::new(),
            block_hash: String::new(),
            merkle_root: String::new(),
        }
    }
}

impl_entity!(ProvenTx, proven_tx_id, key: |r: &ProvenTx| NaturalKey::ProvenTx {
    txid: r.txid.clone(),
});

/// A request to obtain a proof for a broadcast transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvenTxReq {
    /// Local primary key.
    pub proven_tx_req_id: i64,
    /// Creation time.
    #[serde(rename = "created_at")]
    pub created_at: Timestamp,
    /// Last mutation time.
    #[serde(rename = "updated_at")]
    pub updated_at: Timestamp,
    /// Proven transaction, once the proof is known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proven_tx_id: Option<i64>,
    /// Request status.
    pub status: ProvenTxReqStatus,
    /// Number of proof attempts so far.
    pub attempts: u32,
    /// Whether interested parties have been notified of completion.
    pub notified: bool,
    /// Transaction hash.
    pub txid: String,
    /// Broadcast batch, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch: Option<String>,
    /// JSON history log.
    pub history: String,
    /// JSON notification targets.
    pub notify: String,
    /// Serialized transaction.
    pub raw_tx: Vec<u8>,
    /// Serialized input proofs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_beef: Option<Vec<u8>>,
}

impl ProvenTxReq {
    /// Creates a request that has not been inserted yet.
    pub fn new(txid: impl Into<String>, raw_tx: Vec<u8>) -> Self {
        let at = now();
        Self {
            proven_tx_req_id: 0,
            created_at: at,
            updated_at: at,
            proven_tx_id: None,
            status: ProvenTxReqStatus::Unsent,
            attempts: 0,
            notified: false,
            txid: txid.into(),
            batch: None,
            history: "{}".to_string(),
            notify: "{}".to_string(),
            raw_tx,
            input_beef: None,
        }
    }
}

impl_entity!(ProvenTxReq, proven_tx_req_id, key: |r: &ProvenTxReq| {
    NaturalKey::ProvenTxReq {
        txid: r.txid.clone(),
    }
});
