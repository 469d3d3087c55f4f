//! Transactions, their outputs and commissions.

use super::NaturalKey;
use crate::types::{now, new_reference, Timestamp, TransactionStatus};
use serde::{Deserialize, Serialize};

/// A wallet transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Local primary key.
    pub transaction_id: i64,
    /// Creation time.
    #[serde(rename = "created_at")]
    pub created_at: Timestamp,
    /// Last mutation time.
    #[serde(rename = "updated_at")]
    pub updated_at: Timestamp,
    /// Owning user.
    pub user_id: i64,
    /// Proven transaction, once mined.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proven_tx_id: Option<i64>,
    /// Processing status.
    pub status: TransactionStatus,
    /// Wallet-assigned reference; the natural key.
    pub reference: String,
    /// True when the wallet created the transaction.
    pub is_outgoing: bool,
    /// Net satoshi change to the wallet.
    pub satoshis: i64,
    /// Human readable description.
    pub description: String,
    /// Transaction version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    /// Lock time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_time: Option<u32>,
    /// Transaction hash, once signed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub txid: Option<String>,
    /// Serialized input proofs.
    #[serde(default, rename = "inputBEEF", skip_serializing_if = "Option::is_none")]
    pub input_beef: Option<Vec<u8>>,
    /// Serialized transaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_tx: Option<Vec<u8>>,
}

impl Transaction {
    /// Creates an unsigned transaction with a fresh reference.
    pub fn new(user_id: i64, description: impl Into<String>, satoshis: i64) -> Self {
        let at = now();
        Self {
            transaction_id: 0,
            created_at: at,
            updated_at: at,
            user_id,
            proven_tx_id: None,
            status: TransactionStatus::Unsigned,
            reference: new_reference(),
            is_outgoing: true,
            satoshis,
            description: description.into(),
            version: None,
            lock_time: None,
            txid: None,
            input_beef: None,
            raw_tx: None,
        }
    }
}

impl_entity!(Transaction, transaction_id, user: user_id, key: |r: &Transaction| {
    NaturalKey::Transaction {
        user_id: r.user_id,
        reference: r.reference.clone(),
    }
});

/// An output tracked by the wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Output {
    /// Local primary key.
    pub output_id: i64,
    /// Creation time.
    #[serde(rename = "created_at")]
    pub created_at: Timestamp,
    /// Last mutation time.
    #[serde(rename = "updated_at")]
    pub updated_at: Timestamp,
    /// Owning user.
    pub user_id: i64,
    /// Creating transaction.
    pub transaction_id: i64,
    /// Basket the output belongs to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basket_id: Option<i64>,
    /// Whether the output can be spent by the wallet.
    pub spendable: bool,
    /// Whether the output is wallet change.
    pub change: bool,
    /// Human readable description.
    pub output_description: String,
    /// Index within the creating transaction.
    pub vout: u32,
    /// Value in satoshis.
    pub satoshis: i64,
    /// Who supplied the output (`you`, `storage`, `you-and-storage`).
    pub provided_by: String,
    /// Purpose tag such as `change`.
    pub purpose: String,
    /// Script template type.
    #[serde(rename = "type")]
    pub output_type: String,
    /// Hash of the creating transaction, once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub txid: Option<String>,
    /// Identity key of the sender, for received outputs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_identity_key: Option<String>,
    /// Key derivation prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derivation_prefix: Option<String>,
    /// Key derivation suffix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derivation_suffix: Option<String>,
    /// Free-form spending instructions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_instructions: Option<String>,
    /// Transaction that spends this output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spent_by: Option<i64>,
    /// Input sequence number used when spending.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<u32>,
    /// Description recorded when spent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spending_description: Option<String>,
    /// Locking script.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locking_script: Option<Vec<u8>>,
}

impl Output {
    /// Creates a spendable output that has not been inserted yet.
    pub fn new(user_id: i64, transaction_id: i64, vout: u32, satoshis: i64) -> Self {
        let at = now();
        Self {
            output_id: 0,
            created_at: at,
            updated_at: at,
            user_id,
            transaction_id,
            basket_id: None,
            spendable: true,
            change: false,
            output_description: String::new(),
            vout,
            satoshis,
            provided_by: "you".to_string(),
            purpose: String::new(),
            output_type: "P2PKH".to_string(),
            txid: None,
            sender_identity_key: None,
            derivation_prefix: None,
            derivation_suffix: None,
            custom_instructions: None,
            spent_by: None,
            sequence_number: None,
            spending_description: None,
            locking_script: None,
        }
    }
}

impl_entity!(Output, output_id, user: user_id, key: |r: &Output| NaturalKey::Output {
    user_id: r.user_id,
    transaction_id: r.transaction_id,
    vout: r.vout,
});

/// Fee paid to the storage server by a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Commission {
    /// Local primary key.
    pub commission_id: i64,
    /// Creation time.
    #[serde(rename = "created_at")]
    pub created_at: Timestamp,
    /// Last mutation time.
    #[serde(rename = "updated_at")]
    pub updated_at: Timestamp,
    /// Owning user.
    pub user_id: i64,
    /// Paying transaction; the natural key.
    pub transaction_id: i64,
    /// Commission amount.
    pub satoshis: i64,
    /// Key offset used to derive the commission locking key.
    pub key_offset: String,
    /// Whether the commission has been redeemed.
    pub is_redeemed: bool,
    /// Commission locking script.
    pub locking_script: Vec<u8>,
}

impl Commission {
    /// Creates a commission that has not been inserted yet.
    pub fn new(user_id: i64, transaction_id: i64, satoshis: i64) -> Self {
        let at = now();
        Self {
            commission_id: 0,
            created_at: at,
            updated_at: at,
            user_id,
            transaction_id,
            satoshis,
            key_offset: String::new(),
            is_redeemed: false,
            locking_script: Vec::new(),
        }
    }
}

impl_entity!(Commission, commission_id, user: user_id, key: |r: &Commission| {
    NaturalKey::Commission {
        transaction_id: r.transaction_id,
    }
});
