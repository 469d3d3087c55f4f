//! Core type definitions for walletdb.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wall-clock timestamp carried by every row.
///
/// Stored with millisecond precision so that values survive JSON and CBOR
/// round trips unchanged.
pub type Timestamp = DateTime<Utc>;

/// Returns the current time truncated to millisecond precision.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now().trunc_subsecs(3)
}

/// Generates a fresh random reference string (used for action references
/// and cursor reference numbers).
#[must_use]
pub fn new_reference() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Blockchain a storage instance holds data for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    /// Production network.
    Main,
    /// Test network.
    Test,
}

impl Default for Chain {
    fn default() -> Self {
        Chain::Test
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Chain::Main => f.write_str("main"),
            Chain::Test => f.write_str("test"),
        }
    }
}

/// Processing status of a wallet transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Mined and proven.
    Completed,
    /// Abandoned or rejected.
    Failed,
    /// Signed but not yet handed to the network layer.
    Unprocessed,
    /// Being broadcast.
    Sending,
    /// Broadcast, awaiting proof.
    Unproven,
    /// Created, awaiting signatures.
    Unsigned,
    /// Signed, intentionally not broadcast.
    Nosend,
    /// Not final (lock time in the future).
    Nonfinal,
    /// Marked for re-examination after a failure.
    Unfail,
}

impl TransactionStatus {
    /// Returns true if a transaction in this status may still be aborted.
    #[must_use]
    pub fn is_abortable(self) -> bool {
        matches!(
            self,
            TransactionStatus::Unsigned
                | TransactionStatus::Unprocessed
                | TransactionStatus::Nosend
                | TransactionStatus::Nonfinal
        )
    }
}

/// Status of a request to obtain a proof for a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProvenTxReqStatus {
    /// Being broadcast.
    Sending,
    /// Not yet broadcast.
    Unsent,
    /// Intentionally not broadcast.
    Nosend,
    /// Status unknown.
    Unknown,
    /// Not final.
    Nonfinal,
    /// Awaiting processing.
    Unprocessed,
    /// Broadcast, not yet mined.
    Unmined,
    /// Waiting on a callback from a broadcaster.
    Callback,
    /// Mined, proof not yet confirmed.
    Unconfirmed,
    /// Proof obtained.
    Completed,
    /// Rejected as invalid.
    Invalid,
    /// Conflicts with another spend.
    DoubleSpend,
    /// Marked for re-examination after a failure.
    Unfail,
}

/// Status recorded on a sync cursor after its last chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Last pass completed.
    Success,
    /// Last chunk failed.
    Error,
    /// Remote instance identified, no chunk processed yet.
    Identified,
    /// A pass is in progress.
    Updated,
    /// Newly created cursor.
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_has_millisecond_precision() {
        let t = now();
        assert_eq!(t.timestamp_subsec_nanos() % 1_000_000, 0);
    }

    #[test]
    fn abortable_statuses() {
        assert!(TransactionStatus::Unsigned.is_abortable());
        assert!(TransactionStatus::Nosend.is_abortable());
        assert!(!TransactionStatus::Completed.is_abortable());
        assert!(!TransactionStatus::Unproven.is_abortable());
    }

    #[test]
    fn status_wire_names() {
        assert_eq!(
            serde_json::to_string(&ProvenTxReqStatus::DoubleSpend).unwrap(),
            "\"doubleSpend\""
        );
        assert_eq!(serde_json::to_string(&Chain::Main).unwrap(), "\"main\"");
    }

    #[test]
    fn references_are_unique() {
        assert_ne!(new_reference(), new_reference());
    }
}
