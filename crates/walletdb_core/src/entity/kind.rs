//! Entity kinds and their fixed dependency order.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The kinds of row a wallet storage instance holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    /// Wallet owner.
    User,
    /// Named group of outputs.
    OutputBasket,
    /// Label attached to transactions.
    TxLabel,
    /// Tag attached to outputs.
    OutputTag,
    /// Identity certificate.
    Certificate,
    /// Encrypted certificate field.
    CertificateField,
    /// Wallet transaction.
    Transaction,
    /// Transaction output owned by the wallet.
    Output,
    /// Storage-server commission on a transaction.
    Commission,
    /// Output ↔ tag association.
    OutputTagMap,
    /// Transaction ↔ label association.
    TxLabelMap,
    /// Mined transaction with its merkle proof.
    ProvenTx,
    /// Request to obtain a proof for a transaction.
    ProvenTxReq,
}

impl EntityKind {
    /// Every kind in dependency order: parents always precede children.
    ///
    /// Merges and request offsets iterate in exactly this order.
    pub const SYNC_ORDER: [EntityKind; 13] = [
        EntityKind::User,
        EntityKind::OutputBasket,
        EntityKind::TxLabel,
        EntityKind::OutputTag,
        EntityKind::Certificate,
        EntityKind::CertificateField,
        EntityKind::Transaction,
        EntityKind::Output,
        EntityKind::Commission,
        EntityKind::OutputTagMap,
        EntityKind::TxLabelMap,
        EntityKind::ProvenTx,
        EntityKind::ProvenTxReq,
    ];

    /// Wire name of the kind.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::OutputBasket => "outputBasket",
            EntityKind::TxLabel => "txLabel",
            EntityKind::OutputTag => "outputTag",
            EntityKind::Certificate => "certificate",
            EntityKind::CertificateField => "certificateField",
            EntityKind::Transaction => "transaction",
            EntityKind::Output => "output",
            EntityKind::Commission => "commission",
            EntityKind::OutputTagMap => "outputTagMap",
            EntityKind::TxLabelMap => "txLabelMap",
            EntityKind::ProvenTx => "provenTx",
            EntityKind::ProvenTxReq => "provenTxReq",
        }
    }

    /// Position of the kind in [`EntityKind::SYNC_ORDER`].
    #[must_use]
    pub fn order(self) -> usize {
        Self::SYNC_ORDER
            .iter()
            .position(|k| *k == self)
            .unwrap_or(Self::SYNC_ORDER.len())
    }

    /// Returns true if rows of this kind carry a `user_id` column.
    #[must_use]
    pub const fn is_user_scoped(self) -> bool {
        !matches!(
            self,
            EntityKind::OutputTagMap
                | EntityKind::TxLabelMap
                | EntityKind::ProvenTx
                | EntityKind::ProvenTxReq
        )
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::SYNC_ORDER
            .iter()
            .copied()
            .find(|k| k.name() == s)
            .ok_or_else(|| format!("unknown entity kind: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for kind in EntityKind::SYNC_ORDER {
            assert_eq!(kind.name().parse::<EntityKind>().unwrap(), kind);
        }
        assert!("wallet".parse::<EntityKind>().is_err());
    }

    #[test]
    fn parents_precede_children() {
        assert!(EntityKind::User.order() < EntityKind::OutputBasket.order());
        assert!(EntityKind::Certificate.order() < EntityKind::CertificateField.order());
        assert!(EntityKind::Transaction.order() < EntityKind::Output.order());
        assert!(EntityKind::Output.order() < EntityKind::OutputTagMap.order());
        assert!(EntityKind::ProvenTx.order() < EntityKind::ProvenTxReq.order());
    }

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&EntityKind::ProvenTxReq).unwrap();
        assert_eq!(json, "\"provenTxReq\"");
    }
}
