//! Type-erased row used at the storage and merge seams.

use super::{
    Certificate, CertificateField, Commission, EntityKind, NaturalKey, Output, OutputBasket,
    OutputTag, OutputTagMap, ProvenTx, ProvenTxReq, Transaction, TxLabel, TxLabelMap, User,
};
use super::Entity;
use crate::types::Timestamp;
use serde::{Deserialize, Serialize};

/// A row of any synchronized kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity", content = "row", rename_all = "camelCase")]
pub enum EntityRow {
    /// A user row.
    User(User),
    /// A basket row.
    OutputBasket(OutputBasket),
    /// A label row.
    TxLabel(TxLabel),
    /// A tag row.
    OutputTag(OutputTag),
    /// A certificate row.
    Certificate(Certificate),
    /// A certificate field row.
    CertificateField(CertificateField),
    /// A transaction row.
    Transaction(Transaction),
    /// An output row.
    Output(Output),
    /// A commission row.
    Commission(Commission),
    /// An output-tag association row.
    OutputTagMap(OutputTagMap),
    /// A transaction-label association row.
    TxLabelMap(TxLabelMap),
    /// A proven transaction row.
    ProvenTx(ProvenTx),
    /// A proof request row.
    ProvenTxReq(ProvenTxReq),
}

macro_rules! dispatch {
    ($row:expr, $r:ident => $body:expr) => {
        match $row {
            EntityRow::User($r) => $body,
            EntityRow::OutputBasket($r) => $body,
            EntityRow::TxLabel($r) => $body,
            EntityRow::OutputTag($r) => $body,
            EntityRow::Certificate($r) => $body,
            EntityRow::CertificateField($r) => $body,
            EntityRow::Transaction($r) => $body,
            EntityRow::Output($r) => $body,
            EntityRow::Commission($r) => $body,
            EntityRow::OutputTagMap($r) => $body,
            EntityRow::TxLabelMap($r) => $body,
            EntityRow::ProvenTx($r) => $body,
            EntityRow::ProvenTxReq($r) => $body,
        }
    };
}

impl EntityRow {
    /// Kind of the wrapped row.
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityRow::User(_) => EntityKind::User,
            EntityRow::OutputBasket(_) => EntityKind::OutputBasket,
            EntityRow::TxLabel(_) => EntityKind::TxLabel,
            EntityRow::OutputTag(_) => EntityKind::OutputTag,
            EntityRow::Certificate(_) => EntityKind::Certificate,
            EntityRow::CertificateField(_) => EntityKind::CertificateField,
            EntityRow::Transaction(_) => EntityKind::Transaction,
            EntityRow::Output(_) => EntityKind::Output,
            EntityRow::Commission(_) => EntityKind::Commission,
            EntityRow::OutputTagMap(_) => EntityKind::OutputTagMap,
            EntityRow::TxLabelMap(_) => EntityKind::TxLabelMap,
            EntityRow::ProvenTx(_) => EntityKind::ProvenTx,
            EntityRow::ProvenTxReq(_) => EntityKind::ProvenTxReq,
        }
    }

    /// Local primary key.
    pub fn id(&self) -> i64 {
        dispatch!(self, r => r.id())
    }

    /// Sets the local primary key.
    pub fn set_id(&mut self, id: i64) {
        dispatch!(self, r => r.set_id(id))
    }

    /// Owning user, for user-scoped kinds.
    pub fn user_id(&self) -> Option<i64> {
        dispatch!(self, r => r.user_id())
    }

    /// Creation time.
    pub fn created_at(&self) -> Timestamp {
        dispatch!(self, r => r.created_at())
    }

    /// Last mutation time.
    pub fn updated_at(&self) -> Timestamp {
        dispatch!(self, r => r.updated_at())
    }

    /// Portable identity.
    pub fn natural_key(&self) -> NaturalKey {
        dispatch!(self, r => r.natural_key())
    }

    /// Returns true if the row is soft-deleted.
    pub fn is_deleted(&self) -> bool {
        match self {
            EntityRow::OutputBasket(r) => r.is_deleted,
            EntityRow::TxLabel(r) => r.is_deleted,
            EntityRow::OutputTag(r) => r.is_deleted,
            EntityRow::Certificate(r) => r.is_deleted,
            EntityRow::OutputTagMap(r) => r.is_deleted,
            EntityRow::TxLabelMap(r) => r.is_deleted,
            _ => false,
        }
    }

    /// Serialized JSON length, used as the rough size of a row on the wire.
    pub fn rough_size(&self) -> usize {
        dispatch!(self, r => serde_json::to_vec(r).map(|v| v.len()).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_reads_through() {
        let mut row = OutputBasket::new(4, "savings").into_row();
        row.set_id(11);
        assert_eq!(row.id(), 11);
        assert_eq!(row.user_id(), Some(4));
        assert_eq!(row.kind(), EntityKind::OutputBasket);
        assert!(!row.is_deleted());
        assert!(row.rough_size() > 0);
    }

    #[test]
    fn maps_have_no_user() {
        let row = OutputTagMap::new(1, 2).into_row();
        assert_eq!(row.user_id(), None);
        assert_eq!(
            row.natural_key(),
            NaturalKey::OutputTagMap {
                output_id: 1,
                output_tag_id: 2
            }
        );
    }
}
