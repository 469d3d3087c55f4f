//! Protocol messages for chunked sync.

use serde::{Deserialize, Serialize};
use walletdb_core::{
    Certificate, CertificateField, Commission, Entity, EntityKind, EntityRow, Output,
    OutputBasket, OutputTag, OutputTagMap, ProvenTx, ProvenTxReq, Transaction, TxLabel,
    TxLabelMap, User, WalletError, WalletResult,
};

/// A sync protocol message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "camelCase")]
pub enum SyncMessage {
    /// Writer asks the reader for the next chunk.
    RequestSyncChunk(RequestSyncChunkArgs),
    /// Reader answers with a chunk of rows.
    SyncChunk(Box<SyncChunk>),
    /// Writer reports how a chunk was merged.
    ProcessResult(ProcessSyncChunkResult),
    /// Either side reports a failure.
    Error {
        /// Human readable description.
        message: String,
    },
}

impl SyncMessage {
    /// Returns the message type code used in binary frames.
    pub fn type_code(&self) -> u8 {
        match self {
            SyncMessage::RequestSyncChunk(_) => 1,
            SyncMessage::SyncChunk(_) => 2,
            SyncMessage::ProcessResult(_) => 3,
            SyncMessage::Error { .. } => 4,
        }
    }
}

/// Per-kind progress inside the current pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncChunkOffset {
    /// Wire name of the entity kind.
    pub name: String,
    /// Rows of this kind already received in the current pass.
    pub offset: usize,
}

/// Arguments of a chunk request.
///
/// Built by the writer from its cursor for the reader it is pulling from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestSyncChunkArgs {
    /// Identity key of the instance that produces the chunk.
    pub from_storage_identity_key: String,
    /// Identity key of the instance that merges the chunk.
    pub to_storage_identity_key: String,
    /// Identity key of the user whose rows are requested.
    pub identity_key: String,
    /// Budget on the accumulated serialized size of the rows.
    pub max_rough_size: usize,
    /// Budget on the number of rows.
    pub max_items: usize,
    /// One entry per kind, in dependency order.
    pub offsets: Vec<SyncChunkOffset>,
}

impl RequestSyncChunkArgs {
    /// Offset recorded for `kind`, zero when absent.
    pub fn offset_for(&self, kind: EntityKind) -> usize {
        self.offsets
            .iter()
            .find(|o| o.name == kind.name())
            .map_or(0, |o| o.offset)
    }
}

/// A chunk of one user's rows, grouped by kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncChunk {
    /// Identity key of the producing instance.
    pub from_storage_identity_key: String,
    /// Identity key of the instance the chunk is addressed to.
    pub to_storage_identity_key: String,
    /// Identity key of the user the rows belong to.
    pub user_identity_key: String,
    /// The user row. Absent when the user is unknown to the producer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    /// Basket rows.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_baskets: Vec<OutputBasket>,
    /// Label rows.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tx_labels: Vec<TxLabel>,
    /// Tag rows.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_tags: Vec<OutputTag>,
    /// Certificate rows.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub certificates: Vec<Certificate>,
    /// Certificate field rows.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub certificate_fields: Vec<CertificateField>,
    /// Transaction rows.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transactions: Vec<Transaction>,
    /// Output rows.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<Output>,
    /// Commission rows.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commissions: Vec<Commission>,
    /// Output-tag association rows.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_tag_maps: Vec<OutputTagMap>,
    /// Transaction-label association rows.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tx_label_maps: Vec<TxLabelMap>,
    /// Proven transaction rows.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub proven_txs: Vec<ProvenTx>,
    /// Proof request rows.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub proven_tx_reqs: Vec<ProvenTxReq>,
}

fn rows<T: Entity>(items: &[T]) -> Vec<EntityRow> {
    items.iter().cloned().map(Entity::into_row).collect()
}

impl SyncChunk {
    /// Creates an empty chunk.
    pub fn new(
        from_storage_identity_key: impl Into<String>,
        to_storage_identity_key: impl Into<String>,
        user_identity_key: impl Into<String>,
    ) -> Self {
        Self {
            from_storage_identity_key: from_storage_identity_key.into(),
            to_storage_identity_key: to_storage_identity_key.into(),
            user_identity_key: user_identity_key.into(),
            ..Self::default()
        }
    }

    /// Rows of one kind, in chunk order.
    pub fn rows_of(&self, kind: EntityKind) -> Vec<EntityRow> {
        match kind {
            EntityKind::User => self.user.iter().cloned().map(Entity::into_row).collect(),
            EntityKind::OutputBasket => rows(&self.output_baskets),
            EntityKind::TxLabel => rows(&self.tx_labels),
            EntityKind::OutputTag => rows(&self.output_tags),
            EntityKind::Certificate => rows(&self.certificates),
            EntityKind::CertificateField => rows(&self.certificate_fields),
            EntityKind::Transaction => rows(&self.transactions),
            EntityKind::Output => rows(&self.outputs),
            EntityKind::Commission => rows(&self.commissions),
            EntityKind::OutputTagMap => rows(&self.output_tag_maps),
            EntityKind::TxLabelMap => rows(&self.tx_label_maps),
            EntityKind::ProvenTx => rows(&self.proven_txs),
            EntityKind::ProvenTxReq => rows(&self.proven_tx_reqs),
        }
    }

    /// Appends a row to the list of its kind.
    ///
    /// A user row replaces the chunk's user.
    pub fn push_row(&mut self, row: EntityRow) {
        match row {
            EntityRow::User(r) => self.user = Some(r),
            EntityRow::OutputBasket(r) => self.output_baskets.push(r),
            EntityRow::TxLabel(r) => self.tx_labels.push(r),
            EntityRow::OutputTag(r) => self.output_tags.push(r),
            EntityRow::Certificate(r) => self.certificates.push(r),
            EntityRow::CertificateField(r) => self.certificate_fields.push(r),
            EntityRow::Transaction(r) => self.transactions.push(r),
            EntityRow::Output(r) => self.outputs.push(r),
            EntityRow::Commission(r) => self.commissions.push(r),
            EntityRow::OutputTagMap(r) => self.output_tag_maps.push(r),
            EntityRow::TxLabelMap(r) => self.tx_label_maps.push(r),
            EntityRow::ProvenTx(r) => self.proven_txs.push(r),
            EntityRow::ProvenTxReq(r) => self.proven_tx_reqs.push(r),
        }
    }

    /// Number of rows of `kind` in the chunk.
    pub fn count_of(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::User => usize::from(self.user.is_some()),
            EntityKind::OutputBasket => self.output_baskets.len(),
            EntityKind::TxLabel => self.tx_labels.len(),
            EntityKind::OutputTag => self.output_tags.len(),
            EntityKind::Certificate => self.certificates.len(),
            EntityKind::CertificateField => self.certificate_fields.len(),
            EntityKind::Transaction => self.transactions.len(),
            EntityKind::Output => self.outputs.len(),
            EntityKind::Commission => self.commissions.len(),
            EntityKind::OutputTagMap => self.output_tag_maps.len(),
            EntityKind::TxLabelMap => self.tx_label_maps.len(),
            EntityKind::ProvenTx => self.proven_txs.len(),
            EntityKind::ProvenTxReq => self.proven_tx_reqs.len(),
        }
    }

    /// Total number of rows, the user row included.
    pub fn row_count(&self) -> usize {
        EntityKind::SYNC_ORDER.iter().map(|&k| self.count_of(k)).sum()
    }

    /// Returns true when the chunk carries no rows beyond the user.
    ///
    /// An empty chunk ends the current pass.
    pub fn is_empty(&self) -> bool {
        EntityKind::SYNC_ORDER
            .iter()
            .filter(|&&k| k != EntityKind::User)
            .all(|&k| self.count_of(k) == 0)
    }

    /// Checks the chunk is addressed to `to_storage_identity_key` and
    /// carries rows of `identity_key`.
    pub fn validate_addressing(
        &self,
        to_storage_identity_key: &str,
        identity_key: &str,
    ) -> WalletResult<()> {
        if self.to_storage_identity_key != to_storage_identity_key {
            return Err(WalletError::invalid_parameter(
                "toStorageIdentityKey",
                format!(
                    "chunk addressed to {}, not {to_storage_identity_key}",
                    self.to_storage_identity_key
                ),
            ));
        }
        if self.user_identity_key != identity_key {
            return Err(WalletError::invalid_parameter(
                "userIdentityKey",
                format!("chunk carries rows of {}", self.user_identity_key),
            ));
        }
        if let Some(user) = &self.user {
            if user.identity_key != identity_key {
                return Err(WalletError::invalid_parameter(
                    "user",
                    "chunk user row does not match userIdentityKey",
                ));
            }
        }
        Ok(())
    }
}

/// Outcome of merging one chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSyncChunkResult {
    /// Rows inserted into the writer.
    pub inserts: usize,
    /// Rows whose mutable fields changed.
    pub updates: usize,
    /// True when the pass is complete.
    pub done: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk() -> SyncChunk {
        SyncChunk::new("reader", "writer", "alice")
    }

    #[test]
    fn empty_chunk_with_only_user_is_empty() {
        let mut c = chunk();
        c.user = Some(User::new("alice"));
        assert!(c.is_empty());
        assert_eq!(c.row_count(), 1);
    }

    #[test]
    fn push_row_routes_by_kind() {
        let mut c = chunk();
        c.push_row(OutputBasket::new(1, "default").into_row());
        c.push_row(Transaction::new(1, "pay", 10).into_row());
        c.push_row(User::new("alice").into_row());

        assert!(!c.is_empty());
        assert_eq!(c.count_of(EntityKind::OutputBasket), 1);
        assert_eq!(c.count_of(EntityKind::Transaction), 1);
        assert_eq!(c.rows_of(EntityKind::User).len(), 1);
        assert!(c.rows_of(EntityKind::Output).is_empty());
    }

    #[test]
    fn offset_for_defaults_to_zero() {
        let args = RequestSyncChunkArgs {
            from_storage_identity_key: "reader".into(),
            to_storage_identity_key: "writer".into(),
            identity_key: "alice".into(),
            max_rough_size: 1000,
            max_items: 10,
            offsets: vec![SyncChunkOffset {
                name: "transaction".into(),
                offset: 7,
            }],
        };
        assert_eq!(args.offset_for(EntityKind::Transaction), 7);
        assert_eq!(args.offset_for(EntityKind::Output), 0);
    }

    #[test]
    fn validate_addressing_rejects_wrong_destination() {
        let c = chunk();
        assert!(c.validate_addressing("writer", "alice").is_ok());
        assert!(c.validate_addressing("other", "alice").is_err());
        assert!(c.validate_addressing("writer", "bob").is_err());
    }

    #[test]
    fn validate_addressing_rejects_foreign_user_row() {
        let mut c = chunk();
        c.user = Some(User::new("mallory"));
        assert!(c.validate_addressing("writer", "alice").is_err());
    }

    #[test]
    fn message_type_codes_are_distinct() {
        let codes = [
            SyncMessage::ProcessResult(ProcessSyncChunkResult::default()).type_code(),
            SyncMessage::SyncChunk(Box::new(chunk())).type_code(),
            SyncMessage::Error {
                message: "x".into(),
            }
            .type_code(),
        ];
        assert_eq!(codes, [3, 2, 4]);
    }
}
