//! Natural keys: the portable identity of a row across instances.

use std::fmt;

/// The field combination that identifies a logical row in any instance.
///
/// Foreign-key components hold ids of the instance being searched, so a key
/// built from a remote row is only meaningful after its foreign keys have
/// been remapped.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NaturalKey {
    /// User by identity key.
    User {
        /// Public identity key.
        identity_key: String,
    },
    /// Basket by owner and name.
    OutputBasket {
        /// Owning user.
        user_id: i64,
        /// Basket name.
        name: String,
    },
    /// Label by owner and text.
    TxLabel {
        /// Owning user.
        user_id: i64,
        /// Label text.
        label: String,
    },
    /// Tag by owner and text.
    OutputTag {
        /// Owning user.
        user_id: i64,
        /// Tag text.
        tag: String,
    },
    /// Certificate by owner, type, certifier and serial number.
    Certificate {
        /// Owning user.
        user_id: i64,
        /// Certificate type.
        cert_type: String,
        /// Certifier public key.
        certifier: String,
        /// Serial number.
        serial_number: String,
    },
    /// Certificate field by certificate and field name.
    CertificateField {
        /// Owning certificate.
        certificate_id: i64,
        /// Field name.
        field_name: String,
    },
    /// Transaction by owner and reference.
    Transaction {
        /// Owning user.
        user_id: i64,
        /// Wallet-assigned reference.
        reference: String,
    },
    /// Output by owner, transaction and index.
    Output {
        /// Owning user.
        user_id: i64,
        /// Creating transaction.
        transaction_id: i64,
        /// Output index.
        vout: u32,
    },
    /// Commission by transaction.
    Commission {
        /// Transaction paying the commission.
        transaction_id: i64,
    },
    /// Output-tag association.
    OutputTagMap {
        /// Tagged output.
        output_id: i64,
        /// Tag.
        output_tag_id: i64,
    },
    /// Transaction-label association.
    TxLabelMap {
        /// Labelled transaction.
        transaction_id: i64,
        /// Label.
        tx_label_id: i64,
    },
    /// Proven transaction by txid.
    ProvenTx {
        /// Transaction hash.
        txid: String,
    },
    /// Proof request by txid.
    ProvenTxReq {
        /// Transaction hash.
        txid: String,
    },
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NaturalKey::User { identity_key } => write!(f, "user({identity_key})"),
            NaturalKey::OutputBasket { user_id, name } => {
                write!(f, "outputBasket({user_id}, {name})")
            }
            NaturalKey::TxLabel { user_id, label } => write!(f, "txLabel({user_id}, {label})"),
            NaturalKey::OutputTag { user_id, tag } => write!(f, "outputTag({user_id}, {tag})"),
            NaturalKey::Certificate {
                user_id,
                cert_type,
                certifier,
                serial_number,
            } => write!(
                f,
                "certificate({user_id}, {cert_type}, {certifier}, {serial_number})"
            ),
            NaturalKey::CertificateField {
                certificate_id,
                field_name,
            } => write!(f, "certificateField({certificate_id}, {field_name})"),
            NaturalKey::Transaction { user_id, reference } => {
                write!(f, "transaction({user_id}, {reference})")
            }
            NaturalKey::Output {
                user_id,
                transaction_id,
                vout,
            } => write!(f, "output({user_id}, {transaction_id}, {vout})"),
            NaturalKey::Commission { transaction_id } => write!(f, "commission({transaction_id})"),
            NaturalKey::OutputTagMap {
                output_id,
                output_tag_id,
            } => write!(f, "outputTagMap({output_id}, {output_tag_id})"),
            NaturalKey::TxLabelMap {
                transaction_id,
                tx_label_id,
            } => write!(f, "txLabelMap({transaction_id}, {tx_label_id})"),
            NaturalKey::ProvenTx { txid } => write!(f, "provenTx({txid})"),
            NaturalKey::ProvenTxReq { txid } => write!(f, "provenTxReq({txid})"),
        }
    }
}

impl NaturalKey {
    /// Kind of row this key identifies.
    #[must_use]
    pub fn kind(&self) -> super::EntityKind {
        use super::EntityKind;
        match self {
            NaturalKey::User { .. } => EntityKind::User,
            NaturalKey::OutputBasket { .. } => EntityKind::OutputBasket,
            NaturalKey::TxLabel { .. } => EntityKind::TxLabel,
            NaturalKey::OutputTag { .. } => EntityKind::OutputTag,
            NaturalKey::Certificate { .. } => EntityKind::Certificate,
            NaturalKey::CertificateField { .. } => EntityKind::CertificateField,
            NaturalKey::Transaction { .. } => EntityKind::Transaction,
            NaturalKey::Output { .. } => EntityKind::Output,
            NaturalKey::Commission { .. } => EntityKind::Commission,
            NaturalKey::OutputTagMap { .. } => EntityKind::OutputTagMap,
            NaturalKey::TxLabelMap { .. } => EntityKind::TxLabelMap,
            NaturalKey::ProvenTx { .. } => EntityKind::ProvenTx,
            NaturalKey::ProvenTxReq { .. } => EntityKind::ProvenTxReq,
        }
    }
}
