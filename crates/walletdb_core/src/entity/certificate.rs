//! Identity certificates and their fields.

use super::NaturalKey;
use crate::types::{now, Timestamp};
use serde::{Deserialize, Serialize};

/// An identity certificate held by the wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    /// Local primary key.
    pub certificate_id: i64,
    /// Creation time.
    #[serde(rename = "created_at")]
    pub created_at: Timestamp,
    /// Last mutation time.
    #[serde(rename = "updated_at")]
    pub updated_at: Timestamp,
    /// Owning user.
    pub user_id: i64,
    /// Certificate type.
    #[serde(rename = "type")]
    pub cert_type: String,
    /// Serial number assigned by the certifier.
    pub serial_number: String,
    /// Certifier public key.
    pub certifier: String,
    /// Subject public key.
    pub subject: String,
    /// Verifier public key, when the certificate was issued for one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verifier: Option<String>,
    /// Outpoint whose spend revokes the certificate.
    pub revocation_outpoint: String,
    /// Certifier signature.
    pub signature: String,
    /// Soft-delete flag.
    pub is_deleted: bool,
}

impl Certificate {
    /// Creates a certificate that has not been inserted yet.
    pub fn new(
        user_id: i64,
        cert_type: impl Into<String>,
        serial_number: impl Into<String>,
        certifier: impl Into<String>,
        subject: impl Into<String>,
    ) -> Self {
        let at = now();
        Self {
            certificate_id: 0,
            created_at: at,
            updated_at: at,
            user_id,
            cert_type: cert_type.into(),
            serial_number: serial_number.into(),
            certifier: certifier.into(),
            subject: subject.into(),
            verifier: None,
            revocation_outpoint: String::new(),
            signature: String::new(),
            is_deleted: false,
        }
    }
}

impl_entity!(Certificate, certificate_id, user: user_id, key: |r: &Certificate| {
    NaturalKey::Certificate {
        user_id: r.user_id,
        cert_type: r.cert_type.clone(),
        certifier: r.certifier.clone(),
        serial_number: r.serial_number.clone(),
    }
});

/// One encrypted field of a certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateField {
    /// Local primary key.
    pub certificate_field_id: i64,
    /// Creation time.
    #[serde(rename = "created_at")]
    pub created_at: Timestamp,
    /// Last mutation time.
    #[serde(rename = "updated_at")]
    pub updated_at: Timestamp,
    /// Owning user.
    pub user_id: i64,
    /// Owning certificate.
    pub certificate_id: i64,
    /// Field name.
    pub field_name: String,
    /// Encrypted field value.
    pub field_value: String,
    /// Encrypted field master key.
    pub master_key: String,
}

impl CertificateField {
    /// Creates a field that has not been inserted yet.
    pub fn new(
        user_id: i64,
        certificate_id: i64,
        field_name: impl Into<String>,
        field_value: impl Into<String>,
    ) -> Self {
        let at = now();
        Self {
            certificate_field_id: 0,
            created_at: at,
            updated_at: at,
            user_id,
            certificate_id,
            field_name: field_name.into(),
            field_value: field_value.into(),
            master_key: String::new(),
        }
    }
}

impl_entity!(CertificateField, certificate_field_id, user: user_id, key: |r: &CertificateField| {
    NaturalKey::CertificateField {
        certificate_id: r.certificate_id,
        field_name: r.field_name.clone(),
    }
});
