//! Users and the user-owned naming rows: baskets, labels and tags.

use super::NaturalKey;
use crate::types::{now, Timestamp};
use serde::{Deserialize, Serialize};

/// The wallet owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Local primary key.
    pub user_id: i64,
    /// Creation time.
    #[serde(rename = "created_at")]
    pub created_at: Timestamp,
    /// Last mutation time.
    #[serde(rename = "updated_at")]
    pub updated_at: Timestamp,
    /// Public identity key; the natural key.
    pub identity_key: String,
    /// Storage identity key of the instance the user considers active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_storage: Option<String>,
}

impl User {
    /// Creates a user that has not been inserted yet.
    pub fn new(identity_key: impl Into<String>) -> Self {
        let at = now();
        Self {
            user_id: 0,
            created_at: at,
            updated_at: at,
            identity_key: identity_key.into(),
            active_storage: None,
        }
    }
}

impl_entity!(User, user_id, key: |r: &User| NaturalKey::User {
    identity_key: r.identity_key.clone(),
});

/// A named group of outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputBasket {
    /// Local primary key.
    pub basket_id: i64,
    /// Creation time.
    #[serde(rename = "created_at")]
    pub created_at: Timestamp,
    /// Last mutation time.
    #[serde(rename = "updated_at")]
    pub updated_at: Timestamp,
    /// Owning user.
    pub user_id: i64,
    /// Basket name; identity, never copied on merge.
    pub name: String,
    /// Number of spendable outputs the wallet tries to keep in the basket.
    #[serde(rename = "numberOfDesiredUTXOs")]
    pub number_of_desired_utxos: i64,
    /// Minimum value of each of those outputs.
    #[serde(rename = "minimumDesiredUTXOValue")]
    pub minimum_desired_utxo_value: i64,
    /// Soft-delete flag.
    pub is_deleted: bool,
}

impl OutputBasket {
    /// Creates a basket that has not been inserted yet.
    pub fn new(user_id: i64, name: impl Into<String>) -> Self {
        let at = now();
        Self {
            basket_id: 0,
            created_at: at,
            updated_at: at,
            user_id,
            name: name.into(),
            number_of_desired_utxos: 0,
            minimum_desired_utxo_value: 0,
            is_deleted: false,
        }
    }
}

impl_entity!(OutputBasket, basket_id, user: user_id, key: |r: &OutputBasket| {
    NaturalKey::OutputBasket {
        user_id: r.user_id,
        name: r.name.clone(),
    }
});

/// A tag that can be attached to outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputTag {
    /// Local primary key.
    pub output_tag_id: i64,
    /// Creation time.
    #[serde(rename = "created_at")]
    pub created_at: Timestamp,
    /// Last mutation time.
    #[serde(rename = "updated_at")]
    pub updated_at: Timestamp,
    /// Owning user.
    pub user_id: i64,
    /// Tag text.
    pub tag: String,
    /// Soft-delete flag.
    pub is_deleted: bool,
}

impl OutputTag {
    /// Creates a tag that has not been inserted yet.
    pub fn new(user_id: i64, tag: impl Into<String>) -> Self {
        let at = now();
        Self {
            output_tag_id: 0,
            created_at: at,
            updated_at: at,
            user_id,
            tag: tag.into(),
            is_deleted: false,
        }
    }
}

impl_entity!(OutputTag, output_tag_id, user: user_id, key: |r: &OutputTag| {
    NaturalKey::OutputTag {
        user_id: r.user_id,
        tag: r.tag.clone(),
    }
});

/// A label that can be attached to transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxLabel {
    /// Local primary key.
    pub tx_label_id: i64,
    /// Creation time.
    #[serde(rename = "created_at")]
    pub created_at: Timestamp,
    /// Last mutation time.
    #[serde(rename = "updated_at")]
    pub updated_at: Timestamp,
    /// Owning user.
    pub user_id: i64,
    /// Label text.
    pub label: String,
    /// Soft-delete flag.
    pub is_deleted: bool,
}

impl TxLabel {
    /// Creates a label that has not been inserted yet.
    pub fn new(user_id: i64, label: impl Into<String>) -> Self {
        let at = now();
        Self {
            tx_label_id: 0,
            created_at: at,
            updated_at: at,
            user_id,
            label: label.into(),
            is_deleted: false,
        }
    }
}

impl_entity!(TxLabel, tx_label_id, user: user_id, key: |r: &TxLabel| NaturalKey::TxLabel {
    user_id: r.user_id,
    label: r.label.clone(),
});

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Entity, EntityKind, EntityRow};

    #[test]
    fn basket_natural_key_ignores_id() {
        let mut a = OutputBasket::new(1, "default");
        let mut b = OutputBasket::new(1, "default");
        a.basket_id = 3;
        b.basket_id = 9;
        assert_eq!(a.natural_key(), b.natural_key());
    }

    #[test]
    fn row_round_trip() {
        let label = TxLabel::new(2, "rent");
        let row = label.clone().into_row();
        assert_eq!(row.kind(), EntityKind::TxLabel);
        assert_eq!(TxLabel::from_row(row).unwrap(), label);
        assert!(User::from_row(EntityRow::TxLabel(label)).is_err());
    }

    #[test]
    fn user_serializes_snake_timestamps() {
        let json = serde_json::to_value(User::new("02abc")).unwrap();
        assert!(json.get("created_at").is_some());
        assert!(json.get("identityKey").is_some());
        assert!(json.get("activeStorage").is_none());
    }

    #[test]
    fn touch_never_moves_backwards() {
        let mut tag = OutputTag::new(1, "hot");
        let future = tag.updated_at + chrono::Duration::days(1);
        tag.updated_at = future;
        tag.touch();
        assert_eq!(tag.updated_at, future);
    }
}
