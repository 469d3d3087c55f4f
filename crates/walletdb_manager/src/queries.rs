//! Wallet queries that run under a reader lease.
//!
//! Soft-deleted rows are never returned. A wallet whose owner has no user
//! row yet simply has nothing to list.

use crate::auth::AuthId;
use crate::error::ManagerResult;
use crate::manager::WalletStorageManager;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use walletdb_core::{
    Certificate, CertificateField, Entity, NaturalKey, Output, OutputBasket, OutputTag,
    OutputTagMap, RowQuery, StorageExt, Transaction, TxLabel, TxLabelMap, WalletResult,
    WalletStorage,
};

/// Default page size.
pub const DEFAULT_LIMIT: usize = 10;

/// How a list of labels or tags filters rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    /// Rows carrying at least one of them.
    #[default]
    Any,
    /// Rows carrying every one of them.
    All,
}

impl QueryMode {
    fn matches(self, wanted: &BTreeSet<i64>, present: Option<&BTreeSet<i64>>) -> bool {
        if wanted.is_empty() {
            return true;
        }
        let Some(present) = present else {
            return false;
        };
        match self {
            QueryMode::Any => !wanted.is_disjoint(present),
            QueryMode::All => wanted.is_subset(present),
        }
    }
}

/// A page of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paging {
    /// Rows to skip.
    pub offset: usize,
    /// Rows to return.
    pub limit: usize,
}

impl Paging {
    /// Creates a page.
    pub fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }

    fn apply<T>(self, rows: Vec<T>) -> Vec<T> {
        rows.into_iter().skip(self.offset).take(self.limit).collect()
    }
}

impl Default for Paging {
    fn default() -> Self {
        Self::new(0, DEFAULT_LIMIT)
    }
}

/// Arguments of [`WalletStorageManager::list_actions`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListActionsArgs {
    /// Label filter; empty lists every action.
    #[serde(default)]
    pub labels: Vec<String>,
    /// How `labels` combine.
    #[serde(default)]
    pub label_query_mode: QueryMode,
    /// Page to return.
    #[serde(default)]
    pub paging: Paging,
}

/// A transaction with its labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletAction {
    /// The transaction.
    pub transaction: Transaction,
    /// Its labels.
    pub labels: Vec<String>,
}

/// Result of [`WalletStorageManager::list_actions`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListActionsResult {
    /// Matching actions before paging.
    pub total_actions: usize,
    /// The requested page.
    pub actions: Vec<WalletAction>,
}

/// Arguments of [`WalletStorageManager::list_outputs`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOutputsArgs {
    /// Basket to list.
    pub basket: String,
    /// Tag filter; empty lists the whole basket.
    #[serde(default)]
    pub tags: Vec<String>,
    /// How `tags` combine.
    #[serde(default)]
    pub tag_query_mode: QueryMode,
    /// Page to return.
    #[serde(default)]
    pub paging: Paging,
}

/// An output with its tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletOutput {
    /// The output.
    pub output: Output,
    /// Its tags.
    pub tags: Vec<String>,
}

/// Result of [`WalletStorageManager::list_outputs`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOutputsResult {
    /// Matching outputs before paging.
    pub total_outputs: usize,
    /// The requested page.
    pub outputs: Vec<WalletOutput>,
}

/// Arguments of [`WalletStorageManager::list_certificates`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListCertificatesArgs {
    /// Certifier filter; empty matches any.
    #[serde(default)]
    pub certifiers: Vec<String>,
    /// Type filter; empty matches any.
    #[serde(default)]
    pub types: Vec<String>,
}

/// A certificate with its fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateWithFields {
    /// The certificate.
    pub certificate: Certificate,
    /// Its fields.
    pub fields: Vec<CertificateField>,
}

/// Partial match on certificates; unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindCertificatesArgs {
    /// Certificate type.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub cert_type: Option<String>,
    /// Certifier public key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certifier: Option<String>,
    /// Serial number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    /// Subject public key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl FindCertificatesArgs {
    fn matches(&self, c: &Certificate) -> bool {
        self.cert_type.as_ref().map_or(true, |v| *v == c.cert_type)
            && self.certifier.as_ref().map_or(true, |v| *v == c.certifier)
            && self.serial_number.as_ref().map_or(true, |v| *v == c.serial_number)
            && self.subject.as_ref().map_or(true, |v| *v == c.subject)
    }
}

/// Partial match on outputs; unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindOutputsArgs {
    /// Basket.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basket_id: Option<i64>,
    /// Creating transaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<i64>,
    /// Hash of the creating transaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub txid: Option<String>,
    /// Spendable flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spendable: Option<bool>,
}

impl FindOutputsArgs {
    fn matches(&self, o: &Output) -> bool {
        self.basket_id.map_or(true, |v| o.basket_id == Some(v))
            && self.transaction_id.map_or(true, |v| o.transaction_id == v)
            && self.txid.as_ref().map_or(true, |v| o.txid.as_ref() == Some(v))
            && self.spendable.map_or(true, |v| o.spendable == v)
    }
}

impl WalletStorageManager {
    /// Lists the owner's transactions, optionally filtered by label.
    pub async fn list_actions(
        &self,
        auth: &AuthId,
        args: ListActionsArgs,
    ) -> ManagerResult<ListActionsResult> {
        self.binding().authorize(auth)?;
        let lease = self.acquire_reader().await;
        let storage: &dyn WalletStorage = &*lease;
        let Some(user_id) = self.user_id_for_reader(storage).await? else {
            return Ok(ListActionsResult::default());
        };

        let label_names: BTreeMap<i64, String> = live::<TxLabel>(storage, user_id)
            .await?
            .into_iter()
            .map(|l| (l.tx_label_id, l.label))
            .collect();
        let Some(wanted) = resolve_names(&label_names, &args.labels, args.label_query_mode) else {
            return Ok(ListActionsResult::default());
        };

        let mut by_tx: BTreeMap<i64, BTreeSet<i64>> = BTreeMap::new();
        for map in live::<TxLabelMap>(storage, user_id).await? {
            if label_names.contains_key(&map.tx_label_id) {
                by_tx
                    .entry(map.transaction_id)
                    .or_default()
                    .insert(map.tx_label_id);
            }
        }

        let matching: Vec<Transaction> = live::<Transaction>(storage, user_id)
            .await?
            .into_iter()
            .filter(|t| {
                args.label_query_mode
                    .matches(&wanted, by_tx.get(&t.transaction_id))
            })
            .collect();
        let total_actions = matching.len();
        let actions = args
            .paging
            .apply(matching)
            .into_iter()
            .map(|transaction| {
                let labels = by_tx
                    .get(&transaction.transaction_id)
                    .into_iter()
                    .flatten()
                    .filter_map(|id| label_names.get(id).cloned())
                    .collect();
                WalletAction {
                    transaction,
                    labels,
                }
            })
            .collect();
        Ok(ListActionsResult {
            total_actions,
            actions,
        })
    }

    /// Lists the spendable outputs of a basket, optionally filtered by tag.
    pub async fn list_outputs(
        &self,
        auth: &AuthId,
        args: ListOutputsArgs,
    ) -> ManagerResult<ListOutputsResult> {
        self.binding().authorize(auth)?;
        let lease = self.acquire_reader().await;
        let storage: &dyn WalletStorage = &*lease;
        let Some(user_id) = self.user_id_for_reader(storage).await? else {
            return Ok(ListOutputsResult::default());
        };

        let key = NaturalKey::OutputBasket {
            user_id,
            name: args.basket.clone(),
        };
        let Some(basket) = storage
            .find_entity::<OutputBasket>(&key)
            .await?
            .filter(|b| !b.is_deleted)
        else {
            return Ok(ListOutputsResult::default());
        };

        let tag_names: BTreeMap<i64, String> = live::<OutputTag>(storage, user_id)
            .await?
            .into_iter()
            .map(|t| (t.output_tag_id, t.tag))
            .collect();
        let Some(wanted) = resolve_names(&tag_names, &args.tags, args.tag_query_mode) else {
            return Ok(ListOutputsResult::default());
        };

        let mut by_output: BTreeMap<i64, BTreeSet<i64>> = BTreeMap::new();
        for map in live::<OutputTagMap>(storage, user_id).await? {
            if tag_names.contains_key(&map.output_tag_id) {
                by_output
                    .entry(map.output_id)
                    .or_default()
                    .insert(map.output_tag_id);
            }
        }

        let matching: Vec<Output> = live::<Output>(storage, user_id)
            .await?
            .into_iter()
            .filter(|o| o.basket_id == Some(basket.basket_id))
            .filter(|o| o.spendable && o.spent_by.is_none())
            .filter(|o| {
                args.tag_query_mode
                    .matches(&wanted, by_output.get(&o.output_id))
            })
            .collect();
        let total_outputs = matching.len();
        let outputs = args
            .paging
            .apply(matching)
            .into_iter()
            .map(|output| {
                let tags = by_output
                    .get(&output.output_id)
                    .into_iter()
                    .flatten()
                    .filter_map(|id| tag_names.get(id).cloned())
                    .collect();
                WalletOutput { output, tags }
            })
            .collect();
        Ok(ListOutputsResult {
            total_outputs,
            outputs,
        })
    }

    /// Lists certificates with their fields.
    pub async fn list_certificates(
        &self,
        auth: &AuthId,
        args: ListCertificatesArgs,
    ) -> ManagerResult<Vec<CertificateWithFields>> {
        self.binding().authorize(auth)?;
        let lease = self.acquire_reader().await;
        let storage: &dyn WalletStorage = &*lease;
        let Some(user_id) = self.user_id_for_reader(storage).await? else {
            return Ok(Vec::new());
        };

        let mut fields: BTreeMap<i64, Vec<CertificateField>> = BTreeMap::new();
        for field in live::<CertificateField>(storage, user_id).await? {
            fields.entry(field.certificate_id).or_default().push(field);
        }

        Ok(live::<Certificate>(storage, user_id)
            .await?
            .into_iter()
            .filter(|c| args.certifiers.is_empty() || args.certifiers.contains(&c.certifier))
            .filter(|c| args.types.is_empty() || args.types.contains(&c.cert_type))
            .map(|certificate| CertificateWithFields {
                fields: fields.remove(&certificate.certificate_id).unwrap_or_default(),
                certificate,
            })
            .collect())
    }

    /// Returns the certificates matching every set field of `args`.
    pub async fn find_certificates(
        &self,
        auth: &AuthId,
        args: FindCertificatesArgs,
    ) -> ManagerResult<Vec<Certificate>> {
        self.binding().authorize(auth)?;
        let lease = self.acquire_reader().await;
        let storage: &dyn WalletStorage = &*lease;
        let Some(user_id) = self.user_id_for_reader(storage).await? else {
            return Ok(Vec::new());
        };
        Ok(live::<Certificate>(storage, user_id)
            .await?
            .into_iter()
            .filter(|c| args.matches(c))
            .collect())
    }

    /// Returns the outputs matching every set field of `args`.
    pub async fn find_outputs(
        &self,
        auth: &AuthId,
        args: FindOutputsArgs,
    ) -> ManagerResult<Vec<Output>> {
        self.binding().authorize(auth)?;
        let lease = self.acquire_reader().await;
        let storage: &dyn WalletStorage = &*lease;
        let Some(user_id) = self.user_id_for_reader(storage).await? else {
            return Ok(Vec::new());
        };
        Ok(live::<Output>(storage, user_id)
            .await?
            .into_iter()
            .filter(|o| args.matches(o))
            .collect())
    }

    /// Returns the owner's baskets, or only the one called `name`.
    pub async fn find_output_baskets(
        &self,
        auth: &AuthId,
        name: Option<&str>,
    ) -> ManagerResult<Vec<OutputBasket>> {
        self.binding().authorize(auth)?;
        let lease = self.acquire_reader().await;
        let storage: &dyn WalletStorage = &*lease;
        let Some(user_id) = self.user_id_for_reader(storage).await? else {
            return Ok(Vec::new());
        };
        Ok(live::<OutputBasket>(storage, user_id)
            .await?
            .into_iter()
            .filter(|b| name.map_or(true, |n| b.name == n))
            .collect())
    }
}

/// Every live row of `T` owned by `user_id`.
async fn live<T: Entity>(
    storage: &dyn WalletStorage,
    user_id: i64,
) -> WalletResult<Vec<T>> {
    let query = RowQuery::new(T::KIND).for_user(user_id);
    storage.find_entities::<T>(&query).await
}

/// Ids of the requested names. `None` when the filter can never match.
fn resolve_names(
    known: &BTreeMap<i64, String>,
    wanted: &[String],
    mode: QueryMode,
) -> Option<BTreeSet<i64>> {
    let ids: BTreeSet<i64> = known
        .iter()
        .filter(|(_, name)| wanted.contains(name))
        .map(|(&id, _)| id)
        .collect();
    let missing = wanted.iter().any(|w| !known.values().any(|n| n == w));
    match mode {
        QueryMode::All if missing => None,
        QueryMode::Any if !wanted.is_empty() && ids.is_empty() => None,
        _ => Some(ids),
    }
}
