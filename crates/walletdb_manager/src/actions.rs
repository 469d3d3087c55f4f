//! Wallet operations that run under a writer lease.
//!
//! These record what the wallet did; signing and broadcasting happen
//! elsewhere.

use crate::auth::AuthId;
use crate::error::ManagerResult;
use crate::manager::WalletStorageManager;
use serde::{Deserialize, Serialize};
use tracing::info;
use walletdb_core::{
    Certificate, CertificateField, Entity, EntityKind, NaturalKey, Output, OutputBasket,
    OutputTag, OutputTagMap, ProvenTx, ProvenTxReq, RowQuery, StorageExt, Transaction,
    TransactionStatus, TxLabel, TxLabelMap, WalletError, WalletResult, WalletStorage,
};

/// An existing output consumed by a new action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateActionInput {
    /// Local id of the spent output.
    pub output_id: i64,
    /// Why it is spent.
    #[serde(default)]
    pub input_description: String,
}

/// An output created by a new action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateActionOutput {
    /// Value in satoshis.
    pub satoshis: i64,
    /// Locking script.
    pub locking_script: Vec<u8>,
    /// Human readable description.
    #[serde(default)]
    pub output_description: String,
    /// Basket that tracks the output; `None` for outputs paid away.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basket: Option<String>,
    /// Tags attached to the output.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Free-form spending instructions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_instructions: Option<String>,
}

/// Arguments of [`WalletStorageManager::create_action`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateActionArgs {
    /// Human readable description.
    pub description: String,
    /// Outputs consumed.
    #[serde(default)]
    pub inputs: Vec<CreateActionInput>,
    /// Outputs created, in output index order.
    #[serde(default)]
    pub outputs: Vec<CreateActionOutput>,
    /// Labels attached to the transaction.
    #[serde(default)]
    pub labels: Vec<String>,
    /// Transaction version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    /// Lock time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_time: Option<u32>,
    /// Serialized input proofs.
    #[serde(default, rename = "inputBEEF", skip_serializing_if = "Option::is_none")]
    pub input_beef: Option<Vec<u8>>,
}

/// Result of [`WalletStorageManager::create_action`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateActionResult {
    /// Reference of the new transaction.
    pub reference: String,
    /// Local id of the new transaction.
    pub transaction_id: i64,
}

/// Arguments of [`WalletStorageManager::process_action`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessActionArgs {
    /// Reference returned by `create_action`.
    pub reference: String,
    /// Hash of the signed transaction.
    pub txid: String,
    /// Signed transaction.
    pub raw_tx: Vec<u8>,
    /// Keep the transaction local instead of queueing it for broadcast.
    #[serde(default)]
    pub no_send: bool,
}

/// Result of [`WalletStorageManager::process_action`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessActionResult {
    /// Local id of the transaction.
    pub transaction_id: i64,
    /// Local id of the proof request for the txid.
    pub proven_tx_req_id: i64,
    /// New status of the transaction.
    pub status: TransactionStatus,
}

/// Result of [`WalletStorageManager::abort_action`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbortActionResult {
    /// Local id of the aborted transaction.
    pub transaction_id: i64,
    /// Outputs made spendable again.
    pub released_outputs: usize,
}

/// An output of an incoming transaction that the wallet takes ownership
/// of.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalizeOutput {
    /// Output index.
    pub vout: u32,
    /// Value in satoshis.
    pub satoshis: i64,
    /// Locking script.
    pub locking_script: Vec<u8>,
    /// Basket that tracks the output.
    pub basket: String,
    /// Tags attached to the output.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Identity key of the sender.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_identity_key: Option<String>,
    /// Key derivation prefix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derivation_prefix: Option<String>,
    /// Key derivation suffix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derivation_suffix: Option<String>,
}

/// Arguments of [`WalletStorageManager::internalize_action`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalizeActionArgs {
    /// Hash of the incoming transaction.
    pub txid: String,
    /// The incoming transaction.
    pub raw_tx: Vec<u8>,
    /// Human readable description.
    pub description: String,
    /// Outputs owned by the wallet.
    pub outputs: Vec<InternalizeOutput>,
    /// Labels attached to the transaction.
    #[serde(default)]
    pub labels: Vec<String>,
}

/// Result of [`WalletStorageManager::internalize_action`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalizeActionResult {
    /// Local id of the recorded transaction.
    pub transaction_id: i64,
    /// Reference assigned to it.
    pub reference: String,
    /// Satoshis received.
    pub satoshis: i64,
}

/// Identifies a certificate to relinquish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelinquishCertificateArgs {
    /// Certificate type.
    #[serde(rename = "type")]
    pub cert_type: String,
    /// Serial number.
    pub serial_number: String,
    /// Certifier public key.
    pub certifier: String,
}

impl WalletStorageManager {
    /// Records a new outgoing transaction with its outputs and labels, and
    /// marks its inputs as spent by it.
    pub async fn create_action(
        &self,
        auth: &AuthId,
        args: CreateActionArgs,
    ) -> ManagerResult<CreateActionResult> {
        self.binding().authorize(auth)?;
        if args.outputs.is_empty() && args.inputs.is_empty() {
            return Err(
                WalletError::invalid_parameter("outputs", "an action needs inputs or outputs").into(),
            );
        }

        let lease = self.acquire_writer().await;
        let storage: &dyn WalletStorage = &*lease;
        let user_id = self.user_id_for_writer(storage).await?;

        let mut spent = Vec::with_capacity(args.inputs.len());
        for input in &args.inputs {
            let output = storage
                .find_entity_by_id::<Output>(input.output_id)
                .await?
                .filter(|o| o.user_id == user_id)
                .ok_or_else(|| WalletError::not_found(EntityKind::Output, input.output_id))?;
            if !output.spendable || output.spent_by.is_some() {
                return Err(WalletError::invalid_parameter(
                    "inputs",
                    format!("output {} is not spendable", output.output_id),
                )
                .into());
            }
            spent.push((output, input.input_description.clone()));
        }

        let spent_sats: i64 = spent.iter().map(|(o, _)| o.satoshis).sum();
        let kept_sats: i64 = args
            .outputs
            .iter()
            .filter(|o| o.basket.is_some())
            .map(|o| o.satoshis)
            .sum();

        let mut tx = Transaction::new(user_id, args.description, kept_sats - spent_sats);
        tx.version = args.version;
        tx.lock_time = args.lock_time;
        tx.input_beef = args.input_beef;
        storage.insert_entity(&mut tx).await?;

        for (vout, requested) in (0u32..).zip(args.outputs) {
            let mut output = Output::new(user_id, tx.transaction_id, vout, requested.satoshis);
            output.locking_script = Some(requested.locking_script);
            output.output_description = requested.output_description;
            output.custom_instructions = requested.custom_instructions;
            // spendable once signed
            output.spendable = false;
            if let Some(name) = &requested.basket {
                output.basket_id = Some(basket_id(storage, user_id, name).await?);
                output.change = name == "default";
            }
            storage.insert_entity(&mut output).await?;
            tag_output(storage, user_id, output.output_id, &requested.tags).await?;
        }

        label_transaction(storage, user_id, tx.transaction_id, &args.labels).await?;

        for (mut output, description) in spent {
            output.spent_by = Some(tx.transaction_id);
            output.spendable = false;
            output.spending_description = Some(description);
            output.touch();
            storage.update_entity(&output).await?;
        }

        info!(reference = %tx.reference, transaction_id = tx.transaction_id, "action created");
        Ok(CreateActionResult {
            reference: tx.reference,
            transaction_id: tx.transaction_id,
        })
    }

    /// Records the signed form of a created action and queues a proof
    /// request for it.
    pub async fn process_action(
        &self,
        auth: &AuthId,
        args: ProcessActionArgs,
    ) -> ManagerResult<ProcessActionResult> {
        self.binding().authorize(auth)?;
        if args.txid.is_empty() {
            return Err(WalletError::invalid_parameter("txid", "must not be empty").into());
        }

        let lease = self.acquire_writer().await;
        let storage: &dyn WalletStorage = &*lease;
        let user_id = self.user_id_for_writer(storage).await?;

        let mut tx = find_action(storage, user_id, &args.reference).await?;
        if !matches!(
            tx.status,
            TransactionStatus::Unsigned | TransactionStatus::Unprocessed
        ) {
            return Err(WalletError::invalid_parameter(
                "reference",
                format!("transaction is {:?}, not awaiting signatures", tx.status),
            )
            .into());
        }

        tx.txid = Some(args.txid.clone());
        tx.raw_tx = Some(args.raw_tx.clone());
        tx.status = if args.no_send {
            TransactionStatus::Nosend
        } else {
            TransactionStatus::Unproven
        };
        tx.touch();
        storage.update_entity(&tx).await?;

        for mut output in outputs_of(storage, user_id, tx.transaction_id).await? {
            output.txid = Some(args.txid.clone());
            output.spendable = output.basket_id.is_some();
            output.touch();
            storage.update_entity(&output).await?;
        }

        let mut req = ProvenTxReq::new(args.txid.as_str(), args.raw_tx);
        req.input_beef.clone_from(&tx.input_beef);
        let (req, _) = storage.find_or_insert_entity(req).await?;

        info!(reference = %tx.reference, txid = %args.txid, "action processed");
        Ok(ProcessActionResult {
            transaction_id: tx.transaction_id,
            proven_tx_req_id: req.proven_tx_req_id,
            status: tx.status,
        })
    }

    /// Abandons an action that has not been broadcast and releases the
    /// outputs it spent.
    pub async fn abort_action(
        &self,
        auth: &AuthId,
        reference: &str,
    ) -> ManagerResult<AbortActionResult> {
        self.binding().authorize(auth)?;
        let lease = self.acquire_writer().await;
        let storage: &dyn WalletStorage = &*lease;
        let user_id = self.user_id_for_writer(storage).await?;

        let mut tx = find_action(storage, user_id, reference).await?;
        if !tx.status.is_abortable() {
            return Err(WalletError::invalid_parameter(
                "reference",
                format!("transaction is {:?} and cannot be aborted", tx.status),
            )
            .into());
        }
        tx.status = TransactionStatus::Failed;
        tx.touch();
        storage.update_entity(&tx).await?;

        let query = RowQuery::new(EntityKind::Output).for_user(user_id);
        let mut released = 0;
        for mut output in storage.find_entities::<Output>(&query).await? {
            if output.spent_by != Some(tx.transaction_id) {
                continue;
            }
            output.spent_by = None;
            output.spendable = true;
            output.spending_description = None;
            output.touch();
            storage.update_entity(&output).await?;
            released += 1;
        }

        info!(reference, released, "action aborted");
        Ok(AbortActionResult {
            transaction_id: tx.transaction_id,
            released_outputs: released,
        })
    }

    /// Records an incoming transaction and takes ownership of the listed
    /// outputs.
    pub async fn internalize_action(
        &self,
        auth: &AuthId,
        args: InternalizeActionArgs,
    ) -> ManagerResult<InternalizeActionResult> {
        self.binding().authorize(auth)?;
        if args.outputs.is_empty() {
            return Err(WalletError::invalid_parameter("outputs", "nothing to internalize").into());
        }

        let lease = self.acquire_writer().await;
        let storage: &dyn WalletStorage = &*lease;
        let user_id = self.user_id_for_writer(storage).await?;

        let query = RowQuery::new(EntityKind::Transaction).for_user(user_id);
        let known = storage
            .find_entities::<Transaction>(&query)
            .await?
            .into_iter()
            .any(|t| t.txid.as_deref() == Some(args.txid.as_str()));
        if known {
            return Err(WalletError::invalid_parameter(
                "txid",
                format!("{} is already internalized", args.txid),
            )
            .into());
        }

        let satoshis = args.outputs.iter().map(|o| o.satoshis).sum();
        let mut tx = Transaction::new(user_id, args.description, satoshis);
        tx.status = TransactionStatus::Completed;
        tx.is_outgoing = false;
        tx.txid = Some(args.txid.clone());
        tx.raw_tx = Some(args.raw_tx);
        let proof = NaturalKey::ProvenTx {
            txid: args.txid.clone(),
        };
        tx.proven_tx_id = storage
            .find_entity::<ProvenTx>(&proof)
            .await?
            .map(|p| p.proven_tx_id);
        storage.insert_entity(&mut tx).await?;

        for requested in args.outputs {
            let mut output =
                Output::new(user_id, tx.transaction_id, requested.vout, requested.satoshis);
            output.txid = Some(args.txid.clone());
            output.locking_script = Some(requested.locking_script);
            output.basket_id = Some(basket_id(storage, user_id, &requested.basket).await?);
            output.sender_identity_key = requested.sender_identity_key;
            output.derivation_prefix = requested.derivation_prefix;
            output.derivation_suffix = requested.derivation_suffix;
            storage.insert_entity(&mut output).await?;
            tag_output(storage, user_id, output.output_id, &requested.tags).await?;
        }
        label_transaction(storage, user_id, tx.transaction_id, &args.labels).await?;

        info!(txid = %args.txid, satoshis, "action internalized");
        Ok(InternalizeActionResult {
            transaction_id: tx.transaction_id,
            reference: tx.reference,
            satoshis,
        })
    }

    /// Stores a certificate and its fields. Returns the certificate id.
    pub async fn insert_certificate(
        &self,
        auth: &AuthId,
        mut certificate: Certificate,
        fields: Vec<CertificateField>,
    ) -> ManagerResult<i64> {
        self.binding().authorize(auth)?;
        let lease = self.acquire_writer().await;
        let storage: &dyn WalletStorage = &*lease;
        let user_id = self.user_id_for_writer(storage).await?;

        certificate.certificate_id = 0;
        certificate.user_id = user_id;
        let certificate_id = storage.insert_entity(&mut certificate).await?;
        for mut field in fields {
            field.certificate_field_id = 0;
            field.user_id = user_id;
            field.certificate_id = certificate_id;
            storage.insert_entity(&mut field).await?;
        }
        Ok(certificate_id)
    }

    /// Soft-deletes a certificate.
    pub async fn relinquish_certificate(
        &self,
        auth: &AuthId,
        args: RelinquishCertificateArgs,
    ) -> ManagerResult<()> {
        self.binding().authorize(auth)?;
        let lease = self.acquire_writer().await;
        let storage: &dyn WalletStorage = &*lease;
        let user_id = self.user_id_for_writer(storage).await?;

        let key = NaturalKey::Certificate {
            user_id,
            cert_type: args.cert_type,
            certifier: args.certifier,
            serial_number: args.serial_number,
        };
        let mut certificate = storage
            .find_entity::<Certificate>(&key)
            .await?
            .filter(|c| !c.is_deleted)
            .ok_or_else(|| WalletError::not_found(EntityKind::Certificate, &key))?;
        certificate.is_deleted = true;
        certificate.touch();
        storage.update_entity(&certificate).await?;
        Ok(())
    }

    /// Removes an output from a basket; the wallet stops tracking it.
    pub async fn relinquish_output(
        &self,
        auth: &AuthId,
        basket: &str,
        output_id: i64,
    ) -> ManagerResult<()> {
        self.binding().authorize(auth)?;
        let lease = self.acquire_writer().await;
        let storage: &dyn WalletStorage = &*lease;
        let user_id = self.user_id_for_writer(storage).await?;

        let key = NaturalKey::OutputBasket {
            user_id,
            name: basket.to_string(),
        };
        let basket = storage
            .find_entity::<OutputBasket>(&key)
            .await?
            .ok_or_else(|| WalletError::not_found(EntityKind::OutputBasket, &key))?;
        let mut output = storage
            .find_entity_by_id::<Output>(output_id)
            .await?
            .filter(|o| o.user_id == user_id && o.basket_id == Some(basket.basket_id))
            .ok_or_else(|| WalletError::not_found(EntityKind::Output, output_id))?;
        output.basket_id = None;
        output.touch();
        storage.update_entity(&output).await?;
        Ok(())
    }
}

async fn find_action(
    storage: &dyn WalletStorage,
    user_id: i64,
    reference: &str,
) -> WalletResult<Transaction> {
    let key = NaturalKey::Transaction {
        user_id,
        reference: reference.to_string(),
    };
    storage
        .find_entity::<Transaction>(&key)
        .await?
        .ok_or_else(|| WalletError::not_found(EntityKind::Transaction, reference))
}

async fn outputs_of(
    storage: &dyn WalletStorage,
    user_id: i64,
    transaction_id: i64,
) -> WalletResult<Vec<Output>> {
    let query = RowQuery::new(EntityKind::Output).for_user(user_id);
    Ok(storage
        .find_entities::<Output>(&query)
        .await?
        .into_iter()
        .filter(|o| o.transaction_id == transaction_id)
        .collect())
}

async fn basket_id(storage: &dyn WalletStorage, user_id: i64, name: &str) -> WalletResult<i64> {
    let (mut basket, _) = storage
        .find_or_insert_entity(OutputBasket::new(user_id, name))
        .await?;
    if basket.is_deleted {
        basket.is_deleted = false;
        basket.touch();
        storage.update_entity(&basket).await?;
    }
    Ok(basket.basket_id)
}

async fn tag_output(
    storage: &dyn WalletStorage,
    user_id: i64,
    output_id: i64,
    tags: &[String],
) -> WalletResult<()> {
    for name in tags {
        let (mut tag, _) = storage
            .find_or_insert_entity(OutputTag::new(user_id, name.as_str()))
            .await?;
        if tag.is_deleted {
            tag.is_deleted = false;
            tag.touch();
            storage.update_entity(&tag).await?;
        }
        let (mut map, _) = storage
            .find_or_insert_entity(OutputTagMap::new(output_id, tag.output_tag_id))
            .await?;
        if map.is_deleted {
            map.is_deleted = false;
            map.touch();
            storage.update_entity(&map).await?;
        }
    }
    Ok(())
}

async fn label_transaction(
    storage: &dyn WalletStorage,
    user_id: i64,
    transaction_id: i64,
    labels: &[String],
) -> WalletResult<()> {
    for name in labels {
        let (mut label, _) = storage
            .find_or_insert_entity(TxLabel::new(user_id, name.as_str()))
            .await?;
        if label.is_deleted {
            label.is_deleted = false;
            label.touch();
            storage.update_entity(&label).await?;
        }
        let (mut map, _) = storage
            .find_or_insert_entity(TxLabelMap::new(transaction_id, label.tx_label_id))
            .await?;
        if map.is_deleted {
            map.is_deleted = false;
            map.touch();
            storage.update_entity(&map).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ManagerConfig;
    use walletdb_core::{ErrorKind, ProvenTxReqStatus};
    use walletdb_testkit::TestStorage;

    const ALICE: &str = "alice";

    async fn setup() -> (WalletStorageManager, TestStorage, AuthId) {
        let active = TestStorage::memory("main").await;
        let manager = WalletStorageManager::new(ALICE, active.dyn_storage(), ManagerConfig::default());
        (manager, active, AuthId::new(ALICE))
    }

    fn pay(satoshis: i64, basket: Option<&str>, tags: &[&str]) -> CreateActionOutput {
        CreateActionOutput {
            satoshis,
            locking_script: vec![0x76, 0xa9],
            output_description: "payment".into(),
            basket: basket.map(str::to_string),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            custom_instructions: None,
        }
    }

    fn receive(vout: u32, satoshis: i64, basket: &str) -> InternalizeOutput {
        InternalizeOutput {
            vout,
            satoshis,
            locking_script: vec![0x76, 0xa9],
            basket: basket.into(),
            tags: Vec::new(),
            sender_identity_key: Some("bob".into()),
            derivation_prefix: None,
            derivation_suffix: None,
        }
    }

    async fn funded(manager: &WalletStorageManager, auth: &AuthId) -> i64 {
        manager
            .internalize_action(
                auth,
                InternalizeActionArgs {
                    txid: "aa".repeat(32),
                    raw_tx: vec![1],
                    description: "funding".into(),
                    outputs: vec![receive(0, 5_000, "default")],
                    labels: vec!["income".into()],
                },
            )
            .await
            .unwrap();
        let outputs = manager.find_outputs(auth, Default::default()).await.unwrap();
        outputs[0].output_id
    }

    #[tokio::test]
    async fn create_action_records_outputs_tags_and_labels() {
        let (manager, active, auth) = setup().await;
        let args = CreateActionArgs {
            description: "rent".into(),
            outputs: vec![pay(1_000, None, &[]), pay(400, Some("default"), &["change"])],
            labels: vec!["rent".into(), "monthly".into()],
            ..Default::default()
        };
        let created = manager.create_action(&auth, args).await.unwrap();

        let tx: Transaction = active
            .find_entity_by_id(created.transaction_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(tx.status, TransactionStatus::Unsigned);
        assert_eq!(tx.reference, created.reference);
        assert!(tx.is_outgoing);
        assert_eq!(tx.satoshis, 400);

        let outputs = outputs_of(active.storage.as_ref(), tx.user_id, tx.transaction_id)
            .await
            .unwrap();
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].vout, 0);
        assert!(outputs[0].basket_id.is_none());
        assert!(outputs[1].basket_id.is_some());
        assert!(outputs.iter().all(|o| !o.spendable));

        let counts = active.counts();
        assert_eq!(counts[&EntityKind::TxLabel], 2);
        assert_eq!(counts[&EntityKind::TxLabelMap], 2);
        assert_eq!(counts[&EntityKind::OutputTagMap], 1);
    }

    #[tokio::test]
    async fn process_action_signs_and_queues_proof_request() {
        let (manager, active, auth) = setup().await;
        let args = CreateActionArgs {
            description: "rent".into(),
            outputs: vec![pay(400, Some("default"), &[])],
            ..Default::default()
        };
        let created = manager.create_action(&auth, args).await.unwrap();

        let processed = manager
            .process_action(
                &auth,
                ProcessActionArgs {
                    reference: created.reference.clone(),
                    txid: "bb".repeat(32),
                    raw_tx: vec![2, 0],
                    no_send: false,
                },
            )
            .await
            .unwrap();
        assert_eq!(processed.status, TransactionStatus::Unproven);

        let req: ProvenTxReq = active
            .find_entity_by_id(processed.proven_tx_req_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(req.status, ProvenTxReqStatus::Unsent);
        assert_eq!(req.txid, "bb".repeat(32));

        let outputs = manager.find_outputs(&auth, Default::default()).await.unwrap();
        assert!(outputs[0].spendable);
        assert_eq!(outputs[0].txid.as_deref(), Some("bb".repeat(32).as_str()));

        // already processed
        let again = manager
            .process_action(
                &auth,
                ProcessActionArgs {
                    reference: created.reference,
                    txid: "bb".repeat(32),
                    raw_tx: vec![2, 0],
                    no_send: false,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(again.kind(), ErrorKind::InvalidParameter);
    }

    #[tokio::test]
    async fn abort_releases_spent_outputs() {
        let (manager, _active, auth) = setup().await;
        let funding = funded(&manager, &auth).await;

        let args = CreateActionArgs {
            description: "spend".into(),
            inputs: vec![CreateActionInput {
                output_id: funding,
                input_description: "fund".into(),
            }],
            outputs: vec![pay(4_000, None, &[])],
            ..Default::default()
        };
        let created = manager.create_action(&auth, args.clone()).await.unwrap();

        // the input is now taken
        let err = manager.create_action(&auth, args).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);

        let aborted = manager.abort_action(&auth, &created.reference).await.unwrap();
        assert_eq!(aborted.released_outputs, 1);

        let funding_output = manager
            .find_outputs(&auth, Default::default())
            .await
            .unwrap()
            .into_iter()
            .find(|o| o.output_id == funding)
            .unwrap();
        assert!(funding_output.spendable);
        assert!(funding_output.spent_by.is_none());

        // failed transactions cannot be aborted twice
        let err = manager.abort_action(&auth, &created.reference).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    }

    #[tokio::test]
    async fn abort_unknown_reference_is_not_found() {
        let (manager, _active, auth) = setup().await;
        let err = manager.abort_action(&auth, "missing").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn internalize_twice_is_rejected() {
        let (manager, _active, auth) = setup().await;
        let args = InternalizeActionArgs {
            txid: "cc".repeat(32),
            raw_tx: vec![1],
            description: "gift".into(),
            outputs: vec![receive(1, 700, "savings")],
            labels: Vec::new(),
        };
        let result = manager.internalize_action(&auth, args.clone()).await.unwrap();
        assert_eq!(result.satoshis, 700);

        let err = manager.internalize_action(&auth, args).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidParameter);
    }

    #[tokio::test]
    async fn certificates_can_be_relinquished() {
        let (manager, _active, auth) = setup().await;
        let certificate = Certificate::new(0, "identity", "serial-9", "certifier", "alice");
        let fields = vec![CertificateField::new(0, 0, "name", "enc:alice")];
        manager
            .insert_certificate(&auth, certificate, fields)
            .await
            .unwrap();

        let args = RelinquishCertificateArgs {
            cert_type: "identity".into(),
            serial_number: "serial-9".into(),
            certifier: "certifier".into(),
        };
        manager
            .relinquish_certificate(&auth, args.clone())
            .await
            .unwrap();
        let listed = manager
            .list_certificates(&auth, Default::default())
            .await
            .unwrap();
        assert!(listed.is_empty());

        let err = manager.relinquish_certificate(&auth, args).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn relinquish_output_leaves_basket() {
        let (manager, _active, auth) = setup().await;
        let funding = funded(&manager, &auth).await;

        let err = manager
            .relinquish_output(&auth, "savings", funding)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        manager
            .relinquish_output(&auth, "default", funding)
            .await
            .unwrap();
        let listed = manager
            .list_outputs(
                &auth,
                crate::queries::ListOutputsArgs {
                    basket: "default".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(listed.total_outputs, 0);
    }

    #[tokio::test]
    async fn writes_require_owner_identity() {
        let (manager, active, _auth) = setup().await;
        let err = manager
            .abort_action(&AuthId::new("mallory"), "anything")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert!(active.find_user(ALICE).await.unwrap().is_none());
    }
}
