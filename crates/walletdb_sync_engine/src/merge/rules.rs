//! Typed merge rules for each entity.

use crate::error::{SyncError, SyncResult};
use crate::sync_map::SyncMap;
use walletdb_core::{
    Certificate, CertificateField, Commission, Entity, EntityKind, Output, OutputBasket,
    OutputTag, OutputTagMap, ProvenTx, ProvenTxReq, Transaction, TxLabel, TxLabelMap, User,
};

/// How rows of one entity type are reconciled.
///
/// Natural-key fields are never copied by [`MergeRules::copy_mutable_fields`].
pub trait MergeRules: Entity {
    /// Rewrites foreign keys from remote ids to local ids and takes the
    /// local owner.
    fn remap_foreign_keys(&mut self, maps: &SyncMap, user_id: i64) -> SyncResult<()>;

    /// Compares business fields, ignoring ids, owners and timestamps.
    ///
    /// `other` is a remote row; with `maps` its foreign keys are remapped
    /// before comparison.
    fn business_eq(&self, other: &Self, maps: Option<&SyncMap>) -> SyncResult<bool>;

    /// Copies every mutable business field from `from`.
    fn copy_mutable_fields(&mut self, from: &Self);

    /// Last adjustments before a merge insert.
    fn prepare_insert(&mut self, user_id: i64) -> SyncResult<()>;
}

/// Foreign key of `other` as seen locally.
fn fk(maps: Option<&SyncMap>, kind: EntityKind, id: i64) -> SyncResult<i64> {
    match maps {
        Some(maps) => maps.require(kind, id),
        None => Ok(id),
    }
}

fn opt_fk(maps: Option<&SyncMap>, kind: EntityKind, id: Option<i64>) -> SyncResult<Option<i64>> {
    id.map(|id| fk(maps, kind, id)).transpose()
}

fn remap(maps: &SyncMap, kind: EntityKind, id: &mut i64) -> SyncResult<()> {
    *id = maps.require(kind, *id)?;
    Ok(())
}

fn remap_opt(maps: &SyncMap, kind: EntityKind, id: &mut Option<i64>) -> SyncResult<()> {
    if let Some(remote) = *id {
        *id = Some(maps.require(kind, remote)?);
    }
    Ok(())
}

impl MergeRules for User {
    fn remap_foreign_keys(&mut self, _maps: &SyncMap, _user_id: i64) -> SyncResult<()> {
        Ok(())
    }

    fn business_eq(&self, other: &Self, _maps: Option<&SyncMap>) -> SyncResult<bool> {
        Ok(self.identity_key == other.identity_key && self.active_storage == other.active_storage)
    }

    fn copy_mutable_fields(&mut self, from: &Self) {
        self.active_storage.clone_from(&from.active_storage);
    }

    fn prepare_insert(&mut self, _user_id: i64) -> SyncResult<()> {
        Err(SyncError::UserInsertDuringSync {
            identity_key: self.identity_key.clone(),
        })
    }
}

impl MergeRules for OutputBasket {
    fn remap_foreign_keys(&mut self, _maps: &SyncMap, user_id: i64) -> SyncResult<()> {
        self.user_id = user_id;
        Ok(())
    }

    fn business_eq(&self, other: &Self, _maps: Option<&SyncMap>) -> SyncResult<bool> {
        Ok(self.name == other.name
            && self.number_of_desired_utxos == other.number_of_desired_utxos
            && self.minimum_desired_utxo_value == other.minimum_desired_utxo_value
            && self.is_deleted == other.is_deleted)
    }

    fn copy_mutable_fields(&mut self, from: &Self) {
        self.number_of_desired_utxos = from.number_of_desired_utxos;
        self.minimum_desired_utxo_value = from.minimum_desired_utxo_value;
        self.is_deleted = from.is_deleted;
    }

    fn prepare_insert(&mut self, user_id: i64) -> SyncResult<()> {
        self.user_id = user_id;
        Ok(())
    }
}

impl MergeRules for TxLabel {
    fn remap_foreign_keys(&mut self, _maps: &SyncMap, user_id: i64) -> SyncResult<()> {
        self.user_id = user_id;
        Ok(())
    }

    fn business_eq(&self, other: &Self, _maps: Option<&SyncMap>) -> SyncResult<bool> {
        Ok(self.label == other.label && self.is_deleted == other.is_deleted)
    }

    fn copy_mutable_fields(&mut self, from: &Self) {
        self.is_deleted = from.is_deleted;
    }

    fn prepare_insert(&mut self, user_id: i64) -> SyncResult<()> {
        self.user_id = user_id;
        Ok(())
    }
}

impl MergeRules for OutputTag {
    fn remap_foreign_keys(&mut self, _maps: &SyncMap, user_id: i64) -> SyncResult<()> {
        self.user_id = user_id;
        Ok(())
    }

    fn business_eq(&self, other: &Self, _maps: Option<&SyncMap>) -> SyncResult<bool> {
        Ok(self.tag == other.tag && self.is_deleted == other.is_deleted)
    }

    fn copy_mutable_fields(&mut self, from: &Self) {
        self.is_deleted = from.is_deleted;
    }

    fn prepare_insert(&mut self, user_id: i64) -> SyncResult<()> {
        self.user_id = user_id;
        Ok(())
    }
}

impl MergeRules for Certificate {
    fn remap_foreign_keys(&mut self, _maps: &SyncMap, user_id: i64) -> SyncResult<()> {
        self.user_id = user_id;
        Ok(())
    }

    fn business_eq(&self, other: &Self, _maps: Option<&SyncMap>) -> SyncResult<bool> {
        Ok(self.cert_type == other.cert_type
            && self.serial_number == other.serial_number
            && self.certifier == other.certifier
            && self.subject == other.subject
            && self.verifier == other.verifier
            && self.revocation_outpoint == other.revocation_outpoint
            && self.signature == other.signature
            && self.is_deleted == other.is_deleted)
    }

    fn copy_mutable_fields(&mut self, from: &Self) {
        self.subject.clone_from(&from.subject);
        self.verifier.clone_from(&from.verifier);
        self.revocation_outpoint.clone_from(&from.revocation_outpoint);
        self.signature.clone_from(&from.signature);
        self.is_deleted = from.is_deleted;
    }

    fn prepare_insert(&mut self, user_id: i64) -> SyncResult<()> {
        self.user_id = user_id;
        Ok(())
    }
}

impl MergeRules for CertificateField {
    fn remap_foreign_keys(&mut self, maps: &SyncMap, user_id: i64) -> SyncResult<()> {
        self.user_id = user_id;
        remap(maps, EntityKind::Certificate, &mut self.certificate_id)
    }

    fn business_eq(&self, other: &Self, maps: Option<&SyncMap>) -> SyncResult<bool> {
        Ok(self.certificate_id == fk(maps, EntityKind::Certificate, other.certificate_id)?
            && self.field_name == other.field_name
            && self.field_value == other.field_value
            && self.master_key == other.master_key)
    }

    fn copy_mutable_fields(&mut self, from: &Self) {
        self.field_value.clone_from(&from.field_value);
        self.master_key.clone_from(&from.master_key);
    }

    fn prepare_insert(&mut self, user_id: i64) -> SyncResult<()> {
        self.user_id = user_id;
        Ok(())
    }
}

impl MergeRules for Transaction {
    /// The proven transaction link is optional here; an unknown mapping
    /// leaves it unset until the proven transaction itself is merged.
    fn remap_foreign_keys(&mut self, maps: &SyncMap, user_id: i64) -> SyncResult<()> {
        self.user_id = user_id;
        self.proven_tx_id = self
            .proven_tx_id
            .and_then(|remote| maps.local_id(EntityKind::ProvenTx, remote));
        Ok(())
    }

    fn business_eq(&self, other: &Self, maps: Option<&SyncMap>) -> SyncResult<bool> {
        Ok(self.reference == other.reference
            && self.proven_tx_id == opt_fk(maps, EntityKind::ProvenTx, other.proven_tx_id)?
            && self.status == other.status
            && self.is_outgoing == other.is_outgoing
            && self.satoshis == other.satoshis
            && self.description == other.description
            && self.version == other.version
            && self.lock_time == other.lock_time
            && self.txid == other.txid
            && self.input_beef == other.input_beef
            && self.raw_tx == other.raw_tx)
    }

    fn copy_mutable_fields(&mut self, from: &Self) {
        self.status = from.status;
        self.txid.clone_from(&from.txid);
        self.satoshis = from.satoshis;
        self.description.clone_from(&from.description);
        self.is_outgoing = from.is_outgoing;
        self.version = from.version;
        self.lock_time = from.lock_time;
        self.raw_tx.clone_from(&from.raw_tx);
        self.input_beef.clone_from(&from.input_beef);
        if from.proven_tx_id.is_some() {
            self.proven_tx_id = from.proven_tx_id;
        }
    }

    fn prepare_insert(&mut self, user_id: i64) -> SyncResult<()> {
        self.user_id = user_id;
        Ok(())
    }
}

impl MergeRules for Output {
    fn remap_foreign_keys(&mut self, maps: &SyncMap, user_id: i64) -> SyncResult<()> {
        self.user_id = user_id;
        remap(maps, EntityKind::Transaction, &mut self.transaction_id)?;
        remap_opt(maps, EntityKind::OutputBasket, &mut self.basket_id)?;
        remap_opt(maps, EntityKind::Transaction, &mut self.spent_by)
    }

    fn business_eq(&self, other: &Self, maps: Option<&SyncMap>) -> SyncResult<bool> {
        Ok(self.transaction_id == fk(maps, EntityKind::Transaction, other.transaction_id)?
            && self.vout == other.vout
            && self.basket_id == opt_fk(maps, EntityKind::OutputBasket, other.basket_id)?
            && self.spent_by == opt_fk(maps, EntityKind::Transaction, other.spent_by)?
            && self.spendable == other.spendable
            && self.change == other.change
            && self.output_description == other.output_description
            && self.satoshis == other.satoshis
            && self.provided_by == other.provided_by
            && self.purpose == other.purpose
            && self.output_type == other.output_type
            && self.txid == other.txid
            && self.sender_identity_key == other.sender_identity_key
            && self.derivation_prefix == other.derivation_prefix
            && self.derivation_suffix == other.derivation_suffix
            && self.custom_instructions == other.custom_instructions
            && self.sequence_number == other.sequence_number
            && self.spending_description == other.spending_description
            && self.locking_script == other.locking_script)
    }

    fn copy_mutable_fields(&mut self, from: &Self) {
        self.basket_id = from.basket_id;
        self.spendable = from.spendable;
        self.change = from.change;
        self.output_description.clone_from(&from.output_description);
        self.satoshis = from.satoshis;
        self.provided_by.clone_from(&from.provided_by);
        self.purpose.clone_from(&from.purpose);
        self.output_type.clone_from(&from.output_type);
        self.txid.clone_from(&from.txid);
        self.sender_identity_key.clone_from(&from.sender_identity_key);
        self.derivation_prefix.clone_from(&from.derivation_prefix);
        self.derivation_suffix.clone_from(&from.derivation_suffix);
        self.custom_instructions.clone_from(&from.custom_instructions);
        self.spent_by = from.spent_by;
        self.sequence_number = from.sequence_number;
        self.spending_description.clone_from(&from.spending_description);
        self.locking_script.clone_from(&from.locking_script);
    }

    fn prepare_insert(&mut self, user_id: i64) -> SyncResult<()> {
        self.user_id = user_id;
        Ok(())
    }
}

impl MergeRules for Commission {
    fn remap_foreign_keys(&mut self, maps: &SyncMap, user_id: i64) -> SyncResult<()> {
        self.user_id = user_id;
        remap(maps, EntityKind::Transaction, &mut self.transaction_id)
    }

    fn business_eq(&self, other: &Self, maps: Option<&SyncMap>) -> SyncResult<bool> {
        Ok(self.transaction_id == fk(maps, EntityKind::Transaction, other.transaction_id)?
            && self.satoshis == other.satoshis
            && self.key_offset == other.key_offset
            && self.is_redeemed == other.is_redeemed
            && self.locking_script == other.locking_script)
    }

    fn copy_mutable_fields(&mut self, from: &Self) {
        self.satoshis = from.satoshis;
        self.key_offset.clone_from(&from.key_offset);
        self.is_redeemed = from.is_redeemed;
        self.locking_script.clone_from(&from.locking_script);
    }

    fn prepare_insert(&mut self, user_id: i64) -> SyncResult<()> {
        self.user_id = user_id;
        Ok(())
    }
}

impl MergeRules for OutputTagMap {
    fn remap_foreign_keys(&mut self, maps: &SyncMap, _user_id: i64) -> SyncResult<()> {
        remap(maps, EntityKind::Output, &mut self.output_id)?;
        remap(maps, EntityKind::OutputTag, &mut self.output_tag_id)
    }

    fn business_eq(&self, other: &Self, maps: Option<&SyncMap>) -> SyncResult<bool> {
        Ok(self.output_id == fk(maps, EntityKind::Output, other.output_id)?
            && self.output_tag_id == fk(maps, EntityKind::OutputTag, other.output_tag_id)?
            && self.is_deleted == other.is_deleted)
    }

    fn copy_mutable_fields(&mut self, from: &Self) {
        self.is_deleted = from.is_deleted;
    }

    fn prepare_insert(&mut self, _user_id: i64) -> SyncResult<()> {
        Ok(())
    }
}

impl MergeRules for TxLabelMap {
    fn remap_foreign_keys(&mut self, maps: &SyncMap, _user_id: i64) -> SyncResult<()> {
        remap(maps, EntityKind::Transaction, &mut self.transaction_id)?;
        remap(maps, EntityKind::TxLabel, &mut self.tx_label_id)
    }

    fn business_eq(&self, other: &Self, maps: Option<&SyncMap>) -> SyncResult<bool> {
        Ok(self.transaction_id == fk(maps, EntityKind::Transaction, other.transaction_id)?
            && self.tx_label_id == fk(maps, EntityKind::TxLabel, other.tx_label_id)?
            && self.is_deleted == other.is_deleted)
    }

    fn copy_mutable_fields(&mut self, from: &Self) {
        self.is_deleted = from.is_deleted;
    }

    fn prepare_insert(&mut self, _user_id: i64) -> SyncResult<()> {
        Ok(())
    }
}

impl MergeRules for ProvenTx {
    fn remap_foreign_keys(&mut self, _maps: &SyncMap, _user_id: i64) -> SyncResult<()> {
        Ok(())
    }

    fn business_eq(&self, other: &Self, _maps: Option<&SyncMap>) -> SyncResult<bool> {
        Ok(self.txid == other.txid
            && self.height == other.height
            && self.index == other.index
            && self.merkle_path == other.merkle_path
            && self.raw_tx == other.raw_tx
            && self.block_hash == other.block_hash
            && self.merkle_root == other.merkle_root)
    }

    fn copy_mutable_fields(&mut self, from: &Self) {
        self.height = from.height;
        self.index = from.index;
        self.merkle_path.clone_from(&from.merkle_path);
        self.raw_tx.clone_from(&from.raw_tx);
        self.block_hash.clone_from(&from.block_hash);
        self.merkle_root.clone_from(&from.merkle_root);
    }

    fn prepare_insert(&mut self, _user_id: i64) -> SyncResult<()> {
        Ok(())
    }
}

impl MergeRules for ProvenTxReq {
    fn remap_foreign_keys(&mut self, maps: &SyncMap, _user_id: i64) -> SyncResult<()> {
        remap_opt(maps, EntityKind::ProvenTx, &mut self.proven_tx_id)
    }

    fn business_eq(&self, other: &Self, maps: Option<&SyncMap>) -> SyncResult<bool> {
        Ok(self.txid == other.txid
            && self.proven_tx_id == opt_fk(maps, EntityKind::ProvenTx, other.proven_tx_id)?
            && self.status == other.status
            && self.attempts == other.attempts
            && self.notified == other.notified
            && self.batch == other.batch
            && self.history == other.history
            && self.notify == other.notify
            && self.raw_tx == other.raw_tx
            && self.input_beef == other.input_beef)
    }

    fn copy_mutable_fields(&mut self, from: &Self) {
        self.status = from.status;
        self.attempts = from.attempts;
        self.notified = from.notified;
        self.batch.clone_from(&from.batch);
        self.history.clone_from(&from.history);
        self.notify.clone_from(&from.notify);
        self.raw_tx.clone_from(&from.raw_tx);
        self.input_beef.clone_from(&from.input_beef);
        self.proven_tx_id = from.proven_tx_id;
    }

    fn prepare_insert(&mut self, _user_id: i64) -> SyncResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_remap_uses_local_ids() {
        let mut maps = SyncMap::new();
        maps.merge_id_map(EntityKind::Transaction, 5, 1).unwrap();
        maps.merge_id_map(EntityKind::OutputBasket, 7, 2).unwrap();

        let mut output = Output::new(99, 5, 0, 1000);
        output.basket_id = Some(7);
        output.remap_foreign_keys(&maps, 3).unwrap();
        assert_eq!(output.user_id, 3);
        assert_eq!(output.transaction_id, 1);
        assert_eq!(output.basket_id, Some(2));
    }

    #[test]
    fn missing_required_mapping_fails() {
        let maps = SyncMap::new();
        let mut output = Output::new(99, 5, 0, 1000);
        let err = output.remap_foreign_keys(&maps, 3).unwrap_err();
        assert!(matches!(
            err,
            SyncError::MissingIdMapping { kind: EntityKind::Transaction, remote_id: 5 }
        ));
    }

    #[test]
    fn transaction_proven_link_is_optional() {
        let maps = SyncMap::new();
        let mut tx = Transaction::new(99, "pay", 10);
        tx.proven_tx_id = Some(4);
        tx.remap_foreign_keys(&maps, 3).unwrap();
        assert_eq!(tx.proven_tx_id, None);
    }

    #[test]
    fn copy_never_touches_natural_key() {
        let mut local = OutputBasket::new(1, "default");
        let mut incoming = OutputBasket::new(1, "renamed");
        incoming.number_of_desired_utxos = 12;
        incoming.is_deleted = true;
        local.copy_mutable_fields(&incoming);
        assert_eq!(local.name, "default");
        assert_eq!(local.number_of_desired_utxos, 12);
        assert!(local.is_deleted);
    }

    #[test]
    fn transaction_copy_keeps_known_proof_link() {
        let mut local = Transaction::new(1, "pay", 10);
        local.proven_tx_id = Some(8);
        let mut incoming = local.clone();
        incoming.proven_tx_id = None;
        incoming.description = "paid".into();
        local.copy_mutable_fields(&incoming);
        assert_eq!(local.proven_tx_id, Some(8));
        assert_eq!(local.description, "paid");
    }

    #[test]
    fn business_eq_remaps_other_side() {
        let mut maps = SyncMap::new();
        maps.merge_id_map(EntityKind::Transaction, 5, 1).unwrap();
        maps.merge_id_map(EntityKind::TxLabel, 6, 2).unwrap();

        let local = TxLabelMap::new(1, 2);
        let remote = TxLabelMap::new(5, 6);
        assert!(local.business_eq(&remote, Some(&maps)).unwrap());
        assert!(!local.business_eq(&remote, None).unwrap());
    }

    #[test]
    fn user_insert_is_refused() {
        let mut user = User::new("02ab");
        let err = user.prepare_insert(1).unwrap_err();
        assert!(matches!(err, SyncError::UserInsertDuringSync { .. }));
    }
}
