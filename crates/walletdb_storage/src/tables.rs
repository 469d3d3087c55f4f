//! Table layout of the in-memory instance.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use walletdb_core::{
    EntityKind, EntityRow, NaturalKey, RowQuery, Settings, SyncState, Transaction, WalletError,
    WalletResult,
};

/// All rows of one instance, keyed by kind then local id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Tables {
    pub settings: Option<Settings>,
    pub rows: BTreeMap<EntityKind, BTreeMap<i64, EntityRow>>,
    pub next_ids: BTreeMap<EntityKind, i64>,
    pub sync_states: BTreeMap<i64, SyncState>,
    pub next_sync_state_id: i64,
}

impl Tables {
    pub fn table(&self, kind: EntityKind) -> impl Iterator<Item = &EntityRow> {
        self.rows.get(&kind).into_iter().flat_map(|t| t.values())
    }

    pub fn get(&self, kind: EntityKind, id: i64) -> Option<&EntityRow> {
        self.rows.get(&kind).and_then(|t| t.get(&id))
    }

    pub fn find_by_key(&self, key: &NaturalKey) -> Option<&EntityRow> {
        self.table(key.kind()).find(|r| &r.natural_key() == key)
    }

    pub fn allocate_id(&mut self, kind: EntityKind) -> i64 {
        let next = self.next_ids.entry(kind).or_insert(0);
        *next += 1;
        *next
    }

    pub fn put(&mut self, row: EntityRow) {
        self.rows.entry(row.kind()).or_default().insert(row.id(), row);
    }

    pub fn len(&self, kind: EntityKind) -> usize {
        self.rows.get(&kind).map_or(0, BTreeMap::len)
    }

    /// Owning user of a row; maps and proven rows resolve through the rows
    /// they reference. Proven rows may be shared, so they yield every owner.
    pub fn owners(&self, row: &EntityRow) -> Vec<i64> {
        if let Some(user_id) = row.user_id() {
            return vec![user_id];
        }
        match row {
            EntityRow::User(u) => vec![u.user_id],
            EntityRow::OutputTagMap(m) => self
                .get(EntityKind::Output, m.output_id)
                .and_then(EntityRow::user_id)
                .into_iter()
                .collect(),
            EntityRow::TxLabelMap(m) => self
                .get(EntityKind::Transaction, m.transaction_id)
                .and_then(EntityRow::user_id)
                .into_iter()
                .collect(),
            EntityRow::ProvenTx(p) => self.transaction_owners(|t| {
                t.proven_tx_id == Some(p.proven_tx_id) || t.txid.as_deref() == Some(&p.txid)
            }),
            EntityRow::ProvenTxReq(r) => {
                self.transaction_owners(|t| t.txid.as_deref() == Some(&r.txid))
            }
            _ => Vec::new(),
        }
    }

    fn transaction_owners(&self, pred: impl Fn(&Transaction) -> bool) -> Vec<i64> {
        let mut owners: Vec<i64> = self
            .table(EntityKind::Transaction)
            .filter_map(|r| match r {
                EntityRow::Transaction(t) if pred(t) => Some(t.user_id),
                _ => None,
            })
            .collect();
        owners.sort_unstable();
        owners.dedup();
        owners
    }

    pub fn select(&self, query: &RowQuery) -> Vec<EntityRow> {
        let matching = self.table(query.kind).filter(|row| {
            (query.include_deleted || !row.is_deleted())
                && query
                    .user_id
                    .map_or(true, |user_id| self.owners(row).contains(&user_id))
        });
        let limit = query.limit.unwrap_or(usize::MAX);
        matching.skip(query.offset).take(limit).cloned().collect()
    }

    /// Verifies that every foreign key of `row` names an existing row.
    pub fn check_references(&self, row: &EntityRow) -> WalletResult<()> {
        let mut refs: Vec<(EntityKind, i64)> = Vec::new();
        if let (Some(user_id), false) = (row.user_id(), row.kind() == EntityKind::User) {
            refs.push((EntityKind::User, user_id));
        }
        match row {
            EntityRow::CertificateField(f) => refs.push((EntityKind::Certificate, f.certificate_id)),
            EntityRow::Transaction(t) => refs.extend(t.proven_tx_id.map(|id| (EntityKind::ProvenTx, id))),
            EntityRow::Output(o) => {
                refs.push((EntityKind::Transaction, o.transaction_id));
                refs.extend(o.basket_id.map(|id| (EntityKind::OutputBasket, id)));
                refs.extend(o.spent_by.map(|id| (EntityKind::Transaction, id)));
            }
            EntityRow::Commission(c) => refs.push((EntityKind::Transaction, c.transaction_id)),
            EntityRow::OutputTagMap(m) => {
                refs.push((EntityKind::Output, m.output_id));
                refs.push((EntityKind::OutputTag, m.output_tag_id));
            }
            EntityRow::TxLabelMap(m) => {
                refs.push((EntityKind::Transaction, m.transaction_id));
                refs.push((EntityKind::TxLabel, m.tx_label_id));
            }
            EntityRow::ProvenTxReq(r) => refs.extend(r.proven_tx_id.map(|id| (EntityKind::ProvenTx, id))),
            _ => {}
        }
        for (kind, id) in refs {
            if self.get(kind, id).is_none() {
                return Err(WalletError::invalid_parameter(
                    row.kind().name(),
                    format!("references missing {kind} {id}"),
                ));
            }
        }
        Ok(())
    }
}
