//! Entity record model.
//!
//! Every row carries `created_at`/`updated_at` and an integer primary key
//! that is only unique inside the instance that assigned it. Identity across
//! instances is established by [`NaturalKey`] alone.

/// Implements the boilerplate parts of [`Entity`] for a record type.
macro_rules! impl_entity {
    ($ty:ident, $id:ident, user: $user:ident, key: $key:expr) => {
        impl_entity!(@impl $ty, $id, |r: &$ty| Some(r.$user), $key);
    };
    ($ty:ident, $id:ident, key: $key:expr) => {
        impl_entity!(@impl $ty, $id, |_: &$ty| None, $key);
    };
    (@impl $ty:ident, $id:ident, $user:expr, $key:expr) => {
        impl $crate::entity::Entity for $ty {
            const KIND: $crate::entity::EntityKind = $crate::entity::EntityKind::$ty;

            fn id(&self) -> i64 {
                self.$id
            }

            fn set_id(&mut self, id: i64) {
                self.$id = id;
            }

            fn user_id(&self) -> Option<i64> {
                let f: fn(&$ty) -> Option<i64> = $user;
                f(self)
            }

            fn created_at(&self) -> $crate::types::Timestamp {
                self.created_at
            }

            fn updated_at(&self) -> $crate::types::Timestamp {
                self.updated_at
            }

            fn set_updated_at(&mut self, at: $crate::types::Timestamp) {
                self.updated_at = at;
            }

            fn natural_key(&self) -> $crate::entity::NaturalKey {
                let f: fn(&$ty) -> $crate::entity::NaturalKey = $key;
                f(self)
            }

            fn into_row(self) -> $crate::entity::EntityRow {
                $crate::entity::EntityRow::$ty(self)
            }

            fn from_row(row: $crate::entity::EntityRow) -> $crate::error::WalletResult<Self> {
                match row {
                    $crate::entity::EntityRow::$ty(r) => Ok(r),
                    other => Err($crate::error::WalletError::internal(format!(
                        "expected {} row, got {}",
                        $crate::entity::EntityKind::$ty,
                        other.kind()
                    ))),
                }
            }
        }
    };
}

mod certificate;
mod key;
mod kind;
mod maps;
mod proven;
mod row;
mod sync_state;
mod transaction;
mod user;

pub use certificate::{Certificate, CertificateField};
pub use key::NaturalKey;
pub use kind::EntityKind;
pub use maps::{OutputTagMap, TxLabelMap};
pub use proven::{ProvenTx, ProvenTxReq};
pub use row::EntityRow;
pub use sync_state::SyncState;
pub use transaction::{Commission, Output, Transaction};
pub use user::{OutputBasket, OutputTag, TxLabel, User};

use crate::error::WalletResult;
use crate::types::{now, Timestamp};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;

/// Behaviour shared by every synchronized row type.
pub trait Entity:
    Clone + fmt::Debug + PartialEq + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// The kind of this row type.
    const KIND: EntityKind;

    /// Local primary key (0 until inserted).
    fn id(&self) -> i64;

    /// Sets the local primary key.
    fn set_id(&mut self, id: i64);

    /// Owning user, for user-scoped kinds.
    fn user_id(&self) -> Option<i64>;

    /// Creation time.
    fn created_at(&self) -> Timestamp;

    /// Last mutation time.
    fn updated_at(&self) -> Timestamp;

    /// Sets the last mutation time.
    fn set_updated_at(&mut self, at: Timestamp);

    /// Portable identity of the row.
    fn natural_key(&self) -> NaturalKey;

    /// Wraps the row in an [`EntityRow`].
    fn into_row(self) -> EntityRow;

    /// Unwraps an [`EntityRow`] of this kind.
    fn from_row(row: EntityRow) -> WalletResult<Self>;

    /// Advances `updated_at` for a local mutation.
    fn touch(&mut self) {
        let at = now().max(self.updated_at());
        self.set_updated_at(at);
    }
}
