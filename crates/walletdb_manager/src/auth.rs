//! Caller identity checks.
//!
//! A manager is bound to one identity key. Every derived operation carries
//! an [`AuthId`]; a different identity key is rejected before any lease is
//! taken. The user's local id in the active instance is resolved once and
//! cached until the active instance changes.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use walletdb_core::{WalletError, WalletResult};

/// Identity a caller acts as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthId {
    /// Public identity key of the wallet owner.
    pub identity_key: String,
    /// Local user id, once resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
}

impl AuthId {
    /// Creates an unresolved identity.
    pub fn new(identity_key: impl Into<String>) -> Self {
        Self {
            identity_key: identity_key.into(),
            user_id: None,
        }
    }
}

/// Identity binding plus the cached user id.
#[derive(Debug)]
pub(crate) struct UserBinding {
    identity_key: String,
    user_id: Mutex<Option<i64>>,
}

impl UserBinding {
    pub fn new(identity_key: impl Into<String>) -> Self {
        Self {
            identity_key: identity_key.into(),
            user_id: Mutex::new(None),
        }
    }

    pub fn identity_key(&self) -> &str {
        &self.identity_key
    }

    /// Rejects callers acting as someone else.
    pub fn authorize(&self, auth: &AuthId) -> WalletResult<()> {
        if auth.identity_key != self.identity_key {
            return Err(WalletError::unauthorized(format!(
                "identity {} does not own this wallet",
                auth.identity_key
            )));
        }
        if let (Some(claimed), Some(cached)) = (auth.user_id, self.cached()) {
            if claimed != cached {
                return Err(WalletError::unauthorized(format!(
                    "user id {claimed} does not match {cached}"
                )));
            }
        }
        Ok(())
    }

    pub fn cached(&self) -> Option<i64> {
        *self.user_id.lock()
    }

    /// Records the id the active instance reported for the bound identity.
    ///
    /// A different id for the same identity means the active instance
    /// changed underneath the cache.
    pub fn remember(&self, user_id: i64) -> WalletResult<i64> {
        let mut cached = self.user_id.lock();
        match *cached {
            Some(existing) if existing != user_id => Err(WalletError::internal(format!(
                "user id for {} changed from {existing} to {user_id}",
                self.identity_key
            ))),
            _ => {
                *cached = Some(user_id);
                Ok(user_id)
            }
        }
    }

    pub fn reset(&self) {
        *self.user_id.lock() = None;
    }
}
