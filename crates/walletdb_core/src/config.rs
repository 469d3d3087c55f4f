//! Storage instance configuration.

use crate::types::Chain;

/// Default cap on stored locking script length, in bytes.
pub const DEFAULT_MAX_OUTPUT_SCRIPT: u32 = 10_000;

/// Configuration used when a storage instance is first migrated.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Human readable name of the instance.
    pub storage_name: String,

    /// Identity key of the instance. A random one is generated when unset.
    pub storage_identity_key: Option<String>,

    /// Chain the instance holds data for.
    pub chain: Chain,

    /// Longest locking script stored inline.
    pub max_output_script: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_name: "walletdb".to_string(),
            storage_identity_key: None,
            chain: Chain::Test,
            max_output_script: DEFAULT_MAX_OUTPUT_SCRIPT,
        }
    }
}

impl StorageConfig {
    /// Creates a configuration with the given instance name.
    #[must_use]
    pub fn new(storage_name: impl Into<String>) -> Self {
        Self {
            storage_name: storage_name.into(),
            ..Self::default()
        }
    }

    /// Sets the instance identity key.
    #[must_use]
    pub fn storage_identity_key(mut self, key: impl Into<String>) -> Self {
        self.storage_identity_key = Some(key.into());
        self
    }

    /// Sets the chain.
    #[must_use]
    pub const fn chain(mut self, chain: Chain) -> Self {
        self.chain = chain;
        self
    }

    /// Sets the longest locking script stored inline.
    #[must_use]
    pub const fn max_output_script(mut self, len: u32) -> Self {
        self.max_output_script = len;
        self
    }
}
