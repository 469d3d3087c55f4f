//! Manager configuration.

use walletdb_sync_engine::SyncConfig;

/// Configuration for the storage manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    /// At most one writer lease at a time; readers also wait while it is
    /// held.
    pub single_writer: bool,
    /// Chunk limits for every sync the manager runs.
    pub sync: SyncConfig,
}

impl ManagerConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self {
            single_writer: true,
            sync: SyncConfig::default(),
        }
    }

    /// Sets the single-writer policy.
    #[must_use]
    pub fn with_single_writer(mut self, single_writer: bool) -> Self {
        self.single_writer = single_writer;
        self
    }

    /// Sets the chunk limits used for syncs.
    #[must_use]
    pub fn with_sync(mut self, sync: SyncConfig) -> Self {
        self.sync = sync;
        self
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ManagerConfig::default();
        assert!(config.single_writer);
        assert_eq!(config.sync, SyncConfig::default());
    }

    #[test]
    fn config_builder() {
        let config = ManagerConfig::new()
            .with_single_writer(false)
            .with_sync(SyncConfig::new().with_max_items(5));

        assert!(!config.single_writer);
        assert_eq!(config.sync.max_items, 5);
    }
}
