//! Configuration for the sync engine.

/// Default budget on the serialized size of one chunk.
pub const DEFAULT_MAX_ROUGH_SIZE: usize = 10_000_000;

/// Default budget on the number of rows in one chunk.
pub const DEFAULT_MAX_ITEMS: usize = 1000;

/// Chunk budgets used when building requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    /// Maximum accumulated serialized size of the rows in a chunk.
    pub max_rough_size: usize,
    /// Maximum number of rows in a chunk.
    pub max_items: usize,
}

impl SyncConfig {
    /// Creates a configuration with the default budgets.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_rough_size: DEFAULT_MAX_ROUGH_SIZE,
            max_items: DEFAULT_MAX_ITEMS,
        }
    }

    /// Sets the size budget.
    #[must_use]
    pub const fn with_max_rough_size(mut self, size: usize) -> Self {
        self.max_rough_size = size;
        self
    }

    /// Sets the row budget.
    #[must_use]
    pub const fn with_max_items(mut self, items: usize) -> Self {
        self.max_items = items;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}
