//! RAM key-value store
//!
//! Values live only as long as the store; used by the simulator and on
//! boards without a spare flash region.

use heapless::{LinearMap, Vec};
use thrustbench_core::traits::{KeyValueStore, StorageKey, StoreError};

/// Largest value the store holds
pub const MAX_VALUE_LEN: usize = 256;

/// Number of distinct keys
const KEY_SLOTS: usize = 1;

/// Fixed-capacity in-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: LinearMap<StorageKey, Vec<u8, MAX_VALUE_LEN>, KEY_SLOTS>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a value is stored under `key`
    pub fn contains(&self, key: StorageKey) -> bool {
        self.values.contains_key(&key)
    }

    /// Forget everything
    pub fn clear(&mut self) {
        self.values.clear();
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&mut self, key: StorageKey, buffer: &mut [u8]) -> Result<Option<usize>, StoreError> {
        let Some(value) = self.values.get(&key) else {
            return Ok(None);
        };
        let target = buffer
            .get_mut(..value.len())
            .ok_or(StoreError::BufferTooSmall)?;
        target.copy_from_slice(value);
        Ok(Some(value.len()))
    }

    fn put(&mut self, key: StorageKey, data: &[u8]) -> Result<(), StoreError> {
        let value = Vec::from_slice(data).map_err(|_| StoreError::Full)?;
        self.values
            .insert(key, value)
            .map(|_| ())
            .map_err(|_| StoreError::Full)
    }
}
