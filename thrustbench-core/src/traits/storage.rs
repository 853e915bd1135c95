//! Persistent key-value storage interface

/// Storage keys for persisted data
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum StorageKey {
    /// Load cell calibration record
    Calibration = 0,
}

impl StorageKey {
    /// Get the key as a byte value
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Create a key from a byte value
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(StorageKey::Calibration),
            _ => None,
        }
    }
}

/// Errors from storage operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StoreError {
    /// Backend read or write failed
    Storage,
    /// Buffer too small for the stored value
    BufferTooSmall,
    /// No space left for the value
    Full,
}

/// Durable key-value storage
///
/// A successful `put` must survive power loss.
pub trait KeyValueStore {
    /// Read the value for `key` into `buffer`
    ///
    /// Returns the value length, or `None` if the key was never written.
    fn get(&mut self, key: StorageKey, buffer: &mut [u8]) -> Result<Option<usize>, StoreError>;

    /// Write the value for `key`, replacing any previous value
    fn put(&mut self, key: StorageKey, data: &[u8]) -> Result<(), StoreError>;
}

impl<K: KeyValueStore + ?Sized> KeyValueStore for &mut K {
    fn get(&mut self, key: StorageKey, buffer: &mut [u8]) -> Result<Option<usize>, StoreError> {
        (**self).get(key, buffer)
    }

    fn put(&mut self, key: StorageKey, data: &[u8]) -> Result<(), StoreError> {
        (**self).put(key, data)
    }
}

#[cfg(feature = "sequential-storage")]
impl sequential_storage::map::Key for StorageKey {
    fn serialize_into(
        &self,
        buffer: &mut [u8],
    ) -> Result<usize, sequential_storage::map::SerializationError> {
        let slot = buffer
            .first_mut()
            .ok_or(sequential_storage::map::SerializationError::BufferTooSmall)?;
        *slot = self.as_u8();
        Ok(1)
    }

    fn deserialize_from(
        buffer: &[u8],
    ) -> Result<(Self, usize), sequential_storage::map::SerializationError> {
        let byte = buffer
            .first()
            .ok_or(sequential_storage::map::SerializationError::BufferTooSmall)?;
        StorageKey::from_u8(*byte)
            .map(|key| (key, 1))
            .ok_or(sequential_storage::map::SerializationError::InvalidFormat)
    }
}
