//! Calibration persistence
//!
//! Loads and saves the calibration record through a [`KeyValueStore`].

use crate::config::calibration::{CalibrationParameters, CalibrationRecord, RECORD_SIZE};
use crate::traits::{KeyValueStore, StorageKey, StoreError};

/// Read buffer; larger than a record so oversized values are detected
const READ_BUFFER_SIZE: usize = 2 * RECORD_SIZE;

/// Reasons a stored record was not used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LoadError {
    /// Storage read failed
    Store(StoreError),
    /// Nothing stored yet
    NotFound,
    /// Bytes are not a record
    Deserialize,
    /// Wrong magic or version
    InvalidFormat,
    /// CRC check failed
    CrcMismatch,
    /// Record holds an unusable scale
    InvalidScale,
}

impl From<StoreError> for LoadError {
    fn from(e: StoreError) -> Self {
        LoadError::Store(e)
    }
}

/// Calibration record storage
pub struct CalibrationStore<K> {
    backend: K,
}

impl<K: KeyValueStore> CalibrationStore<K> {
    /// Wrap a key-value backend
    pub const fn new(backend: K) -> Self {
        Self { backend }
    }

    /// Access the backend
    pub fn backend_mut(&mut self) -> &mut K {
        &mut self.backend
    }

    /// Release the backend
    pub fn into_inner(self) -> K {
        self.backend
    }

    /// Load calibration, falling back to defaults
    ///
    /// Never fails: a missing, unreadable or corrupted record yields
    /// [`CalibrationParameters::DEFAULT`].
    pub fn load(&mut self) -> CalibrationParameters {
        match self.try_load() {
            Ok(params) => {
                info!(
                    "Loaded calibration: scale={} offset={}",
                    params.scale(),
                    params.offset()
                );
                params
            }
            Err(LoadError::NotFound) => {
                debug!("No calibration stored, using defaults");
                CalibrationParameters::DEFAULT
            }
            Err(e) => {
                warn!("Failed to load calibration: {:?}, using defaults", e);
                CalibrationParameters::DEFAULT
            }
        }
    }

    /// Load calibration, reporting why a record was not used
    pub fn try_load(&mut self) -> Result<CalibrationParameters, LoadError> {
        let mut buffer = [0u8; READ_BUFFER_SIZE];
        let len = self
            .backend
            .get(StorageKey::Calibration, &mut buffer)?
            .ok_or(LoadError::NotFound)?;
        let bytes = buffer.get(..len).ok_or(LoadError::Deserialize)?;

        let record = CalibrationRecord::from_bytes(bytes).ok_or(LoadError::Deserialize)?;

        if !record.is_valid() {
            return Err(LoadError::InvalidFormat);
        }
        if !record.verify_crc() {
            return Err(LoadError::CrcMismatch);
        }
        record.parameters().ok_or(LoadError::InvalidScale)
    }

    /// Persist calibration
    ///
    /// Returns once the backend reports the write durable.
    pub fn save(&mut self, params: &CalibrationParameters) -> Result<(), StoreError> {
        let bytes = CalibrationRecord::new(params).to_bytes();

        debug!("Saving {} bytes of calibration", bytes.len());
        self.backend.put(StorageKey::Calibration, &bytes)?;

        info!(
            "Saved calibration: scale={} offset={}",
            params.scale(),
            params.offset()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemStore;

    #[test]
    fn test_load_empty_gives_defaults() {
        let mut store = CalibrationStore::new(MemStore::new());
        assert_eq!(store.try_load(), Err(LoadError::NotFound));
        assert_eq!(store.load(), CalibrationParameters::DEFAULT);
    }

    #[test]
    fn test_save_then_load() {
        let mut store = CalibrationStore::new(MemStore::new());
        let params = CalibrationParameters::new(432.1, -1234).unwrap();
        store.save(&params).unwrap();
        assert_eq!(store.load(), params);
    }

    #[test]
    fn test_corrupted_record_gives_defaults() {
        let mut store = CalibrationStore::new(MemStore::new());
        store
            .save(&CalibrationParameters::new(432.1, -1234).unwrap())
            .unwrap();

        let value = store.backend_mut().value_mut(StorageKey::Calibration).unwrap();
        let last = value.len() - 1;
        value[last] ^= 0xFF;

        assert_eq!(store.try_load(), Err(LoadError::CrcMismatch));
        assert_eq!(store.load(), CalibrationParameters::DEFAULT);
    }

    #[test]
    fn test_garbage_gives_defaults() {
        let mut store = CalibrationStore::new(MemStore::new());
        store
            .backend_mut()
            .put(StorageKey::Calibration, &[0xde, 0xad])
            .unwrap();
        assert_eq!(store.try_load(), Err(LoadError::Deserialize));
        assert_eq!(store.load(), CalibrationParameters::DEFAULT);
    }

    #[test]
    fn test_oversized_value_rejected() {
        let mut store = CalibrationStore::new(MemStore::new());
        let mut value = CalibrationRecord::new(&CalibrationParameters::DEFAULT)
            .to_bytes()
            .to_vec();
        value.push(0);
        store
            .backend_mut()
            .put(StorageKey::Calibration, &value)
            .unwrap();
        assert_eq!(store.try_load(), Err(LoadError::Deserialize));
    }

    #[test]
    fn test_wrong_magic_rejected() {
        let mut record = CalibrationRecord::new(&CalibrationParameters::new(2.0, 3).unwrap());
        record.magic = 0x1234_5678;
        record.crc = record.calculate_crc();
        let mut store = CalibrationStore::new(MemStore::new());
        store
            .backend_mut()
            .put(StorageKey::Calibration, &record.to_bytes())
            .unwrap();
        assert_eq!(store.try_load(), Err(LoadError::InvalidFormat));
    }

    #[test]
    fn test_zero_scale_record_rejected() {
        let mut record = CalibrationRecord::new(&CalibrationParameters::DEFAULT);
        record.scale = 0.0;
        record.crc = record.calculate_crc();
        let mut store = CalibrationStore::new(MemStore::new());
        store
            .backend_mut()
            .put(StorageKey::Calibration, &record.to_bytes())
            .unwrap();
        assert_eq!(store.try_load(), Err(LoadError::InvalidScale));
        assert_eq!(store.load(), CalibrationParameters::DEFAULT);
    }

    #[test]
    fn test_read_failure_gives_defaults() {
        let mut backend = MemStore::new();
        backend.fail_reads = true;
        let mut store = CalibrationStore::new(backend);
        assert_eq!(
            store.try_load(),
            Err(LoadError::Store(StoreError::Storage))
        );
        assert_eq!(store.load(), CalibrationParameters::DEFAULT);
    }

    #[test]
    fn test_save_failure_reported() {
        let mut backend = MemStore::new();
        backend.fail_writes = true;
        let mut store = CalibrationStore::new(backend);
        let result = store.save(&CalibrationParameters::new(3.0, 1).unwrap());
        assert_eq!(result, Err(StoreError::Storage));
    }
}
