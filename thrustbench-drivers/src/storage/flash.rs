//! NOR flash key-value store
//!
//! Wear-levelled storage in a dedicated flash range using
//! sequential-storage. The flash traits are async; every operation here is
//! bounded by the flash itself, so it is driven to completion with
//! `block_on` and exposed through the synchronous [`KeyValueStore`].

use core::ops::Range;

use embassy_futures::block_on;
use embedded_storage_async::nor_flash::NorFlash;
use sequential_storage::cache::NoCache;
use sequential_storage::map;
use thrustbench_core::traits::{KeyValueStore, StorageKey, StoreError};

/// Scratch buffer for one stored item (key, value and item header)
const ITEM_BUFFER_SIZE: usize = 320;

/// Key-value store over a flash range
pub struct FlashStore<F> {
    flash: F,
    range: Range<u32>,
}

impl<F: NorFlash> FlashStore<F> {
    /// Use `range` of `flash` for storage
    ///
    /// The range must span at least two erase pages and be page aligned.
    pub fn new(flash: F, range: Range<u32>) -> Self {
        Self { flash, range }
    }

    /// Erase the whole storage range
    pub fn erase_all(&mut self) -> Result<(), StoreError> {
        block_on(self.flash.erase(self.range.start, self.range.end))
            .map_err(|_| StoreError::Storage)
    }

    /// Release the flash
    pub fn into_inner(self) -> F {
        self.flash
    }
}

impl<F: NorFlash> KeyValueStore for FlashStore<F> {
    fn get(&mut self, key: StorageKey, buffer: &mut [u8]) -> Result<Option<usize>, StoreError> {
        let mut data_buffer = [0u8; ITEM_BUFFER_SIZE];

        let result = block_on(map::fetch_item::<StorageKey, &[u8], _>(
            &mut self.flash,
            self.range.clone(),
            &mut NoCache::new(),
            &mut data_buffer,
            &key,
        ));

        match result {
            Ok(Some(data)) => {
                let target = buffer
                    .get_mut(..data.len())
                    .ok_or(StoreError::BufferTooSmall)?;
                target.copy_from_slice(data);
                Ok(Some(data.len()))
            }
            Ok(None) => Ok(None),
            Err(_) => Err(StoreError::Storage),
        }
    }

    fn put(&mut self, key: StorageKey, data: &[u8]) -> Result<(), StoreError> {
        let mut data_buffer = [0u8; ITEM_BUFFER_SIZE];

        block_on(map::store_item(
            &mut self.flash,
            self.range.clone(),
            &mut NoCache::new(),
            &mut data_buffer,
            &key,
            &data,
        ))
        .map_err(|e| match e {
            sequential_storage::Error::FullStorage => StoreError::Full,
            _ => StoreError::Storage,
        })
    }
}
