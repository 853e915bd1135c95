//! Key-value storage backends

pub mod flash;
pub mod memory;

pub use flash::FlashStore;
pub use memory::MemoryStore;
