//! Collaborator interfaces
//!
//! The control core never touches hardware directly. Each peripheral it
//! drives is reached through one of these traits so the same loop runs
//! against the HX711 on the board, the simulator, and test doubles.

pub mod clock;
pub mod link;
pub mod sensor;
pub mod storage;

pub use clock::Clock;
pub use link::{NetworkLink, TransportError, TransportSession};
pub use sensor::{LoadCellSensor, SensorError};
pub use storage::{KeyValueStore, StorageKey, StoreError};
