//! Fixed-cadence sampling

pub mod scheduler;

pub use scheduler::{Reading, SampleError, SamplingScheduler};
