//! Configuration types
//!
//! All sections implement `Default` with the stock stand values and
//! deserialize with missing fields filled from those defaults, so a host
//! TOML file only needs the keys it overrides.

use heapless::String;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Maximum SSID length
pub const MAX_SSID_LEN: usize = 32;
/// Maximum passphrase length
pub const MAX_PASSPHRASE_LEN: usize = 64;
/// Maximum collector host name length
pub const MAX_HOST_LEN: usize = 64;
/// Maximum collector path length
pub const MAX_PATH_LEN: usize = 32;

/// Upper bound on commands handled in one loop iteration
pub const MAX_COMMANDS_PER_ITERATION: usize = 8;

/// Standard gravity (m/s²)
pub const STANDARD_GRAVITY: f64 = 9.806_65;

/// Network credentials
#[derive(Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Credentials {
    pub ssid: String<MAX_SSID_LEN>,
    pub passphrase: String<MAX_PASSPHRASE_LEN>,
}

// The passphrase never reaches logs
impl core::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Credentials")
            .field("ssid", &self.ssid)
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Credentials {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Credentials {{ ssid: {} }}", self.ssid.as_str())
    }
}

/// Collector session endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Endpoint {
    pub host: String<MAX_HOST_LEN>,
    pub port: u16,
    pub path: String<MAX_PATH_LEN>,
}

impl Default for Endpoint {
    fn default() -> Self {
        let mut path = String::new();
        // Fits in MAX_PATH_LEN
        let _ = path.push('/');
        Self {
            host: String::new(),
            port: 81,
            path,
        }
    }
}

/// Reconnect backoff after a failed attempt
///
/// The delay starts at `initial_backoff_ms` and doubles per consecutive
/// failure up to `max_backoff_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RetryPolicy {
    pub initial_backoff_ms: u32,
    pub max_backoff_ms: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 500,
            max_backoff_ms: 5_000,
        }
    }
}

impl RetryPolicy {
    /// Delay before the next attempt after `failures` consecutive failures
    pub fn backoff_ms(&self, failures: u32) -> u32 {
        if failures == 0 {
            return 0;
        }
        let shift = (failures - 1).min(16);
        self.initial_backoff_ms
            .saturating_mul(1 << shift)
            .min(self.max_backoff_ms.max(self.initial_backoff_ms))
    }
}

/// Network link settings
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct NetworkConfig {
    pub credentials: Credentials,
    /// Give up on an association attempt after this long
    pub association_timeout_ms: u32,
    pub retry: RetryPolicy,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            credentials: Credentials::default(),
            association_timeout_ms: 10_000,
            retry: RetryPolicy::default(),
        }
    }
}

/// Transport session settings
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TransportConfig {
    pub endpoint: Endpoint,
    /// Open attempts allowed within one tick
    pub open_attempts_per_tick: u8,
    /// Time allowed for open attempts within one tick
    pub open_budget_ms: u32,
    pub retry: RetryPolicy,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::default(),
            open_attempts_per_tick: 1,
            open_budget_ms: 50,
            retry: RetryPolicy::default(),
        }
    }
}

/// Complete stand configuration
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StandConfig {
    /// Minimum interval between samples (12 ms is roughly 80 Hz)
    pub sampling_period_ms: u32,
    /// Conversions averaged into one reading
    pub oversample: u16,
    /// Conversions averaged by a tare command
    pub tare_samples: u16,
    /// Conversions averaged by a calibrate command
    pub calibration_samples: u16,
    /// Maximum duration of a tare or calibrate procedure
    pub procedure_timeout_ms: u32,
    /// Factor from calibrated mass units to force units
    pub mass_to_force: f64,
    /// Stream readings while idle, not only during a test
    pub emit_when_idle: bool,
    /// Inbound commands handled per loop iteration
    pub max_commands_per_iteration: u8,
    pub network: NetworkConfig,
    pub transport: TransportConfig,
}

impl Default for StandConfig {
    fn default() -> Self {
        Self {
            sampling_period_ms: 12,
            oversample: 1,
            tare_samples: 10,
            calibration_samples: 10,
            procedure_timeout_ms: 3_000,
            // Grams to newtons
            mass_to_force: STANDARD_GRAVITY / 1000.0,
            emit_when_idle: false,
            max_commands_per_iteration: 4,
            network: NetworkConfig::default(),
            transport: TransportConfig::default(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Sampling period must be at least 1 ms
    ZeroSamplingPeriod,
    /// A sample count is zero
    ZeroSampleCount,
    /// Procedures need a non-zero time budget
    ZeroProcedureTimeout,
    /// Mass-to-force factor must be finite and non-zero
    InvalidMassToForce,
    /// Command budget must be between 1 and [`MAX_COMMANDS_PER_ITERATION`]
    InvalidCommandBudget,
    /// Transport needs at least one open attempt per tick
    ZeroOpenAttempts,
    /// Backoff must start above zero
    ZeroBackoff,
}

impl StandConfig {
    /// Check the configuration for values the control loop cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sampling_period_ms == 0 {
            return Err(ConfigError::ZeroSamplingPeriod);
        }
        if self.oversample == 0 || self.tare_samples == 0 || self.calibration_samples == 0 {
            return Err(ConfigError::ZeroSampleCount);
        }
        if self.procedure_timeout_ms == 0 {
            return Err(ConfigError::ZeroProcedureTimeout);
        }
        if !self.mass_to_force.is_finite() || self.mass_to_force == 0.0 {
            return Err(ConfigError::InvalidMassToForce);
        }
        let budget = usize::from(self.max_commands_per_iteration);
        if budget == 0 || budget > MAX_COMMANDS_PER_ITERATION {
            return Err(ConfigError::InvalidCommandBudget);
        }
        if self.transport.open_attempts_per_tick == 0 {
            return Err(ConfigError::ZeroOpenAttempts);
        }
        if self.network.retry.initial_backoff_ms == 0
            || self.transport.retry.initial_backoff_ms == 0
        {
            return Err(ConfigError::ZeroBackoff);
        }
        Ok(())
    }
}
