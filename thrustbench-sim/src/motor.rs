//! Rocket motor thrust curves
//!
//! Every profile ramps up quadratically over the first 10% of the burn and
//! tails off over the last 10%. A cato burns normally for 30% of the burn
//! time, spikes to twice the thrust, then drops to zero.

use serde::Deserialize;

/// Fraction of the burn spent on the startup transient
const STARTUP_FRACTION: f64 = 0.1;

/// Burn fraction at which tail-off begins
const TAILOFF_START: f64 = 0.9;

/// Burn fraction at which a cato fails
const CATO_FRACTION: f64 = 0.3;

/// Length of the pressure spike before a cato (about five samples at 80 Hz)
const CATO_SPIKE_MS: f64 = 62.5;

/// Burn profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    /// Low start building to peak
    Progressive,
    /// Roughly flat
    #[default]
    Neutral,
    /// Peak early, then decay
    Regressive,
    /// Catastrophic failure
    Cato,
}

/// Motor under test
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct Motor {
    pub profile: Profile,
    pub peak_thrust_n: f64,
    pub burn_time_ms: u64,
}

impl Default for Motor {
    fn default() -> Self {
        Self {
            profile: Profile::Neutral,
            peak_thrust_n: 50.0,
            burn_time_ms: 2_000,
        }
    }
}

impl Motor {
    /// Thrust in newtons `elapsed_ms` after ignition
    pub fn thrust_at(&self, elapsed_ms: u64) -> f64 {
        let burn = self.burn_time_ms as f64;
        if burn <= 0.0 {
            return 0.0;
        }
        let t = elapsed_ms as f64;

        if self.profile == Profile::Cato {
            return self.cato_thrust(t, burn);
        }
        if t > burn {
            return 0.0;
        }

        let startup = (t / (burn * STARTUP_FRACTION)).powi(2).clamp(0.0, 1.0);
        let x = t / burn;
        let shape = match self.profile {
            Profile::Regressive => 1.0 - 0.4 * x,
            Profile::Progressive => 0.6 + 0.4 * x,
            _ => 1.0 - 0.1 * (core::f64::consts::PI * x).sin(),
        };
        let tailoff_start = burn * TAILOFF_START;
        let tailoff = if t > tailoff_start {
            (1.0 - ((t - tailoff_start) / (burn - tailoff_start)).powi(2)).clamp(0.0, 1.0)
        } else {
            1.0
        };

        (self.peak_thrust_n * startup * shape * tailoff).max(0.0)
    }

    fn cato_thrust(&self, t: f64, burn: f64) -> f64 {
        let failure = burn * CATO_FRACTION;
        if t >= failure {
            return 0.0;
        }
        let thrust = self.peak_thrust_n * (t / failure);
        if t >= failure - CATO_SPIKE_MS {
            thrust * 2.0
        } else {
            thrust
        }
    }

    /// Time after ignition when thrust is back to zero for good
    pub fn burnout_ms(&self) -> u64 {
        match self.profile {
            Profile::Cato => (self.burn_time_ms as f64 * CATO_FRACTION) as u64,
            _ => self.burn_time_ms,
        }
    }
}
