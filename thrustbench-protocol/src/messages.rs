//! Message types for the collector protocol
//!
//! Message types are divided into two categories:
//! - Collector → Stand: commands ([`Command`])
//! - Stand → Collector: readings, acknowledgments and status ([`OutboundMessage`])

use heapless::{String, Vec};
use serde::{Serialize, Serializer};

/// Maximum size of a single encoded message in bytes
pub const MAX_MESSAGE_SIZE: usize = 256;

/// Maximum length of a command name kept for error reporting
pub const MAX_COMMAND_NAME_LEN: usize = 24;

/// Raw inbound payload as delivered by the transport
pub type InboundMessage = Vec<u8, MAX_MESSAGE_SIZE>;

/// Command name as received on the wire (truncated to [`MAX_COMMAND_NAME_LEN`])
pub type CommandName = String<MAX_COMMAND_NAME_LEN>;

// Wire names
pub const CMD_TARE: &str = "tare";
pub const CMD_CALIBRATE: &str = "calibrate";
pub const CMD_START_TEST: &str = "start_test";
pub const CMD_STOP_TEST: &str = "stop_test";

/// Commands sent by the collector
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// Zero the load cell at the current (no-load) reading
    Tare,
    /// Compute the gain from a known reference mass (grams)
    Calibrate { known_mass: f64 },
    /// Begin a recorded test run
    StartTest,
    /// End the recorded test run
    StopTest,
}

impl Command {
    /// Wire name of this command
    pub const fn name(&self) -> &'static str {
        match self {
            Command::Tare => CMD_TARE,
            Command::Calibrate { .. } => CMD_CALIBRATE,
            Command::StartTest => CMD_START_TEST,
            Command::StopTest => CMD_STOP_TEST,
        }
    }

    /// Check if this command runs a calibration procedure
    pub fn is_procedure(&self) -> bool {
        matches!(self, Command::Tare | Command::Calibrate { .. })
    }
}

/// A force reading streamed to the collector
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReadingMessage {
    /// Monotonic timestamp in milliseconds since boot
    pub timestamp: u64,
    /// Force in newtons, sent with two decimals
    #[serde(serialize_with = "serialize_centi")]
    pub force: f64,
    /// Unconverted ADC counts
    pub raw: i64,
}

/// Command acknowledgment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Ack<'a> {
    /// Name of the acknowledged command (or the unrecognized name)
    pub command: &'a str,
    /// Whether the command completed
    pub ok: bool,
    /// Short failure reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a str>,
}

impl<'a> Ack<'a> {
    /// Successful acknowledgment
    pub const fn ok(command: &'a str) -> Self {
        Self {
            command,
            ok: true,
            error: None,
        }
    }

    /// Failed acknowledgment with a reason
    pub const fn failed(command: &'a str, error: &'a str) -> Self {
        Self {
            command,
            ok: false,
            error: Some(error),
        }
    }
}

/// Instrument status, sent when the session comes up
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatusMessage<'a> {
    /// Run mode (`idle`, `testing`, `calibrating`)
    pub state: &'a str,
    /// Counts per mass unit
    pub scale: f64,
    /// Counts at zero load
    pub offset: i64,
}

/// Messages from the stand to the collector
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage<'a> {
    Reading(ReadingMessage),
    Ack(Ack<'a>),
    Status(StatusMessage<'a>),
}

/// Magnitude above which every f64 is a whole number (2^52)
const WHOLE_NUMBER_LIMIT: f64 = 4_503_599_627_370_496.0;

/// Round to two decimals, half away from zero
pub fn round_centi(value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let scaled = value * 100.0;
    if scaled.abs() >= WHOLE_NUMBER_LIMIT {
        return value;
    }
    let rounded = if scaled >= 0.0 {
        (scaled + 0.5) as i64
    } else {
        (scaled - 0.5) as i64
    };
    rounded as f64 / 100.0
}

fn serialize_centi<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(round_centi(*value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_names() {
        assert_eq!(Command::Tare.name(), "tare");
        assert_eq!(Command::Calibrate { known_mass: 1.0 }.name(), "calibrate");
        assert_eq!(Command::StartTest.name(), "start_test");
        assert_eq!(Command::StopTest.name(), "stop_test");
    }

    #[test]
    fn test_is_procedure() {
        assert!(Command::Tare.is_procedure());
        assert!(Command::Calibrate { known_mass: 5.0 }.is_procedure());
        assert!(!Command::StartTest.is_procedure());
        assert!(!Command::StopTest.is_procedure());
    }

    #[test]
    fn test_round_centi() {
        assert_eq!(round_centi(0.0981), 0.1);
        assert_eq!(round_centi(12.344), 12.34);
        assert_eq!(round_centi(12.345_1), 12.35);
        assert_eq!(round_centi(-3.456), -3.46);
        assert!(round_centi(f64::NAN).is_nan());
    }

    #[test]
    fn test_round_centi_large_values_unchanged() {
        assert_eq!(round_centi(1e17), 1e17);
        assert_eq!(round_centi(-3e18), -3e18);
        assert_eq!(round_centi(f64::MAX), f64::MAX);
        // Just below the limit still rounds
        assert_eq!(round_centi(12_345_678_901.234), 12_345_678_901.23);
    }

    #[test]
    fn test_ack_constructors() {
        let ack = Ack::ok("tare");
        assert!(ack.ok);
        assert_eq!(ack.error, None);

        let ack = Ack::failed("calibrate", "invalid_input");
        assert!(!ack.ok);
        assert_eq!(ack.error, Some("invalid_input"));
    }
}
