//! Run mode definition

use super::events::Event;

/// Instrument run mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InstrumentState {
    /// Sampling, nothing recorded
    #[default]
    Idle,
    /// Test in progress; readings are streamed
    Testing,
    /// Calibrate procedure running
    Calibrating,
}

impl InstrumentState {
    /// Wire name used in status messages
    pub const fn as_str(&self) -> &'static str {
        match self {
            InstrumentState::Idle => "idle",
            InstrumentState::Testing => "testing",
            InstrumentState::Calibrating => "calibrating",
        }
    }

    /// Process an event and return the next run mode
    pub fn transition(self, event: Event) -> Self {
        use Event::*;
        use InstrumentState::*;

        match (self, event) {
            (Idle, StartTest) => Testing,
            (Testing, StopTest) => Idle,

            // A calibration interrupts whatever was running
            (_, CalibrationStarted) => Calibrating,
            (Calibrating, CalibrationFinished) => Idle,

            // Default: stay in current state (repeated start/stop are no-ops)
            _ => self,
        }
    }
}
