//! Events that trigger run mode transitions

/// Events that can change the run mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    /// Collector asked to start a test
    StartTest,
    /// Collector asked to stop the test
    StopTest,
    /// A calibrate procedure began
    CalibrationStarted,
    /// The calibrate procedure ended (successfully or not)
    CalibrationFinished,
}
