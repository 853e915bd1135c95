//! Load cell amplifier interface

/// Errors from a load cell read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorError {
    /// Conversion did not complete within the bounded wait
    Timeout,
    /// Amplifier has no conversion available
    NotReady,
    /// Pin or bus access failed
    Bus,
}

/// Load cell amplifier delivering signed raw counts
pub trait LoadCellSensor {
    /// Read one conversion
    ///
    /// Implementations must bound any wait for data and report
    /// [`SensorError::Timeout`] instead of blocking indefinitely.
    fn read_raw(&mut self) -> Result<i64, SensorError>;

    /// Read `samples` conversions and return their mean
    ///
    /// The mean truncates toward zero. Zero samples is treated as one.
    fn read_raw_averaged(&mut self, samples: u16) -> Result<i64, SensorError> {
        let samples = samples.max(1);
        let mut sum: i128 = 0;
        for _ in 0..samples {
            sum += i128::from(self.read_raw()?);
        }
        Ok((sum / i128::from(samples)) as i64)
    }
}
