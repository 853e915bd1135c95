//! HX711 24-bit load cell amplifier
//!
//! Bit-banged two-wire interface: DOUT goes low when a conversion is ready,
//! then 24 clock pulses shift the result out MSB first. One to three extra
//! pulses select the channel and gain for the next conversion.
//!
//! Holding SCK high for more than 60 µs powers the chip down, so the clock
//! high time is kept to a single microsecond.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use thrustbench_core::traits::{LoadCellSensor, SensorError};

/// Data bits per conversion
const DATA_BITS: u32 = 24;

/// Interval between DOUT polls while waiting for a conversion
const READY_POLL_US: u32 = 100;

/// Default bound on the ready wait (a little over one 10 Hz conversion)
pub const DEFAULT_READY_TIMEOUT_US: u32 = 120_000;

/// Channel and gain for the next conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Gain {
    /// Channel A, gain 128 (25 pulses)
    #[default]
    A128,
    /// Channel B, gain 32 (26 pulses)
    B32,
    /// Channel A, gain 64 (27 pulses)
    A64,
}

impl Gain {
    /// Pulses after the 24 data bits
    pub const fn extra_pulses(self) -> u32 {
        match self {
            Gain::A128 => 1,
            Gain::B32 => 2,
            Gain::A64 => 3,
        }
    }
}

/// HX711 driver
pub struct Hx711<SCK, DOUT, D> {
    sck: SCK,
    dout: DOUT,
    delay: D,
    gain: Gain,
    ready_timeout_us: u32,
}

impl<SCK, DOUT, D> Hx711<SCK, DOUT, D>
where
    SCK: OutputPin,
    DOUT: InputPin,
    D: DelayNs,
{
    /// Create a driver on channel A, gain 128
    ///
    /// Drives SCK low, which also powers the chip up.
    pub fn new(mut sck: SCK, dout: DOUT, delay: D) -> Result<Self, SensorError> {
        sck.set_low().map_err(|_| SensorError::Bus)?;
        Ok(Self {
            sck,
            dout,
            delay,
            gain: Gain::A128,
            ready_timeout_us: DEFAULT_READY_TIMEOUT_US,
        })
    }

    /// Bound the wait for a conversion; zero fails at once when not ready
    pub fn with_ready_timeout_us(mut self, timeout_us: u32) -> Self {
        self.ready_timeout_us = timeout_us;
        self
    }

    /// Select channel and gain
    ///
    /// The chip applies it from the conversion after the next read.
    pub fn set_gain(&mut self, gain: Gain) {
        self.gain = gain;
    }

    pub fn gain(&self) -> Gain {
        self.gain
    }

    /// Whether a conversion is waiting
    pub fn is_ready(&mut self) -> Result<bool, SensorError> {
        self.dout.is_low().map_err(|_| SensorError::Bus)
    }

    /// Enter power-down mode
    pub fn power_down(&mut self) -> Result<(), SensorError> {
        self.sck.set_low().map_err(|_| SensorError::Bus)?;
        self.sck.set_high().map_err(|_| SensorError::Bus)?;
        self.delay.delay_us(80);
        Ok(())
    }

    /// Leave power-down mode
    ///
    /// The chip resets to channel A, gain 128; the configured gain is
    /// applied again by the first read.
    pub fn power_up(&mut self) -> Result<(), SensorError> {
        self.sck.set_low().map_err(|_| SensorError::Bus)
    }

    /// Release the pins and delay
    pub fn release(self) -> (SCK, DOUT, D) {
        (self.sck, self.dout, self.delay)
    }

    fn wait_ready(&mut self) -> Result<(), SensorError> {
        let mut waited_us: u32 = 0;
        while !self.is_ready()? {
            if waited_us >= self.ready_timeout_us {
                return Err(if self.ready_timeout_us == 0 {
                    SensorError::NotReady
                } else {
                    SensorError::Timeout
                });
            }
            self.delay.delay_us(READY_POLL_US);
            waited_us = waited_us.saturating_add(READY_POLL_US);
        }
        Ok(())
    }

    fn pulse(&mut self) -> Result<(), SensorError> {
        self.sck.set_high().map_err(|_| SensorError::Bus)?;
        self.delay.delay_us(1);
        self.sck.set_low().map_err(|_| SensorError::Bus)?;
        self.delay.delay_us(1);
        Ok(())
    }

    fn shift_in(&mut self) -> Result<u32, SensorError> {
        let mut value: u32 = 0;
        for _ in 0..DATA_BITS {
            self.sck.set_high().map_err(|_| SensorError::Bus)?;
            self.delay.delay_us(1);
            let bit = self.dout.is_high().map_err(|_| SensorError::Bus)?;
            self.sck.set_low().map_err(|_| SensorError::Bus)?;
            self.delay.delay_us(1);
            value = (value << 1) | u32::from(bit);
        }
        for _ in 0..self.gain.extra_pulses() {
            self.pulse()?;
        }
        Ok(value)
    }
}

impl<SCK, DOUT, D> LoadCellSensor for Hx711<SCK, DOUT, D>
where
    SCK: OutputPin,
    DOUT: InputPin,
    D: DelayNs,
{
    fn read_raw(&mut self) -> Result<i64, SensorError> {
        self.wait_ready()?;
        let raw = self.shift_in()?;
        Ok(i64::from(sign_extend_24(raw)))
    }
}

/// Interpret the low 24 bits as two's complement
pub fn sign_extend_24(raw: u32) -> i32 {
    ((raw << 8) as i32) >> 8
}
