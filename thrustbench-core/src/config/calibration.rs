//! Load cell calibration
//!
//! [`CalibrationParameters`] is the in-memory pair used for conversion;
//! [`CalibrationRecord`] is what lands in storage.

use crc::{Crc, CRC_32_ISO_HDLC};

/// Magic number to identify a calibration record
pub const CALIBRATION_MAGIC: u32 = 0x4C43_4254; // "TBCL"

/// Current calibration record version
pub const CALIBRATION_VERSION: u8 = 1;

/// Encoded record length
pub const RECORD_SIZE: usize = 25;

/// Bytes covered by the CRC
const CRC_COVERED: usize = RECORD_SIZE - 4;

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Scale and offset mapping raw counts to mass units
///
/// `scale` is always finite and non-zero; construction enforces it.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationParameters {
    scale: f64,
    offset: i64,
}

impl Default for CalibrationParameters {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl CalibrationParameters {
    /// Uncalibrated parameters: one count per unit, no offset
    pub const DEFAULT: Self = Self {
        scale: 1.0,
        offset: 0,
    };

    /// Create parameters, rejecting a zero or non-finite scale
    pub fn new(scale: f64, offset: i64) -> Option<Self> {
        if scale == 0.0 || !scale.is_finite() {
            return None;
        }
        Some(Self { scale, offset })
    }

    /// Counts per mass unit
    pub const fn scale(&self) -> f64 {
        self.scale
    }

    /// Counts at zero load
    pub const fn offset(&self) -> i64 {
        self.offset
    }

    /// Same scale with a new zero point
    pub const fn with_offset(self, offset: i64) -> Self {
        Self { offset, ..self }
    }

    /// Same zero point with a new scale
    pub fn with_scale(self, scale: f64) -> Option<Self> {
        Self::new(scale, self.offset)
    }
}

/// Calibration record stored in flash
///
/// Fixed little-endian layout: magic, version, scale bits, offset, CRC.
/// The CRC covers every other field.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationRecord {
    pub magic: u32,
    pub version: u8,
    pub scale: f64,
    pub offset: i64,
    pub crc: u32,
}

impl CalibrationRecord {
    /// Build a sealed record from parameters
    pub fn new(params: &CalibrationParameters) -> Self {
        let mut record = Self {
            magic: CALIBRATION_MAGIC,
            version: CALIBRATION_VERSION,
            scale: params.scale(),
            offset: params.offset(),
            crc: 0,
        };
        record.crc = record.calculate_crc();
        record
    }

    /// Check magic and version
    pub fn is_valid(&self) -> bool {
        self.magic == CALIBRATION_MAGIC && self.version == CALIBRATION_VERSION
    }

    /// CRC-32 over magic, version, scale bits and offset
    pub fn calculate_crc(&self) -> u32 {
        let bytes = self.to_bytes();
        CRC32.checksum(&bytes[..CRC_COVERED])
    }

    /// Encode for storage
    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut bytes = [0u8; RECORD_SIZE];
        bytes[0..4].copy_from_slice(&self.magic.to_le_bytes());
        bytes[4] = self.version;
        bytes[5..13].copy_from_slice(&self.scale.to_bits().to_le_bytes());
        bytes[13..21].copy_from_slice(&self.offset.to_le_bytes());
        bytes[21..25].copy_from_slice(&self.crc.to_le_bytes());
        bytes
    }

    /// Decode a stored record; `None` if the length is wrong
    ///
    /// Magic, version and CRC are not checked here.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != RECORD_SIZE {
            return None;
        }
        Some(Self {
            magic: u32::from_le_bytes(field(bytes, 0)?),
            version: *bytes.get(4)?,
            scale: f64::from_bits(u64::from_le_bytes(field(bytes, 5)?)),
            offset: i64::from_le_bytes(field(bytes, 13)?),
            crc: u32::from_le_bytes(field(bytes, 21)?),
        })
    }

    /// Verify the stored CRC
    pub fn verify_crc(&self) -> bool {
        self.crc == self.calculate_crc()
    }

    /// Parameters carried by this record, if the scale is usable
    pub fn parameters(&self) -> Option<CalibrationParameters> {
        CalibrationParameters::new(self.scale, self.offset)
    }
}

fn field<const N: usize>(bytes: &[u8], at: usize) -> Option<[u8; N]> {
    bytes.get(at..at + N)?.try_into().ok()
}
