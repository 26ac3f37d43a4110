//! RuuviTag advertisement payload decoding.
//!
//! The input is the manufacturer-specific data with the two-byte company
//! identifier already stripped; its first byte is the data format tag. Each
//! supported format has a fixed big-endian field table (see the submodules).
//! Reserved "not available" bit patterns decode to `None`, never to a number.
//!
//! Scaling is done by dividing the raw integer by the exact denominator of the
//! documented resolution (0.005 °C → `raw / 200`), which gives the correctly
//! rounded value of `raw × resolution` without accumulating error.
//!
//! Frames may be shorter than their full layout as long as they carry the
//! environmental block (temperature, humidity, pressure). Fields past the end of
//! such a frame are absent.

mod e1;
mod v3;
mod v5;
mod v6;

use crate::measurement::SensorValues;
use serde::{Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Ruuvi Innovations manufacturer ID (0x0499).
pub const RUUVI_MANUFACTURER_ID: u16 = 0x0499;

/// Temperature resolution is 0.005 °C.
const TEMPERATURE_DIVISOR: f64 = 200.0;
/// Humidity resolution is 0.0025 %.
const HUMIDITY_DIVISOR: f64 = 400.0;
/// Pressure is transmitted in Pa with an offset of -50 000 Pa.
const PRESSURE_OFFSET_PA: f64 = 50_000.0;
/// Particulate matter resolution is 0.1 ug/m3.
const PM_DIVISOR: f64 = 10.0;
/// 9-bit all-ones value used by split VOC/NOx/sound fields.
const NINE_BIT_UNAVAILABLE: u16 = 0x1FF;

/// Error types for decoding RuuviTag data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The format tag is not one this decoder knows
    #[error("Unsupported format: 0x{0:02X}")]
    UnsupportedFormat(u8),
    /// The payload ends before the format's required fields
    #[error("Truncated payload: expected at least {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
}

/// Supported RuuviTag data formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataFormat {
    /// RAWv1
    V3,
    /// RAWv2
    V5,
    /// Air quality
    V6,
    /// Cut-down RAWv2 without acceleration
    C5,
    /// Extended v1 air quality
    E1,
}

impl DataFormat {
    /// The tag byte that introduces this format on the wire.
    pub const fn tag(self) -> u8 {
        match self {
            DataFormat::V3 => 0x03,
            DataFormat::V5 => 0x05,
            DataFormat::V6 => 0x06,
            DataFormat::C5 => 0xC5,
            DataFormat::E1 => 0xE1,
        }
    }

    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0x03 => Some(DataFormat::V3),
            0x05 => Some(DataFormat::V5),
            0x06 => Some(DataFormat::V6),
            0xC5 => Some(DataFormat::C5),
            0xE1 => Some(DataFormat::E1),
            _ => None,
        }
    }

    /// Shortest payload accepted: up to the end of the pressure field.
    pub const fn min_len(self) -> usize {
        match self {
            DataFormat::V3 => 6,
            DataFormat::V5 | DataFormat::V6 | DataFormat::C5 | DataFormat::E1 => 7,
        }
    }

    /// Length of the complete layout, including the trailing MAC bytes.
    pub const fn full_len(self) -> usize {
        match self {
            DataFormat::V3 => 14,
            DataFormat::V5 => 24,
            DataFormat::V6 => 20,
            DataFormat::C5 => 18,
            DataFormat::E1 => 40,
        }
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataFormat::C5 => write!(f, "C5"),
            DataFormat::E1 => write!(f, "E1"),
            other => write!(f, "{}", other.tag()),
        }
    }
}

impl Serialize for DataFormat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.tag())
    }
}

/// Big-endian field reader over a payload.
///
/// Every accessor returns `None` when the field extends past the end of the
/// payload. The `unsigned`/`signed16` accessors additionally map the reserved
/// "not available" pattern to `None`.
#[derive(Debug, Clone, Copy)]
struct Frame<'a> {
    bytes: &'a [u8],
}

impl<'a> Frame<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    fn byte(&self, offset: usize) -> Option<u8> {
        self.bytes.get(offset).copied()
    }

    /// Raw unsigned big-endian integer of `width` bytes (1..=4).
    fn raw(&self, offset: usize, width: usize) -> Option<u32> {
        let field = self.bytes.get(offset..offset.checked_add(width)?)?;
        Some(field.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b)))
    }

    /// Unsigned field where all bits set means "not available".
    fn unsigned(&self, offset: usize, width: usize) -> Option<u32> {
        let all_ones = ((1u64 << (8 * width)) - 1) as u32;
        self.raw(offset, width).filter(|&raw| raw != all_ones)
    }

    /// Signed 16-bit field where `i16::MIN` means "not available".
    fn signed16(&self, offset: usize) -> Option<i16> {
        self.raw(offset, 2)
            .map(|raw| raw as u16 as i16)
            .filter(|&raw| raw != i16::MIN)
    }

    /// Flag bit `bit` of the byte at `offset`.
    fn flag(&self, offset: usize, bit: u8) -> Option<bool> {
        self.byte(offset).map(|b| b & (1 << bit) != 0)
    }

    /// 9-bit value split into 8 high bits at `offset` and a low bit in a flags byte.
    fn nine_bit(&self, offset: usize, flags_offset: usize, lsb_bit: u8) -> Option<u16> {
        let high = u16::from(self.byte(offset)?);
        let low = u16::from(self.flag(flags_offset, lsb_bit)?);
        Some((high << 1) | low).filter(|&v| v != NINE_BIT_UNAVAILABLE)
    }
}

/// Temperature, humidity and pressure at offsets 1..7, shared by formats 5, 6, C5 and E1.
fn decode_environment(frame: &Frame<'_>, values: &mut SensorValues) {
    values.temperature = frame
        .signed16(1)
        .map(|raw| f64::from(raw) / TEMPERATURE_DIVISOR);
    values.humidity = frame
        .unsigned(3, 2)
        .map(|raw| f64::from(raw) / HUMIDITY_DIVISOR);
    values.pressure = frame
        .unsigned(5, 2)
        .map(|raw| f64::from(raw) + PRESSURE_OFFSET_PA);
}

/// Decode manufacturer data from a RuuviTag into sensor values.
///
/// # Arguments
/// * `payload` - The manufacturer-specific data bytes (without the company ID prefix)
///
/// # Errors
/// - [`DecodeError::UnsupportedFormat`] for an unknown format tag
/// - [`DecodeError::Truncated`] for an empty payload or one shorter than the
///   format's minimum length
pub fn decode(payload: &[u8]) -> Result<SensorValues, DecodeError> {
    let Some(&tag) = payload.first() else {
        return Err(DecodeError::Truncated {
            expected: 1,
            actual: 0,
        });
    };

    let format = DataFormat::from_tag(tag).ok_or(DecodeError::UnsupportedFormat(tag))?;
    if payload.len() < format.min_len() {
        return Err(DecodeError::Truncated {
            expected: format.min_len(),
            actual: payload.len(),
        });
    }

    let frame = Frame::new(payload);
    Ok(match format {
        DataFormat::V3 => v3::decode(&frame),
        DataFormat::V5 => v5::decode(&frame),
        DataFormat::C5 => v5::decode_cut_down(&frame),
        DataFormat::V6 => v6::decode(&frame),
        DataFormat::E1 => e1::decode(&frame),
    })
}
