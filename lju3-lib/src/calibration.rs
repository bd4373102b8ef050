//! Fixed-point calibration constants and the voltage-to-code transform.
//!
//! Calibration values are stored as 64-bit little-endian two's-complement
//! numbers with 32 fractional bits.

use crate::constants::{CAL_BLOCK_COUNT, CAL_BLOCK_SIZE, TDAC_CAL_SIZE};
use crate::error::LjError;
use byteorder::{ByteOrder, LittleEndian};
use serde::Serialize;
use strum_macros::Display;

const FIXED_ONE: f64 = 4_294_967_296.0;

/// Convert a 32.32 fixed-point value to floating point.
pub fn fixed_to_f64(raw: i64) -> f64 {
    raw as f64 / FIXED_ONE
}

/// Convert a floating-point value to 32.32 fixed point, truncating toward zero.
pub fn f64_to_fixed(value: f64) -> i64 {
    (value * FIXED_ONE) as i64
}

/// Decode the 32.32 value stored in the first 8 bytes of `bytes`.
fn read_fixed(bytes: &[u8]) -> f64 {
    fixed_to_f64(LittleEndian::read_i64(bytes))
}

/// One of the two analog outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum OutputChannel {
    #[strum(to_string = "A")]
    A,
    #[strum(to_string = "B")]
    B,
}

impl OutputChannel {
    pub const BOTH: [OutputChannel; 2] = [OutputChannel::A, OutputChannel::B];
}

impl TryFrom<usize> for OutputChannel {
    type Error = LjError;

    fn try_from(index: usize) -> Result<Self, Self::Error> {
        match index {
            0 => Ok(OutputChannel::A),
            1 => Ok(OutputChannel::B),
            other => Err(LjError::InvalidArgument(format!(
                "output channel {other} does not exist, expected 0 or 1"
            ))),
        }
    }
}

/// A slope/offset pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinearCalibration {
    pub slope: f64,
    pub offset: f64,
}

impl LinearCalibration {
    pub const IDENTITY: LinearCalibration = LinearCalibration {
        slope: 1.0,
        offset: 0.0,
    };

    fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            slope: read_fixed(&bytes[0..8]),
            offset: read_fixed(&bytes[8..16]),
        }
    }

    /// Both terms multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            slope: self.slope * factor,
            offset: self.offset * factor,
        }
    }

    /// Raw DAC code for `volts`.
    ///
    /// `volts * slope + offset` is clamped to 65535 at the top. There is no
    /// clamp at the bottom: a negative intermediate is truncated toward zero
    /// and wraps modulo 2^16, so `-1.5` becomes `65535`.
    pub fn voltage_to_code(&self, volts: f64) -> u16 {
        let raw = volts * self.slope + self.offset;
        if raw > f64::from(u16::MAX) {
            u16::MAX
        } else {
            raw as i64 as u16
        }
    }
}

/// The U3 calibration memory, five 32-byte blocks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct U3Calibration {
    pub lv_ain_single_ended: LinearCalibration,
    pub lv_ain_differential: LinearCalibration,
    pub dac0: LinearCalibration,
    pub dac1: LinearCalibration,
    pub temperature_slope: f64,
    pub vref: f64,
    pub hv_ain_slope: [f64; 4],
    pub hv_ain_offset: [f64; 4],
}

impl U3Calibration {
    pub fn from_blocks(blocks: &[[u8; CAL_BLOCK_SIZE]; CAL_BLOCK_COUNT as usize]) -> Self {
        let [block0, block1, block2, block3, block4] = blocks;
        Self {
            lv_ain_single_ended: LinearCalibration::from_bytes(&block0[0..16]),
            lv_ain_differential: LinearCalibration::from_bytes(&block0[16..32]),
            dac0: LinearCalibration::from_bytes(&block1[0..16]),
            dac1: LinearCalibration::from_bytes(&block1[16..32]),
            temperature_slope: read_fixed(&block2[0..8]),
            vref: read_fixed(&block2[8..16]),
            hv_ain_slope: std::array::from_fn(|i| read_fixed(&block3[i * 8..])),
            hv_ain_offset: std::array::from_fn(|i| read_fixed(&block4[i * 8..])),
        }
    }

    /// 8-bit DAC calibration for an output.
    pub fn dac(&self, channel: OutputChannel) -> LinearCalibration {
        match channel {
            OutputChannel::A => self.dac0,
            OutputChannel::B => self.dac1,
        }
    }
}

/// LJTick-DAC calibration EEPROM contents.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TickDacCalibration {
    pub dac_a: LinearCalibration,
    pub dac_b: LinearCalibration,
    pub serial_number: u32,
}

impl TickDacCalibration {
    pub fn dac(&self, channel: OutputChannel) -> LinearCalibration {
        match channel {
            OutputChannel::A => self.dac_a,
            OutputChannel::B => self.dac_b,
        }
    }
}

impl TryFrom<&[u8]> for TickDacCalibration {
    type Error = LjError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        if bytes.len() < TDAC_CAL_SIZE {
            return Err(LjError::Communication {
                stage: "tick dac calibration",
                expected: TDAC_CAL_SIZE,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            dac_a: LinearCalibration::from_bytes(&bytes[0..16]),
            dac_b: LinearCalibration::from_bytes(&bytes[16..32]),
            serial_number: LittleEndian::read_u32(&bytes[32..36]),
        })
    }
}
