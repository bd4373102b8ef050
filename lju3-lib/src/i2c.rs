//! LJTick-DAC access over the U3's tunnelled I2C bus.

use crate::calibration::OutputChannel;
use crate::command::I2c;
use crate::constants::{TDAC_CAL_MEM_START, TDAC_CAL_SIZE, TDAC_DAC_ADDRESS, TDAC_DEFAULT_SCL_PIN, TDAC_EEPROM_ADDRESS};
use crate::error::LjError;
use bytes::Bytes;

/// The pair of FIO/EIO pins carrying the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct I2cBus {
    pub sda_pin: u8,
    pub scl_pin: u8,
}

impl I2cBus {
    /// Bus of an LJTick plugged into the terminal block whose lower pin is
    /// `scl_pin`; data is on the next pin.
    pub fn tick(scl_pin: u8) -> Result<Self, LjError> {
        let sda_pin = scl_pin
            .checked_add(1)
            .ok_or_else(|| LjError::InvalidArgument(format!("no data pin after pin {scl_pin}")))?;
        Ok(Self { sda_pin, scl_pin })
    }

    pub fn pins(&self) -> [u8; 2] {
        [self.scl_pin, self.sda_pin]
    }

    fn transaction(&self, address: u8, tx: Bytes, rx_len: u8) -> I2c {
        I2c {
            options: 0,
            speed_adjust: 0,
            sda_pin: self.sda_pin,
            scl_pin: self.scl_pin,
            address,
            tx,
            rx_len,
        }
    }

    /// Set the EEPROM read pointer to the calibration area and read the
    /// whole record.
    pub fn read_calibration(&self) -> I2c {
        self.transaction(
            TDAC_EEPROM_ADDRESS,
            Bytes::from_static(&[TDAC_CAL_MEM_START]),
            TDAC_CAL_SIZE as u8,
        )
    }

    /// Write a raw code to one converter output. Nothing is read back.
    pub fn write_dac(&self, channel: OutputChannel, code: u16) -> I2c {
        let [hi, lo] = code.to_be_bytes();
        self.transaction(
            TDAC_DAC_ADDRESS,
            Bytes::from(vec![dac_selector(channel), hi, lo]),
            0,
        )
    }
}

impl Default for I2cBus {
    fn default() -> Self {
        Self {
            sda_pin: TDAC_DEFAULT_SCL_PIN + 1,
            scl_pin: TDAC_DEFAULT_SCL_PIN,
        }
    }
}

fn dac_selector(channel: OutputChannel) -> u8 {
    match channel {
        OutputChannel::A => 0x30,
        OutputChannel::B => 0x31,
    }
}
