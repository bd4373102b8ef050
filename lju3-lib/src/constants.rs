// Protocol constants for the LabJack U3 and the LJTick-DAC

/// LabJack USB vendor id
pub const VID: u16 = 0x0CD5;

/// U3 product id
pub const U3_PRODUCT_ID: u16 = 3;

pub const ENDPOINT_OUT: u8 = 0x01;
pub const ENDPOINT_IN: u8 = 0x82;

/// Size of the extended command header (6 bytes)
pub const EXTENDED_HEADER_SIZE: usize = 6;

/// Command byte marking an extended command
pub const EXTENDED_COMMAND: u8 = 0xF8;

/// First two bytes of the short reply sent when the device rejects our checksum
pub const BAD_CHECKSUM_SENTINEL: u16 = 0xB8B8;

/// Number of 32-byte calibration blocks on the U3
pub const CAL_BLOCK_COUNT: u8 = 5;

/// Size of one calibration memory block (32 bytes)
pub const CAL_BLOCK_SIZE: usize = 32;

/// 8-bit I2C address byte of the LJTick-DAC calibration EEPROM
pub const TDAC_EEPROM_ADDRESS: u8 = 0xA0;

/// 8-bit I2C address byte of the LJTick-DAC converter
pub const TDAC_DAC_ADDRESS: u8 = 0x24;

/// EEPROM address where the LJTick-DAC calibration constants start
pub const TDAC_CAL_MEM_START: u8 = 0x40;

/// Size of the LJTick-DAC calibration record (36 bytes)
pub const TDAC_CAL_SIZE: usize = 36;

/// Default I2C clock pin (FIO4); data sits on the next pin
pub const TDAC_DEFAULT_SCL_PIN: u8 = 4;

/// Largest packet the U3 accepts or returns (one full-speed bulk packet)
pub const MAX_PACKET_SIZE: usize = 64;
