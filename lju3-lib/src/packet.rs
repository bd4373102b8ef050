//! Extended command framing shared by every request and response.
//!
//! Every packet starts with a 6-byte header:
//!
//! | byte | field              |
//! |------|--------------------|
//! | 0    | checksum8          |
//! | 1    | command (`0xF8`)   |
//! | 2    | number of data words |
//! | 3    | extended command   |
//! | 4-5  | checksum16 (LE)    |
//!
//! `checksum16` covers bytes `6..`, `checksum8` covers bytes `1..6`.

use crate::checksum::{checksum8, checksum16};
use crate::constants::{BAD_CHECKSUM_SENTINEL, EXTENDED_COMMAND, EXTENDED_HEADER_SIZE, MAX_PACKET_SIZE};
use crate::error::LjError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Extended command opcodes implemented by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ExtendedCommand {
    Feedback = 0x00,
    ConfigU3 = 0x08,
    ConfigTimerClock = 0x0A,
    ConfigIo = 0x0B,
    ReadMem = 0x2D,
    I2c = 0x3B,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtendedHeader {
    pub checksum8: u8,
    pub command: u8,
    pub n_data_words: u8,
    pub extended_command: u8,
    pub checksum16: u16,
}

impl TryFrom<&[u8]> for ExtendedHeader {
    type Error = LjError;

    fn try_from(mut bytes: &[u8]) -> Result<Self, Self::Error> {
        if bytes.remaining() < EXTENDED_HEADER_SIZE {
            return Err(LjError::Communication {
                stage: "header",
                expected: EXTENDED_HEADER_SIZE,
                actual: bytes.remaining(),
            });
        }
        Ok(Self {
            checksum8: bytes.get_u8(),
            command: bytes.get_u8(),
            n_data_words: bytes.get_u8(),
            extended_command: bytes.get_u8(),
            checksum16: bytes.get_u16_le(),
        })
    }
}

/// Frame `payload` behind an extended header and stamp both checksums.
///
/// An odd-length payload gets one zero pad byte so that the packet is a whole
/// number of 16-bit words.
pub fn encode_request(command: ExtendedCommand, payload: &[u8]) -> Result<Bytes, LjError> {
    let padded_len = payload.len() + payload.len() % 2;
    let total = EXTENDED_HEADER_SIZE + padded_len;
    if total > MAX_PACKET_SIZE {
        return Err(LjError::InvalidArgument(format!(
            "{command:?} packet would be {total} bytes, limit is {MAX_PACKET_SIZE}"
        )));
    }

    let mut buf = BytesMut::with_capacity(total);
    buf.put_bytes(0, EXTENDED_HEADER_SIZE);
    buf.extend_from_slice(payload);
    if padded_len != payload.len() {
        buf.put_u8(0);
    }

    buf[1] = EXTENDED_COMMAND;
    buf[2] = ((total - EXTENDED_HEADER_SIZE) / 2) as u8;
    buf[3] = command.into();
    let cs16 = checksum16(&buf[EXTENDED_HEADER_SIZE..]);
    buf[4..6].copy_from_slice(&cs16.to_le_bytes());
    buf[0] = checksum8(&buf[1..EXTENDED_HEADER_SIZE]);

    Ok(buf.freeze())
}

/// Padded size of a packet carrying `payload_len` bytes after the header.
pub fn packet_len(payload_len: usize) -> usize {
    EXTENDED_HEADER_SIZE + payload_len + payload_len % 2
}

/// A response whose length and checksum16 have been verified.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub header: ExtendedHeader,
    /// Everything after the header, up to the expected length.
    pub payload: Bytes,
}

impl Response {
    /// Check the length and checksum of a raw response.
    ///
    /// A short read whose first two bytes are `0xB8B8` means the device
    /// rejected our checksum; any other short read is a communication
    /// failure.
    pub fn validate(raw: Bytes, expected_len: usize) -> Result<Self, LjError> {
        if raw.len() < expected_len {
            if raw.len() >= 2 && u16::from_le_bytes([raw[0], raw[1]]) == BAD_CHECKSUM_SENTINEL {
                return Err(LjError::ChecksumRejected);
            }
            return Err(LjError::Communication {
                stage: "read",
                expected: expected_len,
                actual: raw.len(),
            });
        }

        let raw = raw.slice(..expected_len);
        let header = ExtendedHeader::try_from(raw.as_ref())?;
        let computed = checksum16(&raw[EXTENDED_HEADER_SIZE..]);
        if header.checksum16 != computed {
            return Err(LjError::ChecksumMismatch {
                expected: header.checksum16,
                actual: computed,
            });
        }

        Ok(Self {
            header,
            payload: raw.slice(EXTENDED_HEADER_SIZE..),
        })
    }

    /// The device error byte, first byte after the header.
    pub fn error_code(&self) -> u8 {
        self.payload.first().copied().unwrap_or(0)
    }

    /// Turn a non-zero device error byte into [`LjError::Device`].
    pub fn check_error(&self) -> Result<(), LjError> {
        match self.error_code() {
            0 => Ok(()),
            raw => Err(LjError::device(raw)),
        }
    }
}
