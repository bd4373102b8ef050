//! Common test utilities: a scripted transport and response builders

// Shared across test files, not every helper is used by each of them
#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use lju3_lib::calibration::f64_to_fixed;
use lju3_lib::constants::CAL_BLOCK_SIZE;
use lju3_lib::error::LjError;
use lju3_lib::packet::{ExtendedCommand, encode_request};
use lju3_lib::transport::Transport;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Everything written through a [`MockTransport`], one entry per write.
pub type SentLog = Arc<Mutex<Vec<Vec<u8>>>>;

/// A [`Transport`] that answers each read with the next scripted reply.
///
/// Writes are recorded but not matched; tests inspect the log afterwards.
/// Once the script is exhausted every read comes back empty.
#[derive(Debug, Default)]
pub struct MockTransport {
    replies: VecDeque<Bytes>,
    sent: SentLog,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a raw reply.
    pub fn reply(&mut self, raw: Bytes) -> &mut Self {
        self.replies.push_back(raw);
        self
    }

    /// Handle on the write log that outlives the transport.
    pub fn sent_log(&self) -> SentLog {
        Arc::clone(&self.sent)
    }

    pub fn remaining_replies(&self) -> usize {
        self.replies.len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn write(&mut self, data: &[u8]) -> Result<usize, LjError> {
        self.sent.lock().unwrap().push(data.to_vec());
        Ok(data.len())
    }

    async fn read(&mut self, max_len: usize) -> Result<Bytes, LjError> {
        let raw = self.replies.pop_front().unwrap_or_default();
        Ok(raw.slice(..raw.len().min(max_len)))
    }
}

pub fn sent(log: &SentLog) -> Vec<Vec<u8>> {
    log.lock().unwrap().clone()
}

/// Frame a response payload the way the device does.
pub fn frame(command: ExtendedCommand, payload: &[u8]) -> Bytes {
    encode_request(command, payload).unwrap()
}

pub const SERIAL_NUMBER: u32 = 320_012_345;

/// ConfigU3 answer for a U3-HV with firmware 1.46.
pub fn config_u3_reply() -> Bytes {
    let mut payload = vec![0u8, 0, 0];
    payload.extend_from_slice(&0x012Eu16.to_le_bytes());
    payload.extend_from_slice(&0x0262u16.to_le_bytes());
    payload.extend_from_slice(&0x011Eu16.to_le_bytes());
    payload.extend_from_slice(&SERIAL_NUMBER.to_le_bytes());
    payload.extend_from_slice(&3u16.to_le_bytes());
    payload.extend_from_slice(&[1, 0x40, 0x0F, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x02, 0, 0, 0x12]);
    frame(ExtendedCommand::ConfigU3, &payload)
}

pub fn config_io_reply(timer_counter: u8, dac1_enable: u8) -> Bytes {
    frame(ExtendedCommand::ConfigIo, &[0, 0, timer_counter, dac1_enable, 0, 0])
}

pub fn timer_clock_reply(clock: u8, divisor: u8) -> Bytes {
    frame(ExtendedCommand::ConfigTimerClock, &[0, 0, clock, divisor])
}

pub fn feedback_reply(echo: u8) -> Bytes {
    frame(ExtendedCommand::Feedback, &[0, 0, echo])
}

pub fn read_mem_reply(block: &[u8; CAL_BLOCK_SIZE]) -> Bytes {
    let mut payload = vec![0u8, 0];
    payload.extend_from_slice(block);
    frame(ExtendedCommand::ReadMem, &payload)
}

pub fn i2c_reply(data: &[u8]) -> Bytes {
    i2c_reply_with_acks(u32::MAX, data)
}

/// I2C answer when nothing on the bus pulled SDA low: no acks, all-0xFF data.
pub fn i2c_nack_reply(rx_len: usize) -> Bytes {
    i2c_reply_with_acks(0, &vec![0xFF; rx_len])
}

fn i2c_reply_with_acks(acks: u32, data: &[u8]) -> Bytes {
    let mut payload = vec![0u8, 0];
    payload.extend_from_slice(&acks.to_le_bytes());
    payload.extend_from_slice(data);
    frame(ExtendedCommand::I2c, &payload)
}

/// A well-formed response carrying a device error byte.
pub fn error_reply(command: ExtendedCommand, error: u8, payload_len: usize) -> Bytes {
    let mut payload = vec![0u8; payload_len];
    payload[0] = error;
    frame(command, &payload)
}

fn put_fixed(out: &mut [u8], value: f64) {
    out.copy_from_slice(&f64_to_fixed(value).to_le_bytes());
}

/// Host DAC0: 48 counts/V + 1, DAC1: 50 counts/V + 0.5 (8-bit scale).
pub fn u3_calibration_blocks() -> [[u8; CAL_BLOCK_SIZE]; 5] {
    let mut blocks = [[0u8; CAL_BLOCK_SIZE]; 5];
    put_fixed(&mut blocks[0][0..8], 0.000_037_2);
    put_fixed(&mut blocks[1][0..8], 48.0);
    put_fixed(&mut blocks[1][8..16], 1.0);
    put_fixed(&mut blocks[1][16..24], 50.0);
    put_fixed(&mut blocks[1][24..32], 0.5);
    put_fixed(&mut blocks[2][8..16], 2.44);
    blocks
}

pub const TICK_SERIAL_NUMBER: u32 = 0x0012_3456;

/// LJTick-DAC record: A is 3158.5 counts/V around 32768, B 3160.25 around 32700.
pub fn tick_dac_record() -> [u8; 36] {
    let mut record = [0u8; 36];
    put_fixed(&mut record[0..8], 3158.5);
    put_fixed(&mut record[8..16], 32768.0);
    put_fixed(&mut record[16..24], 3160.25);
    put_fixed(&mut record[24..32], 32700.0);
    record[32..36].copy_from_slice(&TICK_SERIAL_NUMBER.to_le_bytes());
    record
}

/// Script the replies for a plain session open: config, ConfigIO, five
/// calibration blocks and, with `tick_dac`, the LJTick record.
pub fn script_open(mock: &mut MockTransport, timer_counter: u8, dac1_enable: u8, tick_dac: bool) {
    mock.reply(config_u3_reply());
    mock.reply(config_io_reply(timer_counter, dac1_enable));
    for block in u3_calibration_blocks().iter() {
        mock.reply(read_mem_reply(block));
    }
    if tick_dac {
        mock.reply(i2c_reply(&tick_dac_record()));
    }
}

/// Offset of the first transmitted byte in an I2C request.
pub const I2C_TX_OFFSET: usize = 14;
