//! Request/response layouts for the supported extended commands.
//!
//! Each command knows its opcode, how to lay out the bytes after the header,
//! how long the answer is and how to decode it. Framing and checksums are
//! handled by [`crate::packet`].

use crate::calibration::OutputChannel;
use crate::constants::{CAL_BLOCK_COUNT, CAL_BLOCK_SIZE, MAX_PACKET_SIZE};
use crate::error::LjError;
use crate::packet::{ExtendedCommand, Response, encode_request, packet_len};
use crate::timer::{ClockBase, TimerMode, TimerSolution};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use modular_bitfield::prelude::*;
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// One extended command exchange.
pub trait Command {
    type Reply;

    const EXTENDED_COMMAND: ExtendedCommand;

    /// Bytes following the extended header, before padding.
    fn payload(&self) -> Result<Bytes, LjError>;

    /// Total size of the expected response, header included.
    fn response_len(&self) -> usize;

    fn decode(&self, response: Response) -> Result<Self::Reply, LjError>;

    fn encode(&self) -> Result<Bytes, LjError> {
        encode_request(Self::EXTENDED_COMMAND, &self.payload()?)
    }
}

// --- Bitfields ---

/// ConfigIO write mask: only flagged fields are applied.
#[bitfield(bytes = 1)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoWriteMask {
    pub timer_counter: bool,
    pub dac1_enable: bool,
    pub fio_analog: bool,
    pub eio_analog: bool,
    #[skip]
    __: B4,
}

/// TimerCounterConfig byte.
#[bitfield(bytes = 1)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerCounterConfig {
    pub timers_enabled: B2,
    pub counter0: bool,
    pub counter1: bool,
    /// First FIO pin used by timers and counters.
    pub pin_offset: B4,
}

/// TimerClockConfig byte.
#[bitfield(bytes = 1)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockConfig {
    pub base: B3,
    #[skip]
    __: B4,
    pub write: bool,
}

// --- ConfigU3 (read only) ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Version {
    pub major: u8,
    pub minor: u8,
}

impl From<u16> for Version {
    fn from(raw: u16) -> Self {
        Self {
            major: (raw >> 8) as u8,
            minor: raw as u8,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.major, self.minor)
    }
}

/// Device configuration as reported by ConfigU3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeviceConfig {
    pub firmware_version: Version,
    pub bootloader_version: Version,
    pub hardware_version: Version,
    pub serial_number: u32,
    pub product_id: u16,
    pub local_id: u8,
    pub timer_counter_mask: u8,
    pub fio_analog: u8,
    pub fio_direction: u8,
    pub fio_state: u8,
    pub eio_analog: u8,
    pub eio_direction: u8,
    pub eio_state: u8,
    pub cio_direction: u8,
    pub cio_state: u8,
    pub dac1_enable: u8,
    pub dac0: u8,
    pub dac1: u8,
    pub clock_config: u8,
    pub clock_divisor: u8,
    pub compatibility: u8,
    pub version_info: u8,
}

/// ConfigU3 with an empty write mask.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadConfig;

impl Command for ReadConfig {
    type Reply = DeviceConfig;

    const EXTENDED_COMMAND: ExtendedCommand = ExtendedCommand::ConfigU3;

    fn payload(&self) -> Result<Bytes, LjError> {
        Ok(Bytes::from_static(&[0u8; 20]))
    }

    fn response_len(&self) -> usize {
        38
    }

    fn decode(&self, response: Response) -> Result<DeviceConfig, LjError> {
        response.check_error()?;
        let mut p = response.payload;
        p.advance(3);
        Ok(DeviceConfig {
            firmware_version: p.get_u16_le().into(),
            bootloader_version: p.get_u16_le().into(),
            hardware_version: p.get_u16_le().into(),
            serial_number: p.get_u32_le(),
            product_id: p.get_u16_le(),
            local_id: p.get_u8(),
            timer_counter_mask: p.get_u8(),
            fio_analog: p.get_u8(),
            fio_direction: p.get_u8(),
            fio_state: p.get_u8(),
            eio_analog: p.get_u8(),
            eio_direction: p.get_u8(),
            eio_state: p.get_u8(),
            cio_direction: p.get_u8(),
            cio_state: p.get_u8(),
            dac1_enable: p.get_u8(),
            dac0: p.get_u8(),
            dac1: p.get_u8(),
            clock_config: p.get_u8(),
            clock_divisor: p.get_u8(),
            compatibility: p.get_u8(),
            version_info: p.get_u8(),
        })
    }
}

// --- ConfigIO ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigIo {
    pub write_mask: IoWriteMask,
    pub timer_counter: TimerCounterConfig,
    pub dac1_enable: bool,
    pub fio_analog: u8,
    pub eio_analog: u8,
}

impl ConfigIo {
    /// Apply timer/counter config and DAC1 enable, and make every FIO pin digital.
    pub fn digital(timer_counter: TimerCounterConfig, dac1_enable: bool) -> Self {
        Self {
            write_mask: IoWriteMask::new()
                .with_timer_counter(true)
                .with_dac1_enable(true)
                .with_fio_analog(true),
            timer_counter,
            dac1_enable,
            fio_analog: 0,
            eio_analog: 0,
        }
    }
}

/// Values the device applied, echoed back by ConfigIO.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigIoReply {
    pub timer_counter: TimerCounterConfig,
    pub dac1_enable: bool,
    pub fio_analog: u8,
    pub eio_analog: u8,
}

impl Command for ConfigIo {
    type Reply = ConfigIoReply;

    const EXTENDED_COMMAND: ExtendedCommand = ExtendedCommand::ConfigIo;

    fn payload(&self) -> Result<Bytes, LjError> {
        let mut buf = BytesMut::with_capacity(6);
        buf.put_u8(self.write_mask.into_bytes()[0]);
        buf.put_u8(0);
        buf.put_u8(self.timer_counter.into_bytes()[0]);
        buf.put_u8(self.dac1_enable as u8);
        buf.put_u8(self.fio_analog);
        buf.put_u8(self.eio_analog);
        Ok(buf.freeze())
    }

    fn response_len(&self) -> usize {
        12
    }

    fn decode(&self, response: Response) -> Result<ConfigIoReply, LjError> {
        response.check_error()?;
        let mut p = response.payload;
        p.advance(2);
        Ok(ConfigIoReply {
            timer_counter: TimerCounterConfig::from_bytes([p.get_u8()]),
            dac1_enable: p.get_u8() != 0,
            fio_analog: p.get_u8(),
            eio_analog: p.get_u8(),
        })
    }
}

// --- ConfigTimerClock ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigTimerClock {
    pub base: ClockBase,
    /// Stored divisor, 0 means 256.
    pub divisor: u8,
}

impl From<&TimerSolution> for ConfigTimerClock {
    fn from(solution: &TimerSolution) -> Self {
        Self {
            base: solution.base,
            divisor: solution.divisor_byte(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigTimerClockReply {
    pub clock: ClockConfig,
    pub divisor: u8,
}

impl Command for ConfigTimerClock {
    type Reply = ConfigTimerClockReply;

    const EXTENDED_COMMAND: ExtendedCommand = ExtendedCommand::ConfigTimerClock;

    fn payload(&self) -> Result<Bytes, LjError> {
        let clock = ClockConfig::new().with_base(self.base.selector()).with_write(true);
        Ok(Bytes::from(vec![0, 0, clock.into_bytes()[0], self.divisor]))
    }

    fn response_len(&self) -> usize {
        10
    }

    fn decode(&self, response: Response) -> Result<ConfigTimerClockReply, LjError> {
        response.check_error()?;
        let mut p = response.payload;
        p.advance(2);
        Ok(ConfigTimerClockReply {
            clock: ClockConfig::from_bytes([p.get_u8()]),
            divisor: p.get_u8(),
        })
    }
}

// --- Feedback ---

/// A single feedback IO operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackOp {
    /// Timer0Config / Timer1Config.
    TimerConfig { timer: u8, mode: TimerMode, value: u16 },
    /// DAC0 / DAC1 with a 16-bit value.
    Dac16 { channel: OutputChannel, value: u16 },
}

impl FeedbackOp {
    fn io_type(&self) -> Result<u8, LjError> {
        match *self {
            FeedbackOp::TimerConfig { timer: 0, .. } => Ok(43),
            FeedbackOp::TimerConfig { timer: 1, .. } => Ok(45),
            FeedbackOp::TimerConfig { timer, .. } => {
                Err(LjError::InvalidArgument(format!("timer {timer} does not exist")))
            }
            FeedbackOp::Dac16 {
                channel: OutputChannel::A,
                ..
            } => Ok(38),
            FeedbackOp::Dac16 {
                channel: OutputChannel::B,
                ..
            } => Ok(39),
        }
    }

    fn put(&self, buf: &mut BytesMut) -> Result<(), LjError> {
        buf.put_u8(self.io_type()?);
        match *self {
            FeedbackOp::TimerConfig { mode, value, .. } => {
                buf.put_u8(mode.into());
                buf.put_u16_le(value);
            }
            FeedbackOp::Dac16 { value, .. } => buf.put_u16_le(value),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback {
    pub echo: u8,
    pub ops: Vec<FeedbackOp>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedbackReply {
    pub echo: u8,
}

impl Command for Feedback {
    type Reply = FeedbackReply;

    const EXTENDED_COMMAND: ExtendedCommand = ExtendedCommand::Feedback;

    fn payload(&self) -> Result<Bytes, LjError> {
        let mut buf = BytesMut::with_capacity(1 + 4 * self.ops.len());
        buf.put_u8(self.echo);
        for op in &self.ops {
            op.put(&mut buf)?;
        }
        Ok(buf.freeze())
    }

    fn response_len(&self) -> usize {
        // timer config and DAC writes return no data after the echo
        packet_len(3)
    }

    fn decode(&self, response: Response) -> Result<FeedbackReply, LjError> {
        let mut p = response.payload;
        let error = p.get_u8();
        let error_frame = p.get_u8();
        let echo = p.get_u8();
        if error != 0 {
            debug!(error, error_frame, "Feedback failed");
            return Err(LjError::device(error));
        }
        if echo != self.echo {
            return Err(LjError::EchoMismatch {
                sent: self.echo,
                received: echo,
            });
        }
        Ok(FeedbackReply { echo })
    }
}

// --- ReadMem ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadMem {
    pub block: u8,
}

impl Command for ReadMem {
    type Reply = [u8; CAL_BLOCK_SIZE];

    const EXTENDED_COMMAND: ExtendedCommand = ExtendedCommand::ReadMem;

    fn payload(&self) -> Result<Bytes, LjError> {
        if self.block >= CAL_BLOCK_COUNT {
            return Err(LjError::InvalidArgument(format!(
                "calibration block {} out of range 0..{}",
                self.block, CAL_BLOCK_COUNT
            )));
        }
        Ok(Bytes::from(vec![0, self.block]))
    }

    fn response_len(&self) -> usize {
        packet_len(2 + CAL_BLOCK_SIZE)
    }

    fn decode(&self, response: Response) -> Result<[u8; CAL_BLOCK_SIZE], LjError> {
        response.check_error()?;
        let mut block = [0u8; CAL_BLOCK_SIZE];
        block.copy_from_slice(&response.payload[2..2 + CAL_BLOCK_SIZE]);
        Ok(block)
    }
}

// --- I2C ---

/// An I2C transaction tunnelled through the U3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct I2c {
    pub options: u8,
    pub speed_adjust: u8,
    pub sda_pin: u8,
    pub scl_pin: u8,
    /// 8-bit address byte (7-bit address shifted left).
    pub address: u8,
    pub tx: Bytes,
    pub rx_len: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct I2cReply {
    /// One bit per acknowledged byte.
    pub acks: u32,
    pub data: Bytes,
}

impl I2cReply {
    /// Bit 0 of the ack array is the address byte.
    pub fn address_acked(&self) -> bool {
        self.acks & 1 != 0
    }
}

impl Command for I2c {
    type Reply = I2cReply;

    const EXTENDED_COMMAND: ExtendedCommand = ExtendedCommand::I2c;

    fn payload(&self) -> Result<Bytes, LjError> {
        let n_tx = u8::try_from(self.tx.len())
            .map_err(|_| LjError::InvalidArgument(format!("{} I2C bytes is too many", self.tx.len())))?;
        if self.response_len() > MAX_PACKET_SIZE {
            return Err(LjError::InvalidArgument(format!(
                "I2C read of {} bytes does not fit in one response",
                self.rx_len
            )));
        }
        let mut buf = BytesMut::with_capacity(8 + self.tx.len());
        buf.put_u8(self.options);
        buf.put_u8(self.speed_adjust);
        buf.put_u8(self.sda_pin);
        buf.put_u8(self.scl_pin);
        buf.put_u8(self.address);
        buf.put_u8(0);
        buf.put_u8(n_tx);
        buf.put_u8(self.rx_len);
        buf.extend_from_slice(&self.tx);
        Ok(buf.freeze())
    }

    fn response_len(&self) -> usize {
        packet_len(6 + self.rx_len as usize)
    }

    fn decode(&self, response: Response) -> Result<I2cReply, LjError> {
        response.check_error()?;
        let mut p = response.payload;
        p.advance(2);
        let acks = p.get_u32_le();
        Ok(I2cReply {
            acks,
            data: p.slice(..self.rx_len as usize),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_counter_bits() {
        let tc = TimerCounterConfig::new().with_pin_offset(4);
        assert_eq!(tc.into_bytes(), [0x40]);
        let tc = tc.with_timers_enabled(1).with_counter1(true);
        assert_eq!(tc.into_bytes(), [0x49]);
    }

    #[test]
    fn clock_config_bits() {
        let cc = ClockConfig::new().with_base(ClockBase::Mhz48.selector()).with_write(true);
        assert_eq!(cc.into_bytes(), [0x86]);
        assert_eq!(ClockConfig::from_bytes([0x83]).base(), 3);
    }

    #[test]
    fn write_mask_bits() {
        let io = ConfigIo::digital(TimerCounterConfig::new(), false);
        assert_eq!(io.write_mask.into_bytes(), [0x07]);
    }

    #[test]
    fn version_display() {
        assert_eq!(Version::from(0x0142).to_string(), "1.66");
        assert_eq!(Version::from(0x0205).to_string(), "2.05");
    }

    #[test]
    fn read_mem_rejects_block_five() {
        assert!(matches!(
            ReadMem { block: 5 }.encode(),
            Err(LjError::InvalidArgument(_))
        ));
    }

    #[test]
    fn feedback_rejects_timer_two() {
        let fb = Feedback {
            echo: 1,
            ops: vec![FeedbackOp::TimerConfig {
                timer: 2,
                mode: TimerMode::FrequencyOutput,
                value: 10,
            }],
        };
        assert!(matches!(fb.encode(), Err(LjError::InvalidArgument(_))));
    }

    #[test]
    fn response_lengths() {
        assert_eq!(ReadConfig.response_len(), 38);
        assert_eq!(ReadMem { block: 0 }.response_len(), 40);
        let fb = Feedback {
            echo: 0,
            ops: vec![],
        };
        assert_eq!(fb.response_len(), 10);
        let i2c = I2c {
            options: 0,
            speed_adjust: 0,
            sda_pin: 5,
            scl_pin: 4,
            address: 0xA0,
            tx: Bytes::from_static(&[0x40]),
            rx_len: 36,
        };
        assert_eq!(i2c.response_len(), 48);
        assert_eq!(I2c { rx_len: 3, ..i2c }.response_len(), 16);
    }
}
