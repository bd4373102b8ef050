use crate::command::{Command, ConfigIo, ConfigTimerClock, Feedback, FeedbackOp, ReadConfig, ReadMem, TimerCounterConfig};
use crate::error::LjError;
use crate::packet::{ExtendedCommand, Response, encode_request};
use crate::timer::{ClockBase, TimerMode};
use bytes::Bytes;

fn hex_bytes(hex_data: &str) -> Bytes {
    Bytes::from(hex::decode(hex_data).expect("Failed to decode hex"))
}

#[test]
fn test_read_config_request() {
    let packet = ReadConfig.encode().unwrap();
    let mut expected = hex::decode("0bf80a080000").unwrap();
    expected.extend_from_slice(&[0u8; 20]);
    assert_eq!(packet.as_ref(), expected.as_slice());
}

#[test]
fn test_read_mem_request() {
    let packet = ReadMem { block: 0 }.encode().unwrap();
    assert_eq!(packet, hex_bytes("27f8012d00000000"));
}

#[test]
fn test_config_io_request() {
    let command = ConfigIo::digital(TimerCounterConfig::new().with_pin_offset(4), false);
    assert_eq!(command.encode().unwrap(), hex_bytes("4ef8030b4700070040000000"));
}

#[test]
fn test_config_timer_clock_request() {
    let command = ConfigTimerClock {
        base: ClockBase::Mhz48,
        divisor: 96,
    };
    assert_eq!(command.encode().unwrap(), hex_bytes("ebf8020ae60000008660"));
}

#[test]
fn test_feedback_timer_config_request() {
    let command = Feedback {
        echo: 7,
        ops: vec![FeedbackOp::TimerConfig {
            timer: 0,
            mode: TimerMode::FrequencyOutput,
            value: 250,
        }],
    };
    let packet = command.encode().unwrap();
    assert_eq!(packet.len(), 12);
    assert_eq!(&packet[6..], &[7, 43, 7, 250, 0, 0]);
}

#[test]
fn test_feedback_dac16_request() {
    let command = Feedback {
        echo: 1,
        ops: vec![FeedbackOp::Dac16 {
            channel: crate::calibration::OutputChannel::B,
            value: 0x1234,
        }],
    };
    let packet = command.encode().unwrap();
    assert_eq!(packet.len(), 10);
    assert_eq!(&packet[6..], &[1, 39, 0x34, 0x12]);
}

#[test]
fn test_decode_device_config() {
    let mut payload = vec![0u8, 0, 0];
    payload.extend_from_slice(&0x0142u16.to_le_bytes());
    payload.extend_from_slice(&0x0262u16.to_le_bytes());
    payload.extend_from_slice(&0x011Eu16.to_le_bytes());
    payload.extend_from_slice(&320_012_345u32.to_le_bytes());
    payload.extend_from_slice(&3u16.to_le_bytes());
    payload.extend_from_slice(&[1, 0x40, 0x0F, 0xF0, 0x00, 0, 0, 0, 0, 0, 1, 0, 0, 0x86, 0x60, 0, 0x12]);
    assert_eq!(payload.len(), 32);

    let raw = encode_request(ExtendedCommand::ConfigU3, &payload).unwrap();
    let config = ReadConfig.decode(Response::validate(raw, 38).unwrap()).unwrap();
    assert_eq!(config.firmware_version.to_string(), "1.66");
    assert_eq!(config.bootloader_version.major, 2);
    assert_eq!(config.hardware_version.minor, 0x1E);
    assert_eq!(config.serial_number, 320_012_345);
    assert_eq!(config.product_id, 3);
    assert_eq!(config.local_id, 1);
    assert_eq!(config.timer_counter_mask, 0x40);
    assert_eq!(config.fio_analog, 0x0F);
    assert_eq!(config.fio_direction, 0xF0);
    assert_eq!(config.dac1_enable, 1);
    assert_eq!(config.clock_config, 0x86);
    assert_eq!(config.clock_divisor, 0x60);
    assert_eq!(config.version_info, 0x12);
}

#[test]
fn test_feedback_echo_mismatch() {
    let command = Feedback { echo: 5, ops: vec![] };
    let raw = encode_request(ExtendedCommand::Feedback, &[0, 0, 6, 0]).unwrap();
    let result = command.decode(Response::validate(raw, 10).unwrap());
    assert!(matches!(result, Err(LjError::EchoMismatch { sent: 5, received: 6 })));
}

#[test]
fn test_feedback_device_error_wins_over_echo() {
    let command = Feedback { echo: 5, ops: vec![] };
    let raw = encode_request(ExtendedCommand::Feedback, &[0x48, 1, 6, 0]).unwrap();
    let result = command.decode(Response::validate(raw, 10).unwrap());
    assert!(matches!(result, Err(LjError::Device { raw: 0x48, .. })));
}

#[test]
fn test_device_config_serializes() {
    let mut payload = vec![0u8; 32];
    payload[3..5].copy_from_slice(&0x0142u16.to_le_bytes());
    payload[9..13].copy_from_slice(&42u32.to_le_bytes());
    let raw = encode_request(ExtendedCommand::ConfigU3, &payload).unwrap();
    let config = ReadConfig.decode(Response::validate(raw, 38).unwrap()).unwrap();

    let json = serde_json::to_value(config).unwrap();
    assert_eq!(json["serial_number"], 42);
    assert_eq!(json["firmware_version"]["major"], 1);
    assert_eq!(json["firmware_version"]["minor"], 0x42);
}
