use nusb::transfer::TransferError;
use num_enum::{FromPrimitive, IntoPrimitive};
use thiserror::Error;

/// The primary error type for the `lju3-lib` library.
#[derive(Error, Debug)]
pub enum LjError {
    #[error("USB device not found. Is the LabJack (product id {0}) connected?")]
    DeviceNotFound(u16),

    #[error("USB error: {0}")]
    Usb(#[from] nusb::Error),

    #[error("USB transfer error: {0}")]
    Transfer(#[from] TransferError),

    #[error("Timeout during USB operation: {0}")]
    Timeout(#[from] tokio::time::error::Elapsed),

    /// The transport moved fewer bytes than the fixed packet size.
    #[error("Communication failure during {stage}: expected {expected} bytes, got {actual}")]
    Communication {
        stage: &'static str,
        expected: usize,
        actual: usize,
    },

    /// The device answered with the 0xB8B8 sentinel.
    #[error("Device rejected the request checksum")]
    ChecksumRejected,

    #[error("Response checksum mismatch: header says {expected:#06x}, computed {actual:#06x}")]
    ChecksumMismatch { expected: u16, actual: u16 },

    #[error("Device reported error {code:?} ({raw:#04x})")]
    Device { code: DeviceErrorCode, raw: u8 },

    #[error("Feedback echo mismatch: sent {sent}, got {received}")]
    EchoMismatch { sent: u8, received: u8 },

    /// Nothing acknowledged the address byte of an I2C transaction.
    #[error("No I2C acknowledge from address {address:#04x}")]
    I2cNack { address: u8 },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LjError {
    pub(crate) fn device(raw: u8) -> Self {
        LjError::Device {
            code: DeviceErrorCode::from_primitive(raw),
            raw,
        }
    }

    /// Whether repeating the same exchange has a chance of succeeding.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LjError::Communication { .. } | LjError::ChecksumRejected | LjError::Timeout(_)
        )
    }
}

/// Error codes reported in the error byte of UD-family responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, FromPrimitive)]
#[repr(u8)]
pub enum DeviceErrorCode {
    ScratchWriteFail = 0x01,
    ScratchEraseFail = 0x02,
    DataBufferOverflow = 0x03,
    Adc0BufferOverflow = 0x04,
    FunctionInvalid = 0x05,
    SwdtTimeInvalid = 0x06,
    XbrConfigError = 0x07,
    FlashWriteFail = 0x10,
    FlashEraseFail = 0x11,
    FlashJumpFail = 0x12,
    FlashPspTimeout = 0x13,
    FlashAbortReceived = 0x14,
    FlashPageMismatch = 0x15,
    FlashBlockMismatch = 0x16,
    FlashPageNotInCodeArea = 0x17,
    MemIllegalAddress = 0x18,
    FlashLocked = 0x19,
    InvalidBlock = 0x1A,
    FlashIllegalPage = 0x1B,
    FlashTooManyBytes = 0x1C,
    FlashInvalidStringNum = 0x1D,
    SmbusInqOverflow = 0x20,
    SmbusOutqUnderflow = 0x21,
    SmbusCrcFailed = 0x22,
    Sht1xCommTimeOut = 0x28,
    Sht1xNoAck = 0x29,
    Sht1xCrcFailed = 0x2A,
    Sht1xTooManyWriteBytes = 0x2B,
    Sht1xTooManyReadBytes = 0x2C,
    Sht1xInvalidMode = 0x2D,
    Sht1xInvalidLine = 0x2E,
    StreamIsActive = 0x30,
    StreamTableInvalid = 0x31,
    StreamConfigInvalid = 0x32,
    StreamBadTriggerSource = 0x33,
    StreamNotRunning = 0x34,
    StreamInvalidTrigger = 0x35,
    StreamAdc0BufferOverflow = 0x36,
    StreamScanOverlap = 0x37,
    StreamSampleNumInvalid = 0x38,
    StreamBipolarGainInvalid = 0x39,
    StreamScanRateInvalid = 0x3A,
    StreamAutorecoverActive = 0x3B,
    StreamAutorecoverReport = 0x3C,
    StreamSoftPwmOn = 0x3D,
    StreamInvalidResolution = 0x3F,
    PcaInvalidMode = 0x40,
    PcaQuadratureAbError = 0x41,
    PcaQuadPulseSequence = 0x42,
    PcaBadClockSource = 0x43,
    PcaStreamActive = 0x44,
    PcaPwmStopModuleError = 0x45,
    PcaSequenceError = 0x46,
    PcaLineSequenceError = 0x47,
    TimerSharingError = 0x48,
    ExtOscNotStable = 0x50,
    InvalidPowerSetting = 0x51,
    PllNotLocked = 0x52,
    InvalidPin = 0x60,
    PinConfiguredForAnalog = 0x61,
    PinConfiguredForDigital = 0x62,
    IoTypeSynchError = 0x63,
    InvalidOffset = 0x64,
    IoTypeNotValid = 0x65,
    InvalidCode = 0x66,
    UartTimeout = 0x70,
    UartNotConnected = 0x71,
    UartNotEnabled = 0x72,
    I2cBusBusy = 0x74,
    TooManyBytes = 0x76,
    TooFewBytes = 0x77,
    DspPeriodDetectionError = 0x80,
    DspSignalOutOfRange = 0x81,
    ModbusResponseOverflow = 0x90,
    ModbusCommandOverflow = 0x91,

    #[num_enum(catch_all)]
    Unknown(u8),
}
