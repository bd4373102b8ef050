//! Session parameters, parsed from a JSON object.
//!
//! Keys starting with `_` are comments. Unknown keys and unknown values are
//! logged and skipped; only a missing host fails, at session open.

use crate::constants::{TDAC_DEFAULT_SCL_PIN, U3_PRODUCT_ID};
use crate::device::WriteMode;
use crate::error::LjError;
use serde_json::Value;
use tracing::warn;

/// Which outputs the session drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DacModule {
    /// LJTick-DAC on the host's I2C pins.
    #[default]
    TickDac,
    /// The host's own DAC0/DAC1.
    Native,
}

/// Supported host devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Model {
    U3,
}

impl Model {
    pub fn product_id(&self) -> u16 {
        match self {
            Model::U3 => U3_PRODUCT_ID,
        }
    }

    fn parse(name: &str) -> Option<Self> {
        match name {
            "U3" => Some(Model::U3),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub module: DacModule,
    pub model: Option<Model>,
    pub square_wave_hz: Option<u32>,
    pub write_mode: WriteMode,
    /// I2C clock pin of the LJTick; data is on the next pin.
    pub dac_pin: u8,
    pub timer_pin_offset: u8,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            module: DacModule::TickDac,
            model: None,
            square_wave_hz: None,
            write_mode: WriteMode::Acknowledged,
            dac_pin: TDAC_DEFAULT_SCL_PIN,
            timer_pin_offset: 4,
        }
    }
}

impl SessionConfig {
    pub fn new(model: Model) -> Self {
        Self {
            model: Some(model),
            ..Self::default()
        }
    }

    pub fn with_module(mut self, module: DacModule) -> Self {
        self.module = module;
        self
    }

    pub fn with_square_wave(mut self, hz: u32) -> Self {
        self.square_wave_hz = Some(hz);
        self
    }

    pub fn with_write_mode(mut self, mode: WriteMode) -> Self {
        self.write_mode = mode;
        self
    }

    pub fn with_dac_pin(mut self, pin: u8) -> Self {
        self.dac_pin = pin;
        self
    }

    pub fn with_timer_pin_offset(mut self, offset: u8) -> Self {
        self.timer_pin_offset = offset;
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self, LjError> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self, LjError> {
        let params = value
            .as_object()
            .ok_or_else(|| LjError::Config("parameters must be a JSON object".to_string()))?;

        let mut config = Self::default();
        for (key, val) in params {
            if key.starts_with('_') {
                continue;
            }
            match key.as_str() {
                "host" | "model" => match val.as_str().and_then(Model::parse) {
                    Some(model) => config.model = Some(model),
                    None => warn!("Unknown {}: {}", key, val),
                },
                "module" => match val.as_str() {
                    Some("ljtdac") => config.module = DacModule::TickDac,
                    Some("u3_dac") => config.module = DacModule::Native,
                    _ => warn!("Unknown module: {}", val),
                },
                "square_wave_hz" => {
                    let hz = val
                        .as_u64()
                        .filter(|&hz| hz > 0)
                        .and_then(|hz| u32::try_from(hz).ok())
                        .ok_or_else(|| LjError::Config(format!("square_wave_hz must be a positive integer, got {val}")))?;
                    config.square_wave_hz = Some(hz);
                }
                "fast_write" => {
                    let fast = val
                        .as_bool()
                        .ok_or_else(|| LjError::Config(format!("fast_write must be a boolean, got {val}")))?;
                    config.write_mode = if fast { WriteMode::Fast } else { WriteMode::Acknowledged };
                }
                "dac_pin" => config.dac_pin = pin_value(key, val)?,
                "timer_pin_offset" => config.timer_pin_offset = pin_value(key, val)?,
                _ => warn!("Unknown parameter \"{}\"", key),
            }
        }
        Ok(config)
    }

    /// Check pin assignments before any command is sent.
    pub fn validate(&self) -> Result<(), LjError> {
        if self.dac_pin > 14 {
            return Err(LjError::InvalidArgument(format!(
                "dac_pin {} leaves no room for the data pin",
                self.dac_pin
            )));
        }
        if self.timer_pin_offset > 15 {
            return Err(LjError::InvalidArgument(format!(
                "timer_pin_offset {} does not fit in 4 bits",
                self.timer_pin_offset
            )));
        }
        if self.module == DacModule::TickDac
            && self.square_wave_hz.is_some()
            && (self.timer_pin_offset == self.dac_pin || self.timer_pin_offset == self.dac_pin + 1)
        {
            return Err(LjError::InvalidArgument(format!(
                "timer output on pin {} collides with the LJTick-DAC on pins {}/{}",
                self.timer_pin_offset,
                self.dac_pin,
                self.dac_pin + 1
            )));
        }
        Ok(())
    }
}

fn pin_value(key: &str, val: &Value) -> Result<u8, LjError> {
    val.as_u64()
        .and_then(|pin| u8::try_from(pin).ok())
        .ok_or_else(|| LjError::Config(format!("{key} must be a small non-negative integer, got {val}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_keys_and_skips_comments() {
        let config = SessionConfig::from_json_str(
            r#"{
                "_comment": "bench setup",
                "host": "U3",
                "square_wave_hz": 1000,
                "fast_write": true,
                "dac_pin": 6,
                "timer_pin_offset": 4
            }"#,
        )
        .unwrap();
        assert_eq!(config.model, Some(Model::U3));
        assert_eq!(config.module, DacModule::TickDac);
        assert_eq!(config.square_wave_hz, Some(1000));
        assert_eq!(config.write_mode, WriteMode::Fast);
        assert_eq!(config.dac_pin, 6);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn unknown_keys_and_values_are_not_fatal() {
        let config = SessionConfig::from_json_str(r#"{"model": "U6", "colour": "blue", "module": "x"}"#).unwrap();
        assert_eq!(config.model, None);
        assert_eq!(config.module, DacModule::TickDac);
    }

    #[test]
    fn native_module() {
        let config = SessionConfig::from_json_str(r#"{"model": "U3", "module": "u3_dac"}"#).unwrap();
        assert_eq!(config.module, DacModule::Native);
        assert_eq!(config.model.unwrap().product_id(), 3);
    }

    #[test]
    fn malformed_values_are_errors() {
        assert!(matches!(
            SessionConfig::from_json_str(r#"{"square_wave_hz": 0}"#),
            Err(LjError::Config(_))
        ));
        assert!(matches!(
            SessionConfig::from_json_str(r#"{"fast_write": "yes"}"#),
            Err(LjError::Config(_))
        ));
        assert!(matches!(SessionConfig::from_json_str("[1, 2]"), Err(LjError::Config(_))));
        assert!(matches!(SessionConfig::from_json_str("{"), Err(LjError::Json(_))));
    }

    #[test]
    fn timer_pin_collision() {
        let config = SessionConfig::new(Model::U3).with_square_wave(100);
        assert!(matches!(config.validate(), Err(LjError::InvalidArgument(_))));
        assert!(config.with_timer_pin_offset(6).validate().is_ok());
    }
}
