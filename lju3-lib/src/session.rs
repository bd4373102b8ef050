//! A device session as seen by a control loop: open once, write a pair of
//! voltages per cycle, zero the outputs and close.

use crate::calibration::{OutputChannel, TickDacCalibration, U3Calibration};
use crate::command::{ConfigIo, DeviceConfig, TimerCounterConfig};
use crate::config::{DacModule, SessionConfig};
use crate::device::{U3, WriteMode};
use crate::error::LjError;
use crate::i2c::I2cBus;
use crate::timer::TimerSolution;
use crate::transport::Transport;
use tracing::{debug, info, warn};

/// The outputs a session drives, resolved once at open.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DacOutput {
    TickDac {
        bus: I2cBus,
        calibration: TickDacCalibration,
    },
    /// U3 DAC0/DAC1 in 16-bit mode.
    Native,
}

pub struct DacSession<T: Transport> {
    device: U3<T>,
    device_config: DeviceConfig,
    calibration: U3Calibration,
    output: DacOutput,
    write_mode: WriteMode,
    square_wave: Option<TimerSolution>,
}

impl<T: Transport> DacSession<T> {
    /// Configure the device behind `transport` for `config`.
    pub async fn open(transport: T, config: &SessionConfig) -> Result<Self, LjError> {
        config.validate()?;
        let model = config
            .model
            .ok_or_else(|| LjError::Config("didn't get a valid \"host\" param".to_string()))?;
        let mut device = U3::new(transport);

        let device_config = device.read_config().await?;
        info!(
            ?model,
            firmware = %device_config.firmware_version,
            hardware = %device_config.hardware_version,
            serial = device_config.serial_number,
            "Device configuration read"
        );
        debug!(?device_config, "Full device configuration");

        let timer_counter = TimerCounterConfig::new()
            .with_pin_offset(config.timer_pin_offset)
            .with_timers_enabled(config.square_wave_hz.is_some() as u8);
        let dac1_enable = config.module == DacModule::Native;
        let applied = device.config_io(&ConfigIo::digital(timer_counter, dac1_enable)).await?;
        debug!(
            timer_counter = ?applied.timer_counter,
            dac1_enable = applied.dac1_enable,
            fio_analog = applied.fio_analog,
            eio_analog = applied.eio_analog,
            "IO configuration applied"
        );

        let calibration = device.read_calibration().await?;
        debug!(?calibration, "Host calibration read");

        let output = match config.module {
            DacModule::TickDac => {
                let bus = I2cBus::tick(config.dac_pin)?;
                let calibration = device.read_tick_dac_calibration(&bus).await?;
                info!(
                    serial = calibration.serial_number,
                    dac_a_slope = calibration.dac_a.slope,
                    dac_a_offset = calibration.dac_a.offset,
                    dac_b_slope = calibration.dac_b.slope,
                    dac_b_offset = calibration.dac_b.offset,
                    "LJTick-DAC calibration read"
                );
                DacOutput::TickDac { bus, calibration }
            }
            DacModule::Native => DacOutput::Native,
        };

        let square_wave = match config.square_wave_hz {
            Some(hz) => Some(device.configure_square_wave(hz).await?),
            None => None,
        };

        if config.write_mode == WriteMode::Fast {
            match output {
                DacOutput::TickDac { .. } => warn!("Fast write mode: DAC write acknowledgements are not checked"),
                DacOutput::Native => warn!("Fast write mode has no effect on the U3's own DACs"),
            }
        }

        Ok(Self {
            device,
            device_config,
            calibration,
            output,
            write_mode: config.write_mode,
            square_wave,
        })
    }

    pub fn device_config(&self) -> &DeviceConfig {
        &self.device_config
    }

    pub fn calibration(&self) -> &U3Calibration {
        &self.calibration
    }

    pub fn output(&self) -> &DacOutput {
        &self.output
    }

    pub fn square_wave(&self) -> Option<&TimerSolution> {
        self.square_wave.as_ref()
    }

    /// Raw code that `volts` maps to on `channel`.
    pub fn code_for(&self, channel: OutputChannel, volts: f64) -> u16 {
        match &self.output {
            DacOutput::TickDac { calibration, .. } => calibration.dac(channel).voltage_to_code(volts),
            DacOutput::Native => self.calibration.dac(channel).scaled(256.0).voltage_to_code(volts),
        }
    }

    pub async fn write_voltage(&mut self, channel: OutputChannel, volts: f64) -> Result<(), LjError> {
        let code = self.code_for(channel, volts);
        debug!(%channel, volts, code, "DAC write");
        match self.output {
            DacOutput::TickDac { bus, .. } => self.device.write_tick_dac(&bus, channel, code, self.write_mode).await,
            DacOutput::Native => self.device.write_dac16(channel, code).await,
        }
    }

    /// Like [`write_voltage`](Self::write_voltage), by channel index.
    pub async fn write_channel(&mut self, index: usize, volts: f64) -> Result<(), LjError> {
        let channel = OutputChannel::try_from(index)?;
        self.write_voltage(channel, volts).await
    }

    /// Write both outputs, A first.
    pub async fn write_voltages(&mut self, a: f64, b: f64) -> Result<(), LjError> {
        self.write_voltage(OutputChannel::A, a).await?;
        self.write_voltage(OutputChannel::B, b).await
    }

    /// Zero both outputs and release the transport.
    ///
    /// Both zero writes are attempted even if the first fails; the first
    /// failure is returned.
    pub async fn close(mut self) -> (T, Result<(), LjError>) {
        let mut result = Ok(());
        for channel in OutputChannel::BOTH {
            if let Err(e) = self.write_voltage(channel, 0.0).await {
                warn!(%channel, error = %e, "Failed to zero output on close");
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        info!("Session closed");
        (self.device.into_transport(), result)
    }
}
