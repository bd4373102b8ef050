use crate::calibration::{OutputChannel, TickDacCalibration, U3Calibration};
use crate::command::{
    Command, ConfigIo, ConfigIoReply, ConfigTimerClock, DeviceConfig, Feedback, FeedbackOp, I2c, I2cReply, ReadConfig,
    ReadMem,
};
use crate::constants::{CAL_BLOCK_COUNT, CAL_BLOCK_SIZE};
use crate::error::LjError;
use crate::i2c::I2cBus;
use crate::packet::Response;
use crate::timer::{self, TimerMode, TimerSolution};
use crate::transport::Transport;
use tracing::{debug, info};

/// Whether to wait for the acknowledgement of an add-on DAC write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Read and validate the response.
    #[default]
    Acknowledged,
    /// Skip the response read. Failed writes go unnoticed.
    Fast,
}

/// A U3 reachable through some transport.
///
/// Every call is one write followed by at most one read; there is never more
/// than one command in flight.
pub struct U3<T: Transport> {
    transport: T,
    echo: u8,
}

impl<T: Transport> U3<T> {
    pub fn new(transport: T) -> Self {
        Self { transport, echo: 0 }
    }

    /// Release the underlying transport.
    pub fn into_transport(self) -> T {
        self.transport
    }

    fn next_echo(&mut self) -> u8 {
        self.echo = self.echo.wrapping_add(1);
        self.echo
    }

    async fn send<C: Command>(&mut self, command: &C) -> Result<(), LjError> {
        let request = command.encode()?;
        let written = self.transport.write(&request).await?;
        if written < request.len() {
            return Err(LjError::Communication {
                stage: "write",
                expected: request.len(),
                actual: written,
            });
        }
        Ok(())
    }

    /// Send `command` and decode its validated response.
    pub async fn execute<C: Command>(&mut self, command: &C) -> Result<C::Reply, LjError> {
        self.send(command).await?;
        let expected = command.response_len();
        let raw = self.transport.read(expected).await?;
        let response = Response::validate(raw, expected)?;
        command.decode(response)
    }

    /// Send `command` without reading its response.
    pub async fn execute_unacknowledged<C: Command>(&mut self, command: &C) -> Result<(), LjError> {
        self.send(command).await
    }

    pub async fn read_config(&mut self) -> Result<DeviceConfig, LjError> {
        self.execute(&ReadConfig).await
    }

    pub async fn config_io(&mut self, config: &ConfigIo) -> Result<ConfigIoReply, LjError> {
        self.execute(config).await
    }

    pub async fn feedback(&mut self, ops: Vec<FeedbackOp>) -> Result<(), LjError> {
        let command = Feedback {
            echo: self.next_echo(),
            ops,
        };
        self.execute(&command).await?;
        Ok(())
    }

    pub async fn read_mem_block(&mut self, block: u8) -> Result<[u8; CAL_BLOCK_SIZE], LjError> {
        self.execute(&ReadMem { block }).await
    }

    /// Read calibration blocks 0 through 4, in order.
    pub async fn read_calibration(&mut self) -> Result<U3Calibration, LjError> {
        let mut blocks = [[0u8; CAL_BLOCK_SIZE]; CAL_BLOCK_COUNT as usize];
        for (block, slot) in (0..CAL_BLOCK_COUNT).zip(blocks.iter_mut()) {
            *slot = self.read_mem_block(block).await?;
        }
        Ok(U3Calibration::from_blocks(&blocks))
    }

    pub async fn i2c(&mut self, command: &I2c) -> Result<I2cReply, LjError> {
        self.execute(command).await
    }

    /// Run an I2C transaction and require the target to acknowledge its
    /// address. The U3 reports a missing target only through the ack bits.
    pub async fn i2c_acked(&mut self, command: &I2c) -> Result<I2cReply, LjError> {
        let reply = self.i2c(command).await?;
        if !reply.address_acked() {
            return Err(LjError::I2cNack {
                address: command.address,
            });
        }
        Ok(reply)
    }

    pub async fn read_tick_dac_calibration(&mut self, bus: &I2cBus) -> Result<TickDacCalibration, LjError> {
        let reply = self.i2c_acked(&bus.read_calibration()).await?;
        TickDacCalibration::try_from(reply.data.as_ref())
    }

    pub async fn write_tick_dac(
        &mut self,
        bus: &I2cBus,
        channel: OutputChannel,
        code: u16,
        mode: WriteMode,
    ) -> Result<(), LjError> {
        let command = bus.write_dac(channel, code);
        match mode {
            WriteMode::Acknowledged => {
                self.i2c_acked(&command).await?;
            }
            WriteMode::Fast => self.execute_unacknowledged(&command).await?,
        }
        Ok(())
    }

    /// Write a 16-bit code to one of the U3's own DACs.
    pub async fn write_dac16(&mut self, channel: OutputChannel, code: u16) -> Result<(), LjError> {
        self.feedback(vec![FeedbackOp::Dac16 { channel, value: code }]).await
    }

    /// Program timer 0 as a square wave as close to `requested_hz` as the
    /// clock allows. The timer must already be enabled through ConfigIO.
    pub async fn configure_square_wave(&mut self, requested_hz: u32) -> Result<TimerSolution, LjError> {
        let solution = timer::solve(requested_hz)
            .ok_or_else(|| LjError::InvalidArgument("square wave frequency must be positive".to_string()))?;

        let clock = self.execute(&ConfigTimerClock::from(&solution)).await?;
        debug!(clock = ?clock.clock, divisor = clock.divisor, "Timer clock configured");

        self.feedback(vec![FeedbackOp::TimerConfig {
            timer: 0,
            mode: TimerMode::FrequencyOutput,
            value: u16::from(solution.value_byte()),
        }])
        .await?;

        info!(
            requested_hz,
            achievable_hz = solution.achievable_hz,
            base = %solution.base,
            divisor = solution.divisor,
            value = solution.value,
            "Square wave configured"
        );
        Ok(solution)
    }
}
