use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use clap_verbosity_flag::{InfoLevel, Verbosity};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use lju3_lib::config::{DacModule, Model};
use lju3_lib::i2c::I2cBus;
use lju3_lib::timer;
use lju3_lib::{DacSession, SessionConfig, U3, UsbTransport, WriteMode};

/// Drive a LabJack U3 and an LJTick-DAC from the command line.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON session parameters. Flags below override it.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Which outputs to drive.
    #[arg(short, long, value_enum)]
    module: Option<ModuleArg>,
    /// Square wave on timer 0, in Hz.
    #[arg(short, long)]
    square_wave: Option<u32>,
    /// Don't wait for DAC write acknowledgements.
    #[arg(long)]
    fast: bool,
    /// LJTick SCL pin (SDA is the next one).
    #[arg(long)]
    dac_pin: Option<u8>,
    /// Optional path to a file to write logs to, in addition to the console.
    #[arg(short, long)]
    log_file: Option<PathBuf>,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Print the device configuration and calibration.
    Info {
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Write a voltage pair, optionally hold it, then zero the outputs.
    Set {
        a: f64,
        b: f64,
        /// Seconds to hold before closing. Ctrl-C closes early.
        #[arg(long, default_value_t = 0.0)]
        hold: f64,
    },
    /// Show the clock settings for a square-wave frequency without touching a device.
    Frequency { hz: u32 },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ModuleArg {
    Ljtdac,
    U3Dac,
}

impl From<ModuleArg> for DacModule {
    fn from(arg: ModuleArg) -> Self {
        match arg {
            ModuleArg::Ljtdac => DacModule::TickDac,
            ModuleArg::U3Dac => DacModule::Native,
        }
    }
}

fn setup_logging(log_file_path: Option<PathBuf>, verbosity: &Verbosity<InfoLevel>) -> Result<Option<WorkerGuard>> {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .without_time();

    let (file_layer, guard) = if let Some(ref path) = log_file_path {
        let log_file = File::create(path).with_context(|| format!("Failed to create log file at: {:?}", path))?;
        let (non_blocking_writer, guard) = tracing_appender::non_blocking(log_file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking_writer)
            .with_ansi(false)
            .with_target(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    // INFO by default, DEBUG with -v (USB traffic), TRACE with -vv
    let filter = EnvFilter::builder()
        .with_default_directive(verbosity.tracing_level_filter().into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if let Some(path) = log_file_path {
        info!("Logging to file: {:?}", path);
    }

    Ok(guard)
}

fn load_config(cli: &Cli) -> Result<SessionConfig> {
    let mut config = match &cli.config {
        Some(path) => read_config_file(path)?,
        None => SessionConfig::new(Model::U3),
    };
    if let Some(module) = cli.module {
        config = config.with_module(module.into());
    }
    if let Some(hz) = cli.square_wave {
        config = config.with_square_wave(hz);
    }
    if cli.fast {
        config = config.with_write_mode(WriteMode::Fast);
    }
    if let Some(pin) = cli.dac_pin {
        config = config.with_dac_pin(pin);
    }
    Ok(config)
}

fn read_config_file(path: &Path) -> Result<SessionConfig> {
    let text = fs::read_to_string(path).with_context(|| format!("Failed to read config file {:?}", path))?;
    SessionConfig::from_json_str(&text).with_context(|| format!("Invalid config file {:?}", path))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = setup_logging(cli.log_file.clone(), &cli.verbose)?;

    let result = match cli.command {
        Cmd::Frequency { hz } => show_frequency(hz),
        Cmd::Info { json } => match load_config(&cli) {
            Ok(config) => show_info(&config, json).await,
            Err(e) => Err(e),
        },
        Cmd::Set { a, b, hold } => match load_config(&cli) {
            Ok(config) => set_voltages(&config, a, b, hold).await,
            Err(e) => Err(e),
        },
    };

    if let Err(e) = result {
        error!("{:?}", e);
        process::exit(1);
    }

    Ok(())
}

fn show_frequency(hz: u32) -> Result<()> {
    let solution = timer::solve(hz).context("Frequency must be positive")?;
    println!("Requested:  {} Hz", hz);
    println!("Clock base: {}", solution.base);
    println!("Divisor:    {} (stored as {})", solution.divisor, solution.divisor_byte());
    println!("Value:      {} (stored as {})", solution.value, solution.value_byte());
    println!("Achievable: {:.6} Hz", solution.achievable_hz);
    Ok(())
}

fn open_transport(config: &SessionConfig) -> Result<UsbTransport> {
    let model = config.model.context("No host model configured")?;
    UsbTransport::open(model.product_id()).context("Failed to open the LabJack")
}

async fn show_info(config: &SessionConfig, json: bool) -> Result<()> {
    config.validate()?;
    let mut device = U3::new(open_transport(config)?);
    let dc = device.read_config().await?;
    let cal = device.read_calibration().await?;

    let tick = if config.module == DacModule::TickDac {
        let bus = I2cBus::tick(config.dac_pin)?;
        match device.read_tick_dac_calibration(&bus).await {
            Ok(tdac) => Some((bus, tdac)),
            Err(e) => {
                warn!("No LJTick-DAC found on FIO{}: {}", bus.scl_pin, e);
                None
            }
        }
    } else {
        None
    };

    if json {
        let report = serde_json::json!({
            "device": dc,
            "calibration": cal,
            "tick_dac": tick.map(|(_, tdac)| tdac),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Device Info:");
    println!("  Serial: {}", dc.serial_number);
    println!("  Product ID: {}", dc.product_id);
    println!("  Local ID: {}", dc.local_id);
    println!("  Firmware: {}", dc.firmware_version);
    println!("  Bootloader: {}", dc.bootloader_version);
    println!("  Hardware: {}", dc.hardware_version);
    println!("  Timer/counter config: {:#04x}", dc.timer_counter_mask);
    println!("  FIO analog: {:#010b}  EIO analog: {:#010b}", dc.fio_analog, dc.eio_analog);
    println!("  DAC1 enabled: {}", dc.dac1_enable != 0);
    println!("Calibration:");
    println!("  DAC0: {:.4} counts/V, offset {:.4}", cal.dac0.slope, cal.dac0.offset);
    println!("  DAC1: {:.4} counts/V, offset {:.4}", cal.dac1.slope, cal.dac1.offset);
    println!("  Vref: {:.4} V", cal.vref);
    println!(
        "  LV AIN: {:.6e} V/count, offset {:.4} V",
        cal.lv_ain_single_ended.slope, cal.lv_ain_single_ended.offset
    );
    if let Some((bus, tdac)) = tick {
        println!("LJTick-DAC on FIO{}/FIO{}:", bus.scl_pin, bus.sda_pin);
        println!("  Serial: {}", tdac.serial_number);
        println!("  DAC A: {:.4} counts/V, offset {:.4}", tdac.dac_a.slope, tdac.dac_a.offset);
        println!("  DAC B: {:.4} counts/V, offset {:.4}", tdac.dac_b.slope, tdac.dac_b.offset);
    }
    Ok(())
}

async fn set_voltages(config: &SessionConfig, a: f64, b: f64, hold: f64) -> Result<()> {
    let hold = Duration::try_from_secs_f64(hold).context("Hold time must be a finite, non-negative number")?;
    let transport = open_transport(config)?;
    let mut session = DacSession::open(transport, config).await?;
    if let Some(wave) = session.square_wave() {
        println!("Square wave: {:.3} Hz", wave.achievable_hz);
    }

    let written = session.write_voltages(a, b).await;
    if written.is_ok() {
        println!("A = {:.4} V, B = {:.4} V", a, b);
        if !hold.is_zero() {
            tokio::select! {
                _ = tokio::time::sleep(hold) => {}
                _ = tokio::signal::ctrl_c() => info!("Interrupted, closing"),
            }
        }
    }

    let (_, closed) = session.close().await;
    written?;
    closed?;
    Ok(())
}
