//! ==============================================================================
//! main.rs - telemetry station entry point
//! ==============================================================================
//!
//! purpose:
//!     a headless sensor station. it joins the network once, then samples a
//!     dht climate sensor, a light sensor (adc) and a water level probe (gpio)
//!     on a fixed period and pushes every reading to a ThingSpeak channel.
//!
//! responsibilities:
//!     - load configuration (config/station.toml + STATION_WRITE_KEY)
//!     - set up logging
//!     - provision the network once, restart the process on failure
//!     - run the sampling cycle forever (or a fixed number of cycles)
//!     - offer probe subcommands for bench bring-up
//!
//! relationships:
//!     - uses: config.rs, hal.rs, gpio.rs, network.rs, startup.rs,
//!             cycle.rs, sink.rs, diagnostics.rs, probe.rs
//!
//! architecture:
//!
//!     ┌──────────────────────────────────────────────────────────────┐
//!     │                        station process                       │
//!     │                                                              │
//!     │   boot ──► provisioning ──► connected ──► cycling forever    │
//!     │                 │                            │               │
//!     │                 ▼                            ▼               │
//!     │        failed: blink x2,        tick ─► read ─► validate     │
//!     │        exit for restart           ▲             │    │       │
//!     │                                   │        NaN: skip │       │
//!     │                                   │                  ▼       │
//!     │                                   └──── upload fields 1..4   │
//!     └──────────────────────────────────────────────────────────────┘
//!
//! restart model:
//!     a failed network join exits with RESTART_EXIT_CODE. the service
//!     manager (systemd Restart=on-failure) starts a fresh process, nothing
//!     carries over.
//!
//! ==============================================================================

mod config;
mod cycle;
mod diagnostics;
mod domain;
mod error;
mod gpio;
mod hal;
mod network;
mod probe;
mod sink;
mod startup;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::StationConfig;
use crate::cycle::TelemetryCycle;
use crate::diagnostics::TracingDiagnostics;
use crate::domain::{ConnectionState, StationPhase};
use crate::error::StationError;
use crate::gpio::StatusLed;
use crate::hal::{Dht, Hal};
use crate::network::NetworkProvisioner;
use crate::sink::ThingSpeakClient;

/// exit status asking the service manager for a restart
const RESTART_EXIT_CODE: i32 = 75;

#[derive(Parser, Debug)]
#[command(name = "telemetry-station", version, about = "Sensor station pushing readings to ThingSpeak")]
struct Cli {
    /// path to station.toml (default: config/station.toml, ../config/station.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// run the station (default)
    Run {
        /// stop after this many cycles
        #[arg(long)]
        cycles: Option<u64>,
    },
    /// read the dht sensor every 2s and print it
    ProbeSensors {
        #[arg(long)]
        cycles: Option<u64>,
    },
    /// join the network and send a random test value to field 1 every period
    ProbeSink {
        #[arg(long)]
        cycles: Option<u64>,
    },
    /// join the network once and show the result on the status led
    ProbeNetwork,
}

fn init_logging(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let app_name = env!("CARGO_PKG_NAME").replace('-', "_");
            format!("{app_name}={level},diagnostics={level}").into()
        }))
        .init();
}

/// hand the process back to the service manager for a clean start
fn restart(err: &StationError) -> ! {
    tracing::error!("[FATAL] {} - restarting", err);
    std::process::exit(RESTART_EXIT_CODE);
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut config, notes) = StationConfig::load_from(cli.config.as_deref())?;
    config.apply_env();
    init_logging(&config.logging.level);
    for note in &notes {
        note.log();
    }

    // startup banner
    println!("===========================================================");
    println!("  Telemetry Station");
    println!("  DHT + light + water level -> ThingSpeak");
    println!("===========================================================");

    config.validate();
    config.print_summary();

    let hal = Arc::new(Hal::new()?);

    match cli.command.unwrap_or(Command::Run { cycles: None }) {
        Command::Run { cycles } => run_station(&config, hal, cycles).await,
        Command::ProbeSensors { cycles } => {
            let mut dht = Dht::new(hal, config.sensors.dht.gpio_pin, config.sensors.dht.model);
            let ok = probe::probe_sensors(&mut dht, &mut TracingDiagnostics, cycles).await;
            tracing::info!("[PROBE] {} good readings", ok);
            Ok(())
        }
        Command::ProbeSink { cycles } => {
            config.check_sink()?;
            let led = StatusLed::new(hal, config.status_led.gpio_pin);
            connect(&config, &led).await?;
            let sink = ThingSpeakClient::new(&config.thingspeak)?;
            probe::probe_sink(
                &sink,
                config.thingspeak.channel_id,
                &config.thingspeak.write_key,
                config.interval(),
                cycles,
            )
            .await;
            Ok(())
        }
        Command::ProbeNetwork => {
            let led = StatusLed::new(hal, config.status_led.gpio_pin);
            connect(&config, &led).await?;
            Ok(())
        }
    }
}

/// provision once, a failure never returns
async fn connect(config: &StationConfig, led: &StatusLed<Arc<Hal>>) -> Result<ConnectionState> {
    let mut provisioner = NetworkProvisioner::new(&config.thingspeak.url, &config.provisioning)?;
    match startup::boot(&mut provisioner, led, &config.provisioning.ap_name).await {
        Ok(state) => Ok(state),
        Err(e) if e.is_fatal() => restart(&e),
        Err(e) => Err(e.into()),
    }
}

async fn run_station(config: &StationConfig, hal: Arc<Hal>, cycles: Option<u64>) -> Result<()> {
    config.check_sink()?;

    let led = StatusLed::new(hal.clone(), config.status_led.gpio_pin);
    let connection = connect(config, &led).await?;
    tracing::info!("[STATION] connection {:?}", connection);

    let sink = ThingSpeakClient::new(&config.thingspeak)?;
    let dht = Dht::new(hal.clone(), config.sensors.dht.gpio_pin, config.sensors.dht.model);
    let mut cycle = TelemetryCycle::new(config.cycle_config(), hal, dht, sink, TracingDiagnostics);

    startup::enter(StationPhase::Cycling);
    println!("\n[RUNTIME] Starting sensor cycle ({}s interval)", config.polling.interval_seconds);
    println!("────────────────────────────────────────────────────────────");
    cycle.run(cycles).await;
    Ok(())
}
