//! # DAQ Core Binary
//!
//! Simulation host for the firmware core: commands arrive on stdin,
//! responses leave on stdout, the non-volatile store is a file (so a
//! killed process behaves like a power loss) and the periodic timer runs
//! off the wall clock.
//!
//! # Usage
//!
//! ```bash
//! # Run with the default config path and store file
//! daq_core
//!
//! # Explicit config and store, verbose logging
//! daq_core --config daq.toml --store daq.eeprom -v
//!
//! # JSON logs
//! daq_core --json
//! ```

use clap::Parser;
use daq_common::config::{ConfigError, ConfigLoader, DaqConfig};
use daq_core::core::DaqCore;
use daq_core::responder::Responder;
use daq_hal::clock::SystemClock;
use daq_hal::store::FileStore;
use daq_hal::timer::SimTimer;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::time::{Duration, Instant};
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Field DAQ firmware core (simulation host)
#[derive(Parser, Debug)]
#[command(name = "daq_core")]
#[command(author = "sensor-hive")]
#[command(version)]
#[command(about = "Field DAQ firmware core: serial command loop over simulated hardware")]
struct Args {
    /// Path to the device configuration file
    #[arg(short, long, default_value = "daq.toml")]
    config: PathBuf,

    /// Path to the simulated non-volatile store
    #[arg(long, default_value = "daq.eeprom")]
    store: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json: bool,
}

fn main() {
    if let Err(e) = run() {
        error!("DAQ startup failed: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    setup_tracing(&args);

    info!("DAQ core v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = match DaqConfig::load(&args.config) {
        Ok(config) => config,
        Err(ConfigError::FileNotFound) => {
            warn!(
                "No config at {:?}; using the built-in port layout",
                args.config
            );
            DaqConfig::default()
        }
        Err(e) => return Err(Box::new(e)),
    };
    config.validate()?;

    let store = FileStore::open(&args.store, config.store.capacity)?;
    let timer = SimTimer::new();
    let gate = timer.gate();
    let channels = daq_core::port::PortTable::sim_channels(&config);
    let daq_id = config.device.daq_id;

    let mut core = DaqCore::new(&config, store, gate, SystemClock, timer.clone(), channels);
    core.boot();
    if core.is_running() {
        info!("resumed a persisted experiment");
    }

    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        flag.store(false, Ordering::SeqCst);
    })?;

    let serial_in = spawn_stdin_reader();
    let mut out = Responder::new(std::io::stdout(), daq_id);
    let mut last_advance = Instant::now();

    info!("DAQ id {daq_id} ready; reading commands from stdin");
    while running.load(Ordering::SeqCst) {
        // Advance the simulated timer by whole elapsed wall seconds.
        let elapsed = last_advance.elapsed().as_secs() as u32;
        if elapsed > 0 {
            timer.advance(elapsed);
            last_advance += Duration::from_secs(u64::from(elapsed));
        }
        while timer.take_tick() {
            if let Err(e) = core.on_tick() {
                warn!("tick failed: {e}");
            }
        }

        match serial_in.recv_timeout(Duration::from_millis(200)) {
            Ok(bytes) => {
                for byte in bytes {
                    if let Err(e) = core.feed(byte, &mut out) {
                        warn!("response failed: {e}");
                    }
                }
                if let Err(e) = out.flush() {
                    warn!("flush failed: {e}");
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    info!("DAQ core shutdown complete");
    Ok(())
}

/// Pump stdin bytes into a channel so the command loop can keep ticking
/// while no input arrives.
fn spawn_stdin_reader() -> mpsc::Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        let mut stdin = std::io::stdin().lock();
        let mut buf = [0u8; 64];
        loop {
            match stdin.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if tx.send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
            }
        }
    });
    rx
}

/// Setup tracing subscriber based on CLI arguments.
fn setup_tracing(args: &Args) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}
