//! Thrustbench host simulator
//!
//! Runs the stand's control loop against a simulated load cell, motor and
//! collector, printing every message the stand sends as a JSON line on
//! stdout. Logs go to stderr.
//!
//! ```text
//! thrustbench-sim [--config <FILE>] [--log-level <LEVEL>]
//! ```

use std::error::Error;
use std::io;
use std::path::PathBuf;

use log::LevelFilter;

mod clock;
mod config;
mod links;
mod motor;
mod scenario;
mod sensor;

use config::SimConfig;
use scenario::Simulation;

fn main() -> Result<(), Box<dyn Error>> {
    let args: Vec<String> = std::env::args().collect();

    env_logger::Builder::from_default_env()
        .filter_level(parse_log_level(&args))
        .format_timestamp_millis()
        .init();

    let config = match config_path(&args) {
        Some(path) => {
            log::info!("Loading {}", path.display());
            SimConfig::load(&path)?
        }
        None => {
            log::info!("No --config given, running the default bench session");
            SimConfig::default()
        }
    };

    log::info!(
        "Motor: {:?} peak={}N burn={}ms",
        config.motor.profile,
        config.motor.peak_thrust_n,
        config.motor.burn_time_ms
    );

    let mut sim = Simulation::new(config)?;
    let stdout = io::stdout();
    let summary = sim.run(&mut stdout.lock())?;

    log::info!(
        "{} iterations, {} messages, {} readings streamed ({} dropped)",
        summary.iterations,
        summary.messages,
        summary.readings_sent,
        summary.readings_dropped
    );
    log::info!(
        "Commands: {} handled, {} failed, {} rejected",
        summary.commands_handled,
        summary.commands_failed,
        summary.commands_rejected
    );
    log::info!(
        "Calibration: scale={} offset={}",
        summary.calibration.scale(),
        summary.calibration.offset()
    );
    match summary.streamed_window_ms {
        Some((first, last)) => log::info!(
            "Peak force {:.2} between {} and {} ms",
            summary.peak_force,
            first,
            last
        ),
        None => log::warn!("No readings were streamed"),
    }
    log::info!(
        "Final state after {} ms: {} (network {:?})",
        sim.now_ms(),
        summary.final_state.as_str(),
        sim.stand().network_state()
    );

    Ok(())
}

/// Value following `flag`, if present
fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn config_path(args: &[String]) -> Option<PathBuf> {
    flag_value(args, "--config").map(PathBuf::from)
}

/// Parse `--log-level <LEVEL>`
///
/// `RUST_LOG` still applies per module; this sets the global level.
/// Defaults to INFO.
fn parse_log_level(args: &[String]) -> LevelFilter {
    let Some(level) = flag_value(args, "--log-level") else {
        return LevelFilter::Info;
    };
    match level.to_uppercase().as_str() {
        "OFF" => LevelFilter::Off,
        "ERROR" => LevelFilter::Error,
        "WARN" => LevelFilter::Warn,
        "INFO" => LevelFilter::Info,
        "DEBUG" => LevelFilter::Debug,
        "TRACE" => LevelFilter::Trace,
        _ => {
            eprintln!("Unknown log level: {}. Using INFO", level);
            LevelFilter::Info
        }
    }
}
