#![forbid(unsafe_code)]

mod config;
mod constants;
mod controller;
mod engine;
mod font;
mod gui;
mod menu;
mod region;
mod selection;
mod shield;
mod signals;
mod single_instance;
mod x11;

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{Level as TraceLevel, error, info};
use tracing_subscriber::FmtSubscriber;

use config::Settings;
use single_instance::{InstanceGuard, InstanceLock};

#[derive(Parser, Debug)]
#[command(name = "screen-shield", version, about = "Blur a region of the screen behind a movable privacy shield")]
struct Cli {
    /// Settings file (defaults to the per-user config directory)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// trace, debug, info, warn or error (falls back to LOG_LEVEL)
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,
}

fn parse_level(level: &str) -> TraceLevel {
    match level.to_lowercase().as_str() {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = cli
        .log_level
        .clone()
        .or_else(|| std::env::var("LOG_LEVEL").ok())
        .unwrap_or_else(|| "info".to_string());
    let subscriber = FmtSubscriber::builder()
        .with_max_level(parse_level(&level))
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to install log subscriber: {e}");
    }

    let guard = match InstanceGuard::acquire(constants::instance::KEY) {
        Ok(InstanceLock::Acquired(guard)) => guard,
        Ok(InstanceLock::AlreadyRunning) => {
            info!("Another instance is already running, exiting");
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            error!(error = ?e, "Failed to set up single-instance guard");
            return ExitCode::FAILURE;
        }
    };

    let settings = match cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    };
    info!(
        segment = guard.name(),
        path = %settings.path().display(),
        minimize_to_tray = settings.minimize_to_tray(),
        "Starting screen-shield"
    );

    let result = gui::run_gui(settings);
    drop(guard);
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = ?e, "Control panel failed");
            ExitCode::FAILURE
        }
    }
}
