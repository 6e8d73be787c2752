//! Termination signals routed through the central shutdown path

use anyhow::{Context, Result};
use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use std::thread::{self, JoinHandle};
use tracing::info;

use crate::controller::Command;
use crate::engine::EngineHandle;

/// Turn SIGINT/SIGTERM/SIGHUP into [`Command::Quit`] on a background thread
pub fn spawn_listener(engine: EngineHandle) -> Result<JoinHandle<()>> {
    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])
        .context("Failed to register signal handlers")?;

    thread::Builder::new()
        .name("signals".to_string())
        .spawn(move || {
            for signal in signals.forever() {
                info!(signal, "Received termination signal, shutting down");
                engine.send(Command::Quit);
            }
        })
        .context("Failed to spawn signal listener thread")
}
