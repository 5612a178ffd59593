//! `pv stop`: signal a running supervisor to shut down.

use anyhow::{Context, Result};
use nix::sys::signal::Signal;
use pv_core::Paths;
use pv_server::supervisor;
use pv_utils::process::send_signal;

use super::CliError;

pub fn run() -> Result<()> {
    let paths = Paths::new();
    let pid = supervisor::read_pid(&paths).map_err(|_| CliError::NoPidFile)?;

    send_signal(pid, Signal::SIGTERM)
        .with_context(|| format!("cannot send signal to process {pid}"))?;

    println!("Sent stop signal to pv (PID {pid})");
    Ok(())
}
