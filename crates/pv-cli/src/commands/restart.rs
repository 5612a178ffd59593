//! `pv restart`: reload configuration on a running server.

use anyhow::{Context, Result};
use pv_core::Paths;
use pv_server::supervisor;

use super::CliError;

pub async fn run() -> Result<()> {
    let paths = Paths::new();
    if !supervisor::is_running(&paths) {
        return Err(CliError::NotRunning.into());
    }

    supervisor::reconfigure_server(&paths)
        .await
        .context("reconfigure failed")?;

    println!("Server configuration reloaded");
    Ok(())
}
