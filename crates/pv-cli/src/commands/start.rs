//! `pv start`: run the supervisor (DNS + FrankenPHP) in the foreground.

use anyhow::Result;
use pv_core::{Paths, Settings};
use pv_server::supervisor;

use super::CliError;

pub async fn run() -> Result<()> {
    let paths = Paths::new();
    if supervisor::is_running(&paths) {
        return Err(CliError::AlreadyRunning.into());
    }

    let settings = Settings::load(&paths).await?;
    supervisor::start(&paths, &settings.tld).await
}
