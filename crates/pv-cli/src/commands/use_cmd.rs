//! `pv use`: switch the global PHP default, or pin the current project.

use anyhow::{Context, Result};
use pv_core::{Paths, Registry, Settings};

use super::{reconfigure_if_running, CliError};

pub async fn run(argument: &str, project: bool) -> Result<()> {
    // Accept both `php:8.4` and bare `8.4`.
    let version = argument.strip_prefix("php:").unwrap_or(argument);
    if version.is_empty() {
        return Err(CliError::EmptyVersion.into());
    }
    pv_phpenv::validate_version_format(version)?;

    let paths = Paths::new();
    if !pv_phpenv::is_installed(&paths, version) {
        return Err(pv_phpenv::PhpenvError::NotInstalled(version.to_string()).into());
    }

    if project {
        return pin_current_project(&paths, version).await;
    }

    let previous = pv_phpenv::global_version(&paths).await.unwrap_or_default();
    pv_phpenv::set_global(&paths, version).await?;

    println!("Global PHP switched to {version}");

    // Routing can be reloaded in place, but the main server keeps running
    // the previous version's binary until it is restarted.
    let running = reconfigure_if_running(&paths).await;
    if previous != version && running {
        println!("Server is running; restart required for changes to take effect.");
        eprintln!("Run: pv stop && pv start");
    }
    Ok(())
}

/// Pin the CWD's linked project to `version`, recorded even when it matches
/// the global default so later global switches leave it alone.
async fn pin_current_project(paths: &Paths, version: &str) -> Result<()> {
    let cwd = std::env::current_dir().context("cannot determine current directory")?;
    let mut registry = Registry::load(paths).await.context("cannot load registry")?;

    let name = registry
        .find_by_path(&cwd)
        .map(|p| p.name.clone())
        .ok_or(CliError::NotLinked)?;

    let Some(project) = registry.find_mut(&name) else {
        return Err(pv_core::registry::RegistryError::NotFound(name).into());
    };
    project.php = version.to_string();
    registry.save(paths).await?;

    println!("{name} pinned to PHP {version}");

    let settings = Settings::load(paths).await?;
    let running = reconfigure_if_running(paths).await;
    if running && version != settings.global_php {
        println!("Note: restart the server to serve this project (pv stop && pv start)");
    }
    Ok(())
}
