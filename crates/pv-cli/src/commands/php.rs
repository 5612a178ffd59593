//! `pv php ...`: install, list, and remove PHP versions.

use anyhow::Result;
use pv_core::paths::port_for_version;
use pv_core::{Paths, Registry};

use super::CliError;
use crate::tools;

pub async fn install(version: &str) -> Result<()> {
    pv_phpenv::validate_version_format(version)?;

    let paths = Paths::new();
    if pv_phpenv::is_installed(&paths, version) {
        return Err(CliError::PhpAlreadyInstalled(version.to_string()).into());
    }

    println!("Installing PHP {version}...");
    let client = tools::http_client()?;
    pv_phpenv::install::install(&client, &paths, version).await?;

    // First installed version becomes the global default.
    if pv_phpenv::global_version(&paths).await.is_err() {
        println!("Setting PHP {version} as global default...");
        pv_phpenv::set_global(&paths, version).await?;
    }

    Ok(())
}

pub async fn list() -> Result<()> {
    let paths = Paths::new();
    let versions = pv_phpenv::installed_versions(&paths).await?;
    if versions.is_empty() {
        println!("No PHP versions installed. Run: pv php install <version>");
        return Ok(());
    }

    let global = pv_phpenv::global_version(&paths).await.unwrap_or_default();
    let registry = Registry::load(&paths).await.unwrap_or_default();
    let groups = registry.group_by_php(&global);

    for version in &versions {
        let marker = if *version == global { "* " } else { "  " };
        let mut line = format!("{marker}{version}");

        if let Some(projects) = groups.get(version.as_str()) {
            if !projects.is_empty() {
                let names: Vec<&str> = projects.iter().map(|p| p.name.as_str()).collect();
                line.push_str("  <- ");
                line.push_str(&names.join(", "));
            }
        }

        if *version == global {
            line.push_str(" (default)");
        } else {
            line.push_str(&format!(" (port {})", port_for_version(version)));
        }
        println!("{line}");
    }

    Ok(())
}

pub async fn remove(version: &str) -> Result<()> {
    pv_phpenv::validate_version_format(version)?;

    let paths = Paths::new();

    // Refuse while a linked project would lose its interpreter.
    if let Ok(registry) = Registry::load(&paths).await {
        let global = pv_phpenv::global_version(&paths).await.unwrap_or_default();
        for project in registry.list() {
            if project.effective_php(&global) == version {
                return Err(CliError::VersionInUse {
                    version: version.to_string(),
                    project: project.name.clone(),
                }
                .into());
            }
        }
    }

    pv_phpenv::remove(&paths, version).await?;
    println!("PHP {version} removed");
    Ok(())
}
