//! `pv update`: refresh the standalone tool binaries.
//!
//! FrankenPHP and the PHP CLI are versioned per installation under `php/`
//! and belong to `pv php install`; this command covers the tools that live
//! directly in `bin/`.

use anyhow::{Context, Result};
use pv_core::{Paths, VersionState};

use crate::tools;

pub async fn run() -> Result<()> {
    let paths = Paths::new();
    let client = tools::http_client()?;

    let mut versions = VersionState::load(&paths)
        .await
        .context("cannot load version state")?;

    for tool in tools::TOOLS {
        println!("Checking {}...", tool.display_name);

        let latest = tools::fetch_latest_version(&client, tool)
            .await
            .with_context(|| format!("cannot check {} version", tool.display_name))?;

        if !versions.needs_update(tool.name, &latest) {
            println!(
                "  {} is already up to date ({})",
                tool.display_name,
                versions.get(tool.name)
            );
            continue;
        }

        tools::install_tool(&client, &paths, tool, &latest)
            .await
            .with_context(|| format!("cannot install {}", tool.display_name))?;

        versions.set(tool.name, &latest);
        versions
            .save(&paths)
            .await
            .context("cannot save version state")?;

        println!("  {} updated to {latest}", tool.display_name);
    }

    println!("Generating shims...");
    pv_phpenv::shim::write_shims(&paths)
        .await
        .context("cannot write shims")?;
    tools::write_composer_shim(&paths)
        .await
        .context("cannot write composer shim")?;

    println!("Done.");
    Ok(())
}
