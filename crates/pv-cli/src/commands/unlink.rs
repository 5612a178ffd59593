//! `pv unlink`: remove a project from the registry and its site config.

use anyhow::{Context, Result};
use pv_core::{caddy, Paths, Registry};

use super::{reconfigure_if_running, CliError};

pub async fn run(name: Option<&str>) -> Result<()> {
    let paths = Paths::new();
    let mut registry = Registry::load(&paths).await.context("cannot load registry")?;

    let name = match name {
        // A known project name wins; otherwise try the argument as a path.
        Some(arg) if registry.find(arg).is_some() => arg.to_string(),
        Some(arg) => {
            let path = std::path::absolute(arg).context("cannot resolve path")?;
            registry
                .find_by_path(&path)
                .map(|p| p.name.clone())
                .ok_or_else(|| pv_core::registry::RegistryError::NotFound(arg.to_string()))?
        }
        None => {
            // No argument: unlink whatever project the CWD is linked as.
            let cwd = std::env::current_dir().context("cannot determine current directory")?;
            registry
                .find_by_path(&cwd)
                .map(|p| p.name.clone())
                .ok_or(CliError::NotLinked)?
        }
    };

    registry.remove(&name)?;
    registry.save(&paths).await?;

    caddy::remove_site_config(&paths, &name)
        .await
        .with_context(|| format!("cannot remove site config for {name}"))?;
    caddy::generate_caddyfile(&paths)
        .await
        .context("cannot regenerate Caddyfile")?;

    println!("Unlinked {name}");

    reconfigure_if_running(&paths).await;
    Ok(())
}
