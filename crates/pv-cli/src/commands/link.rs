//! `pv link`: register a project directory and generate its site config.

use anyhow::{Context, Result};
use std::path::Path;

use pv_core::{caddy, detect, Paths, Project, Registry, Settings};

use super::{reconfigure_if_running, CliError};

pub async fn run(path: &Path, name: Option<&str>, php: Option<&str>) -> Result<()> {
    let abs_path = std::path::absolute(path).context("cannot resolve path")?;

    let info = std::fs::metadata(&abs_path)
        .with_context(|| format!("path does not exist: {}", abs_path.display()))?;
    if !info.is_dir() {
        return Err(CliError::NotADirectory(abs_path.display().to_string()).into());
    }

    let name = match name {
        Some(name) => name.to_string(),
        None => abs_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("cannot derive a name from {}", abs_path.display()))?,
    };
    // The name becomes the host `<name>.<tld>`.
    pv_core::settings::validate_label(&name)
        .with_context(|| format!("cannot use {name:?} as a project name"))?;

    let paths = Paths::new();
    let mut registry = Registry::load(&paths).await.context("cannot load registry")?;
    let settings = Settings::load(&paths).await.context("cannot load settings")?;
    let global_php = settings.global_php.clone();

    let kind = detect::detect(&abs_path);

    let resolved = match php {
        Some(version) => {
            pv_phpenv::validate_version_format(version)?;
            if !pv_phpenv::is_installed(&paths, version) {
                return Err(pv_phpenv::PhpenvError::NotInstalled(version.to_string()).into());
            }
            version.to_string()
        }
        None => pv_phpenv::resolve::resolve_version(&paths, &abs_path)
            .await
            .unwrap_or_else(|_| global_php.clone()),
    };

    // Only a version that differs from the global default becomes a pin;
    // everything else keeps following the default as it changes.
    let pinned = if !resolved.is_empty() && resolved != global_php {
        resolved.clone()
    } else {
        String::new()
    };

    let project = Project {
        name: name.clone(),
        path: abs_path.clone(),
        kind,
        php: pinned,
    };

    registry.add(project.clone())?;
    registry.save(&paths).await.context("cannot save registry")?;

    caddy::generate_site_config(&paths, &project, &settings.tld, &global_php)
        .await
        .context("cannot generate site config")?;
    caddy::generate_caddyfile(&paths)
        .await
        .context("cannot generate Caddyfile")?;

    let type_label = if kind.as_str().is_empty() {
        "unknown"
    } else {
        kind.as_str()
    };
    let php_label = if !resolved.is_empty() && resolved != global_php {
        format!(", PHP {resolved}")
    } else {
        String::new()
    };
    println!("Linked {name} → {} ({type_label}{php_label})", abs_path.display());

    if reconfigure_if_running(&paths).await {
        // Secondary servers only learn about new sites at startup.
        if !php_label.is_empty() {
            println!("Note: restart the server to serve this project (pv stop && pv start)");
        }
    }

    Ok(())
}
