//! Per-project PHP version resolution.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use pv_core::Paths;

use crate::constraint::match_constraint;
use crate::{global_version, installed_versions, is_installed, PhpenvError};

#[derive(Deserialize)]
struct ComposerRequire {
    #[serde(default)]
    require: std::collections::HashMap<String, String>,
}

/// Determines the PHP version for a project directory.
///
/// Priority: `.pv-php` file, then the `composer.json` `require.php`
/// constraint matched against installed versions, then the global default.
/// A `.pv-php` pin naming a version that is not installed is skipped rather
/// than honored, so the result is always an installed version (or the error
/// from [`global_version`] when nothing is configured).
pub async fn resolve_version(paths: &Paths, project_path: &Path) -> Result<String> {
    if let Some(pinned) = read_pv_php_file(project_path).await {
        if is_installed(paths, &pinned) {
            return Ok(pinned);
        }
        debug!(version = %pinned, "ignoring .pv-php pin for uninstalled version");
    }

    if let Ok(matched) = resolve_from_composer(paths, project_path).await {
        return Ok(matched);
    }

    global_version(paths).await
}

/// Reads a trimmed version string from `<project>/.pv-php`, if present.
pub async fn read_pv_php_file(project_path: &Path) -> Option<String> {
    let raw = tokio::fs::read_to_string(project_path.join(".pv-php"))
        .await
        .ok()?;
    let version = raw.trim();
    if version.is_empty() {
        return None;
    }
    Some(version.to_string())
}

/// Matches the `require.php` constraint in `<project>/composer.json` against
/// installed versions, returning the highest satisfying version.
pub async fn resolve_from_composer(paths: &Paths, project_path: &Path) -> Result<String> {
    let manifest_path = project_path.join("composer.json");
    let raw = tokio::fs::read_to_string(&manifest_path)
        .await
        .with_context(|| format!("cannot read {}", manifest_path.display()))?;
    let composer: ComposerRequire = serde_json::from_str(&raw)
        .with_context(|| format!("cannot parse {}", manifest_path.display()))?;

    let constraint = composer
        .require
        .get("php")
        .filter(|c| !c.is_empty())
        .context("no php requirement in composer.json")?;

    let installed = installed_versions(paths).await?;
    match_constraint(constraint, &installed)
        .ok_or_else(|| PhpenvError::NoConstraintMatch(constraint.clone()).into())
}
