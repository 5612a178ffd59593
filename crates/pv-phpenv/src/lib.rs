//! # pv-phpenv
//!
//! `pv-phpenv` manages the side-by-side PHP installations under `~/.pv/php/`:
//! installing FrankenPHP + PHP CLI pairs, switching the global default, and
//! resolving which version a given project directory should run.
//!
//! ## Key Modules
//!
//! *   [`install`]: Download and install a `major.minor` version.
//! *   [`resolve`]: `.pv-php` → `composer.json` → global-default resolution.
//! *   [`constraint`]: Composer-style `require.php` constraint matching.
//! *   [`available`]: Versions offered by the latest release.
//! *   [`shim`]: The version-dispatching `php` shim script.
//!
//! ## Entry Points
//!
//! *   **What is installed**: [`installed_versions`], [`is_installed`].
//! *   **Switching versions**: [`set_global`], [`global_version`], [`remove`].
//! *   **Per-project version**: [`resolve::resolve_version`].

// 1. Logic & Safety
#![warn(clippy::let_underscore_must_use)] // Don't swallow errors with `let _`
#![warn(clippy::manual_let_else)] // Enforces clean "Guard Clause" style
#![warn(clippy::unwrap_used)] // Force error propagation (no panics)
#![warn(clippy::expect_used)] // Force error propagation
// 2. Numeric Safety (Critical for PIDs/Ports)
#![warn(clippy::cast_possible_truncation)]
#![warn(clippy::cast_possible_wrap)]
// 3. Import Hygiene
#![warn(clippy::wildcard_imports)]
#![allow(clippy::missing_errors_doc)]

use anyhow::{Context, Result};
use regex::Regex;
use thiserror::Error;

use pv_core::{Paths, Settings};

/// Versions offered by the latest release.
pub mod available;
/// Composer-style constraint matching.
pub mod constraint;
/// Download and install a PHP version.
pub mod install;
/// Per-project version resolution.
pub mod resolve;
/// The version-dispatching `php` shim.
pub mod shim;
/// Numeric version-string comparison.
pub mod version;

/// A `major.minor` version string like `8.4`.
const VERSION_PATTERN: &str = r"^\d+\.\d+$";

/// Errors from PHP version management with a meaning beyond "I/O failed".
#[derive(Debug, Error)]
pub enum PhpenvError {
    #[error("PHP {0} is not installed (run: pv php install {0})")]
    NotInstalled(String),
    #[error("cannot remove PHP {0}: it is the global default (switch with: pv use php:<other-version>)")]
    RemoveGlobal(String),
    #[error("no global PHP version set (run: pv php install <version>)")]
    NoGlobalVersion,
    #[error("no installed PHP version satisfies {0:?}")]
    NoConstraintMatch(String),
    #[error("invalid PHP version {0:?}: expected major.minor, e.g. 8.4")]
    InvalidVersion(String),
}

/// Returns all installed PHP versions, lowest first.
///
/// A version counts as installed when the directory is named `major.minor`
/// and `php/<version>/frankenphp` exists; stray files, scratch directories,
/// and half-unpacked trees under `php/` are ignored.
pub async fn installed_versions(paths: &Paths) -> Result<Vec<String>> {
    let php_dir = paths.php_dir();
    let mut entries = match tokio::fs::read_dir(&php_dir).await {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(err).with_context(|| format!("cannot read {}", php_dir.display()))
        }
    };

    let mut versions = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if validate_version_format(&name).is_ok() && paths.frankenphp_for_version(&name).exists() {
            versions.push(name);
        }
    }

    version::sort_versions(&mut versions);
    Ok(versions)
}

/// True when `php/<version>/frankenphp` exists.
pub fn is_installed(paths: &Paths, version: &str) -> bool {
    paths.frankenphp_for_version(version).exists()
}

/// Makes `version` the global default: records it in settings and repoints
/// the `bin/frankenphp` symlink.
pub async fn set_global(paths: &Paths, version: &str) -> Result<()> {
    if !is_installed(paths, version) {
        return Err(PhpenvError::NotInstalled(version.to_string()).into());
    }

    let mut settings = Settings::load(paths).await?;
    settings.global_php = version.to_string();
    settings.save(paths).await?;

    update_symlinks(paths, version).await
}

/// The configured global PHP version.
///
/// Errors with [`PhpenvError::NoGlobalVersion`] before the first install.
pub async fn global_version(paths: &Paths) -> Result<String> {
    let settings = Settings::load(paths).await?;
    if settings.global_php.is_empty() {
        return Err(PhpenvError::NoGlobalVersion.into());
    }
    Ok(settings.global_php)
}

/// Deletes an installed version. Refuses while it is the global default.
pub async fn remove(paths: &Paths, version: &str) -> Result<()> {
    if !is_installed(paths, version) {
        return Err(PhpenvError::NotInstalled(version.to_string()).into());
    }

    let settings = Settings::load(paths).await?;
    if settings.global_php == version {
        return Err(PhpenvError::RemoveGlobal(version.to_string()).into());
    }

    let dir = paths.php_version_dir(version);
    tokio::fs::remove_dir_all(&dir)
        .await
        .with_context(|| format!("cannot remove {}", dir.display()))?;
    Ok(())
}

/// Repoints `bin/frankenphp` at the given version's binary.
///
/// The `php` CLI is dispatched by the shim script from
/// [`shim::write_shims`], not a symlink.
async fn update_symlinks(paths: &Paths, version: &str) -> Result<()> {
    let link_path = paths.bin_dir().join("frankenphp");
    let target = paths.frankenphp_for_version(version);

    // Replace whatever is there, symlink or plain file.
    match tokio::fs::remove_file(&link_path).await {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err).with_context(|| format!("cannot remove {}", link_path.display()))
        }
    }
    tokio::fs::symlink(&target, &link_path)
        .await
        .with_context(|| {
            format!(
                "cannot create symlink {} -> {}",
                link_path.display(),
                target.display()
            )
        })?;
    Ok(())
}

/// Check that `version` is a bare `major.minor` string.
pub fn validate_version_format(version: &str) -> Result<()> {
    let re = Regex::new(VERSION_PATTERN)?;
    if !re.is_match(version) {
        return Err(PhpenvError::InvalidVersion(version.to_string()).into());
    }
    Ok(())
}
