//! Downloading and installing PHP versions.
//!
//! Each version is a pair of binaries under `php/<major.minor>/`: a
//! FrankenPHP build from the release repository and a standalone PHP CLI
//! from static-php.dev.

use std::path::Path;

use anyhow::{bail, Context, Result};
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use pv_core::Paths;
use pv_utils::archive::extract_tar_gz;
use pv_utils::download::{download, make_executable};
use pv_utils::platform::{asset_name, AssetTable};

/// GitHub repository hosting the per-PHP-version FrankenPHP builds.
pub const RELEASE_REPO: &str = "prvious/pv";

/// Release asset platform suffixes, e.g. `frankenphp-mac-arm64-php8.4`.
const FRANKENPHP_PLATFORMS: AssetTable = &[
    (("macos", "aarch64"), "mac-arm64"),
    (("macos", "x86_64"), "mac-x86_64"),
    (("linux", "x86_64"), "linux-x86_64"),
    (("linux", "aarch64"), "linux-aarch64"),
];

/// static-php.dev archive platform suffixes.
const PHP_CLI_PLATFORMS: AssetTable = &[
    (("macos", "aarch64"), "macos-aarch64"),
    (("macos", "x86_64"), "macos-x86_64"),
    (("linux", "x86_64"), "linux-x86_64"),
    (("linux", "aarch64"), "linux-aarch64"),
];

#[derive(Deserialize)]
struct Release {
    tag_name: String,
}

/// Installs PHP `major.minor`: downloads the FrankenPHP build, detects the
/// full `X.Y.Z` it embeds, then fetches the matching PHP CLI next to it.
pub async fn install(client: &reqwest::Client, paths: &Paths, php_version: &str) -> Result<()> {
    let version_dir = paths.php_version_dir(php_version);
    tokio::fs::create_dir_all(&version_dir)
        .await
        .with_context(|| format!("cannot create {}", version_dir.display()))?;

    let tag = latest_release_tag(client)
        .await
        .context("cannot find latest release")?;

    let asset = frankenphp_asset_name(php_version)?;
    let frankenphp_url =
        format!("https://github.com/{RELEASE_REPO}/releases/download/{tag}/{asset}");
    let frankenphp_dest = paths.frankenphp_for_version(php_version);

    println!("  Downloading FrankenPHP (PHP {php_version})...");
    download(client, &frankenphp_url, &frankenphp_dest)
        .await
        .context("download FrankenPHP")?;
    make_executable(&frankenphp_dest)?;

    let full_version = match detect_php_version(&version_dir).await {
        Ok(detected) => detected,
        Err(err) => {
            println!("  (could not detect full PHP version: {err:#})");
            format!("{php_version}.0")
        }
    };

    let cli_url = php_cli_url(&full_version)?;
    let cli_archive = version_dir.join("php.tar.gz");
    let cli_dest = paths.php_cli_for_version(php_version);

    println!("  Downloading PHP CLI {full_version}...");
    download(client, &cli_url, &cli_archive)
        .await
        .context("download PHP CLI")?;
    extract_tar_gz(&cli_archive, &cli_dest, "php").context("extract PHP CLI")?;
    if let Err(err) = tokio::fs::remove_file(&cli_archive).await {
        debug!("could not remove {}: {err}", cli_archive.display());
    }
    make_executable(&cli_dest)?;

    println!("  \u{2713} PHP {php_version} installed");
    Ok(())
}

/// Fetches the latest release tag of [`RELEASE_REPO`].
pub async fn latest_release_tag(client: &reqwest::Client) -> Result<String> {
    let url = format!("https://api.github.com/repos/{RELEASE_REPO}/releases/latest");
    let resp = client
        .get(&url)
        .header(reqwest::header::ACCEPT, "application/vnd.github+json")
        .send()
        .await
        .with_context(|| format!("cannot reach {url}"))?;

    if !resp.status().is_success() {
        bail!("GitHub API returned HTTP {}", resp.status().as_u16());
    }

    let release: Release = resp.json().await.context("parse GitHub response")?;
    Ok(release.tag_name)
}

/// Release asset name for the current platform,
/// e.g. `frankenphp-linux-x86_64-php8.4`.
pub fn frankenphp_asset_name(php_version: &str) -> Result<String> {
    let platform = asset_name(
        FRANKENPHP_PLATFORMS,
        std::env::consts::OS,
        std::env::consts::ARCH,
    )?;
    Ok(format!("frankenphp-{platform}-php{php_version}"))
}

/// static-php.dev download URL for a full `X.Y.Z` CLI build.
pub fn php_cli_url(full_version: &str) -> Result<String> {
    let platform = asset_name(
        PHP_CLI_PLATFORMS,
        std::env::consts::OS,
        std::env::consts::ARCH,
    )?;
    Ok(format!(
        "https://dl.static-php.dev/static-php-cli/common/php-{full_version}-cli-{platform}.tar.gz"
    ))
}

/// Runs `<version_dir>/frankenphp version` and extracts the embedded PHP
/// version.
pub async fn detect_php_version(version_dir: &Path) -> Result<String> {
    let binary = version_dir.join("frankenphp");
    let output = tokio::process::Command::new(&binary)
        .arg("version")
        .output()
        .await
        .with_context(|| format!("run {} version", binary.display()))?;
    if !output.status.success() {
        bail!("frankenphp version exited with {}", output.status);
    }
    parse_frankenphp_php_version(&String::from_utf8_lossy(&output.stdout))
}

/// Extracts `8.5.3` from output like
/// `FrankenPHP v1.11.3 PHP 8.5.3 Caddy/v2.9.1 h1:...`.
pub fn parse_frankenphp_php_version(output: &str) -> Result<String> {
    let re = Regex::new(r"PHP (\d+\.\d+\.\d+)")?;
    let version = re
        .captures(output)
        .and_then(|caps| caps.get(1))
        .with_context(|| format!("could not parse PHP version from FrankenPHP output: {output}"))?;
    Ok(version.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_php_version_from_banner() {
        let banner = "FrankenPHP v1.11.3 PHP 8.5.3 Caddy/v2.9.1 h1:abcdef";
        assert_eq!(parse_frankenphp_php_version(banner).unwrap(), "8.5.3");
    }

    #[test]
    fn banner_without_version_is_an_error() {
        let err = parse_frankenphp_php_version("Caddy v2.9.1").unwrap_err();
        assert!(format!("{err:#}").contains("could not parse"));
    }

    #[test]
    fn frankenphp_assets_cover_both_oses() {
        assert_eq!(
            asset_name(FRANKENPHP_PLATFORMS, "macos", "aarch64").unwrap(),
            "mac-arm64"
        );
        assert_eq!(
            asset_name(FRANKENPHP_PLATFORMS, "linux", "x86_64").unwrap(),
            "linux-x86_64"
        );
        assert!(asset_name(FRANKENPHP_PLATFORMS, "windows", "x86_64").is_err());
    }

    #[test]
    fn php_cli_url_names_the_full_version() {
        let url = php_cli_url("8.4.2").unwrap();
        assert!(url.starts_with("https://dl.static-php.dev/static-php-cli/common/php-8.4.2-cli-"));
        assert!(url.ends_with(".tar.gz"));
    }

    #[tokio::test]
    async fn detect_runs_the_binary_in_the_version_dir() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("frankenphp");
        std::fs::write(
            &fake,
            "#!/bin/sh\necho 'FrankenPHP v1.11.3 PHP 8.5.3 Caddy/v2.9.1'\n",
        )
        .unwrap();
        make_executable(&fake).unwrap();

        let detected = detect_php_version(dir.path()).await.unwrap();
        assert_eq!(detected, "8.5.3");
    }

    #[tokio::test]
    async fn detect_fails_on_nonzero_exit() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join("frankenphp");
        std::fs::write(&fake, "#!/bin/sh\nexit 3\n").unwrap();
        make_executable(&fake).unwrap();

        assert!(detect_php_version(dir.path()).await.is_err());
    }
}
