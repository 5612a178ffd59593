//! Catalog of standalone tool binaries installed into `bin/`.
//!
//! FrankenPHP and the PHP CLI are installed per version by `pv-phpenv`;
//! the tools here are version-independent. Composer is a phar driven
//! through the `php` shim, Mago is a native binary shipped as a tar.gz.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

use pv_core::Paths;
use pv_utils::download::{download, fetch_checksum, make_executable, verify_checksum};
use pv_utils::platform::{asset_name, AssetTable};

/// A standalone tool managed by `pv install` / `pv update`.
pub struct Tool {
    /// Key in `versions.json`.
    pub name: &'static str,
    pub display_name: &'static str,
}

pub const MAGO: Tool = Tool {
    name: "mago",
    display_name: "Mago",
};

pub const COMPOSER: Tool = Tool {
    name: "composer",
    display_name: "Composer",
};

pub const TOOLS: &[Tool] = &[MAGO, COMPOSER];

/// Mago release target triples by `(os, arch)`.
const MAGO_PLATFORMS: AssetTable = &[
    (("macos", "aarch64"), "aarch64-apple-darwin"),
    (("macos", "x86_64"), "x86_64-apple-darwin"),
    (("linux", "x86_64"), "x86_64-unknown-linux-gnu"),
    (("linux", "aarch64"), "aarch64-unknown-linux-gnu"),
];

const MAGO_RELEASES: &str = "https://api.github.com/repos/carthage-software/mago/releases/latest";
const COMPOSER_URL: &str = "https://getcomposer.org/download/latest-stable/composer.phar";
const COMPOSER_CHECKSUM_URL: &str =
    "https://getcomposer.org/download/latest-stable/composer.phar.sha256";

/// Shared HTTP client. GitHub's API rejects requests without a user agent.
pub fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent("pv")
        .build()
        .context("cannot build HTTP client")
}

fn mago_url(version: &str) -> Result<String> {
    let platform = asset_name(
        MAGO_PLATFORMS,
        std::env::consts::OS,
        std::env::consts::ARCH,
    )?;
    Ok(format!(
        "https://github.com/carthage-software/mago/releases/download/{version}/mago-{version}-{platform}.tar.gz"
    ))
}

#[derive(Deserialize)]
struct Release {
    tag_name: String,
}

/// Latest release tag for a tool. Composer has no versioned endpoint; its
/// `latest-stable` URL always serves the current release.
pub async fn fetch_latest_version(client: &reqwest::Client, tool: &Tool) -> Result<String> {
    if tool.name == "composer" {
        return Ok("latest".to_string());
    }

    let response = client
        .get(MAGO_RELEASES)
        .header(reqwest::header::ACCEPT, "application/vnd.github+json")
        .send()
        .await
        .context("fetch latest version failed")?;

    if !response.status().is_success() {
        bail!("GitHub API returned HTTP {}", response.status().as_u16());
    }

    let release: Release = response.json().await.context("parse GitHub response")?;
    Ok(release.tag_name)
}

/// Download and install one tool into `bin/`.
pub async fn install_tool(
    client: &reqwest::Client,
    paths: &Paths,
    tool: &Tool,
    version: &str,
) -> Result<()> {
    paths.ensure_dirs()?;

    match tool.name {
        "mago" => install_mago(client, paths, version).await,
        "composer" => install_composer(client, paths).await,
        other => bail!("unknown tool: {other}"),
    }
}

async fn install_mago(client: &reqwest::Client, paths: &Paths, version: &str) -> Result<()> {
    let archive_path = paths.bin_dir().join("mago.tar.gz");
    let dest_path = paths.bin_dir().join("mago");

    println!("  Downloading Mago...");
    download(client, &mago_url(version)?, &archive_path).await?;

    println!("  Extracting...");
    pv_utils::archive::extract_tar_gz(&archive_path, &dest_path, "mago")?;

    if let Err(err) = std::fs::remove_file(&archive_path) {
        tracing::debug!(?err, "cannot remove mago archive");
    }
    make_executable(&dest_path)
}

async fn install_composer(client: &reqwest::Client, paths: &Paths) -> Result<()> {
    let phar_path = composer_phar_path(paths);

    println!("  Downloading Composer...");
    download(client, COMPOSER_URL, &phar_path).await?;

    println!("  Verifying checksum...");
    let expected = fetch_checksum(client, COMPOSER_CHECKSUM_URL).await?;
    if let Err(err) = verify_checksum(&phar_path, &expected) {
        if let Err(remove_err) = std::fs::remove_file(&phar_path) {
            tracing::debug!(?remove_err, "cannot remove composer.phar after bad checksum");
        }
        return Err(err);
    }

    write_composer_shim(paths).await
}

pub fn composer_phar_path(paths: &Paths) -> PathBuf {
    paths.bin_dir().join("composer.phar")
}

/// `bin/composer` runs the phar through the version-dispatching `php` shim.
pub async fn write_composer_shim(paths: &Paths) -> Result<()> {
    let shim_path = paths.bin_dir().join("composer");
    let content = format!(
        "#!/bin/sh\nexec \"{}\" \"{}\" \"$@\"\n",
        paths.php_shim_path().display(),
        composer_phar_path(paths).display()
    );
    tokio::fs::write(&shim_path, content)
        .await
        .with_context(|| format!("cannot write {}", shim_path.display()))?;
    make_executable(&shim_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mago_assets_cover_both_platforms() {
        assert_eq!(
            asset_name(MAGO_PLATFORMS, "macos", "aarch64").unwrap(),
            "aarch64-apple-darwin"
        );
        assert_eq!(
            asset_name(MAGO_PLATFORMS, "linux", "x86_64").unwrap(),
            "x86_64-unknown-linux-gnu"
        );
    }

    #[tokio::test]
    async fn composer_version_is_always_latest() {
        let client = http_client().unwrap();
        let version = fetch_latest_version(&client, &COMPOSER).await.unwrap();
        assert_eq!(version, "latest");
    }

    #[tokio::test]
    async fn composer_shim_dispatches_through_the_php_shim() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_root(dir.path().to_path_buf());
        paths.ensure_dirs().unwrap();

        write_composer_shim(&paths).await.unwrap();

        let shim = std::fs::read_to_string(paths.bin_dir().join("composer")).unwrap();
        assert!(shim.starts_with("#!/bin/sh\n"));
        assert!(shim.contains("composer.phar"));
        assert!(shim.contains(&paths.php_shim_path().display().to_string()));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(paths.bin_dir().join("composer"))
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o111, 0o111);
        }
    }
}
