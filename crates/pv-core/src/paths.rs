//! The on-disk layout. Every path `pv` touches derives from a single root
//! (`~/.pv` by default) through pure functions, so two processes agree on
//! the layout without shared state.

use std::io;
use std::path::{Path, PathBuf};

/// UDP port the loopback DNS responder binds to.
pub const DNS_PORT: u16 = 10053;

/// Port of the main FrankenPHP instance's Caddy admin API.
pub const ADMIN_PORT: u16 = 2019;

/// Resolved filesystem layout for a `pv` installation.
///
/// ```text
/// ~/.pv/
///   bin/                     frankenphp symlink, tool binaries, php shim
///   php/<major.minor>/       per-version frankenphp + php CLI
///   config/
///     Caddyfile              main server config
///     php-<v>.Caddyfile      one per active non-global version
///     sites/<name>.caddy     per-project main-server config
///     sites-<v>/<name>.caddy per-project secondary config
///     settings.json
///   data/                    registry.json, versions.json, pv.pid
///   logs/                    caddy.log, caddy-<v>.log
/// ```
#[derive(Debug, Clone)]
pub struct Paths {
    root: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

impl Paths {
    /// Layout rooted at `~/.pv`.
    pub fn new() -> Self {
        let root = directories::UserDirs::new().map_or_else(
            || PathBuf::from(".pv"),
            |dirs| dirs.home_dir().join(".pv"),
        );
        Self { root }
    }

    /// Layout rooted at an arbitrary directory. Tests use this to sandbox.
    pub const fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.root.join("bin")
    }

    pub fn php_dir(&self) -> PathBuf {
        self.root.join("php")
    }

    pub fn php_version_dir(&self, version: &str) -> PathBuf {
        self.php_dir().join(version)
    }

    pub fn config_dir(&self) -> PathBuf {
        self.root.join("config")
    }

    pub fn sites_dir(&self) -> PathBuf {
        self.config_dir().join("sites")
    }

    pub fn version_sites_dir(&self, version: &str) -> PathBuf {
        self.config_dir().join(format!("sites-{version}"))
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn settings_path(&self) -> PathBuf {
        self.config_dir().join("settings.json")
    }

    pub fn registry_path(&self) -> PathBuf {
        self.data_dir().join("registry.json")
    }

    pub fn versions_path(&self) -> PathBuf {
        self.data_dir().join("versions.json")
    }

    pub fn pid_path(&self) -> PathBuf {
        self.data_dir().join("pv.pid")
    }

    pub fn caddyfile_path(&self) -> PathBuf {
        self.config_dir().join("Caddyfile")
    }

    pub fn version_caddyfile_path(&self, version: &str) -> PathBuf {
        self.config_dir().join(format!("php-{version}.Caddyfile"))
    }

    pub fn caddy_log_path(&self) -> PathBuf {
        self.logs_dir().join("caddy.log")
    }

    pub fn version_caddy_log_path(&self, version: &str) -> PathBuf {
        self.logs_dir().join(format!("caddy-{version}.log"))
    }

    /// The `bin/frankenphp` symlink repointed by `pv use`.
    pub fn frankenphp_path(&self) -> PathBuf {
        self.bin_dir().join("frankenphp")
    }

    /// The real frankenphp binary for one installed version.
    pub fn frankenphp_for_version(&self, version: &str) -> PathBuf {
        self.php_version_dir(version).join("frankenphp")
    }

    /// The static php CLI binary for one installed version.
    pub fn php_cli_for_version(&self, version: &str) -> PathBuf {
        self.php_version_dir(version).join("php")
    }

    /// The version-dispatching `bin/php` shim script.
    pub fn php_shim_path(&self) -> PathBuf {
        self.bin_dir().join("php")
    }

    /// Caddy's local CA root certificate, inside the pv tree because of
    /// [`Paths::caddy_env`].
    pub fn ca_cert_path(&self) -> PathBuf {
        self.root
            .join("caddy")
            .join("pki")
            .join("authorities")
            .join("local")
            .join("root.crt")
    }

    /// Environment that points Caddy's storage into the pv tree instead of
    /// the platform-default XDG directories.
    pub fn caddy_env(&self) -> Vec<(String, String)> {
        let root = self.root.display().to_string();
        vec![
            ("XDG_DATA_HOME".to_string(), root.clone()),
            ("XDG_CONFIG_HOME".to_string(), root),
        ]
    }

    /// Create the full directory tree. Idempotent.
    pub fn ensure_dirs(&self) -> io::Result<()> {
        for dir in [
            self.config_dir(),
            self.sites_dir(),
            self.logs_dir(),
            self.data_dir(),
            self.bin_dir(),
            self.php_dir(),
        ] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}

/// HTTP port for a secondary FrankenPHP instance.
///
/// Scheme: `8000 + major*100 + minor*10`, e.g. PHP 8.3 → 8830, PHP 8.4 →
/// 8840. Deterministic so the config generator and the supervisor agree
/// without shared state.
pub fn port_for_version(version: &str) -> u16 {
    let mut parts = version.split('.');
    let major: u16 = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
    let minor: u16 = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
    8000 + major * 100 + minor * 10
}
