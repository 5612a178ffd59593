use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlatformError {
    #[error("unsupported OS: {0}")]
    UnsupportedOs(String),
    #[error("unsupported architecture: {0}/{1}")]
    UnsupportedArch(String, String),
}

/// pv runs on macOS and Linux only.
pub fn check_os() -> Result<(), PlatformError> {
    match std::env::consts::OS {
        "macos" | "linux" => Ok(()),
        other => Err(PlatformError::UnsupportedOs(other.to_string())),
    }
}

pub fn label() -> String {
    format!("{}/{}", std::env::consts::OS, std::env::consts::ARCH)
}

/// `(os, arch) → release asset name` lookup table.
pub type AssetTable = &'static [((&'static str, &'static str), &'static str)];

/// Map `(os, arch)` through a release-asset naming table.
pub fn asset_name(table: AssetTable, os: &str, arch: &str) -> Result<&'static str, PlatformError> {
    if !table.iter().any(|((table_os, _), _)| *table_os == os) {
        return Err(PlatformError::UnsupportedOs(os.to_string()));
    }
    table
        .iter()
        .find(|((table_os, table_arch), _)| *table_os == os && *table_arch == arch)
        .map(|(_, name)| *name)
        .ok_or_else(|| PlatformError::UnsupportedArch(os.to_string(), arch.to_string()))
}
