//! Persisted user settings: the synthetic TLD and the global PHP default.

use crate::paths::Paths;
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// TLD used when none has been configured.
pub const DEFAULT_TLD: &str = "test";

// One DNS label: 1-63 chars, lowercase alphanumerics and inner hyphens.
const LABEL_PATTERN: &str = "^[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?$";

#[derive(Debug, Error)]
#[error("{0:?} is not a valid DNS label (1-63 lowercase letters, digits, inner hyphens)")]
pub struct InvalidLabel(pub String);

/// Contents of `config/settings.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settings {
    /// Top-level domain all linked projects are served under.
    #[serde(default = "default_tld")]
    pub tld: String,
    /// PHP `major.minor` served directly by the main server; empty until
    /// `pv use` or the first `pv php install` sets it.
    #[serde(default)]
    pub global_php: String,
}

fn default_tld() -> String {
    DEFAULT_TLD.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tld: default_tld(),
            global_php: String::new(),
        }
    }
}

impl Settings {
    /// Load settings, or defaults when the file does not exist yet.
    ///
    /// An empty `tld` in the file normalizes to [`DEFAULT_TLD`].
    pub async fn load(paths: &Paths) -> Result<Self> {
        Self::load_from_path(&paths.settings_path()).await
    }

    pub async fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("cannot read settings from {}", path.display()))?;
        let mut settings: Self = serde_json::from_str(&content)
            .with_context(|| format!("cannot parse settings at {}", path.display()))?;
        if settings.tld.is_empty() {
            settings.tld = default_tld();
        }
        Ok(settings)
    }

    pub async fn save(&self, paths: &Paths) -> Result<()> {
        self.save_to_path(&paths.settings_path()).await
    }

    pub async fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut content = serde_json::to_string_pretty(self)?;
        content.push('\n');
        tokio::fs::write(path, content)
            .await
            .with_context(|| format!("cannot write settings to {}", path.display()))?;
        Ok(())
    }
}

/// Check that `label` can stand as one DNS label (project name or TLD).
pub fn validate_label(label: &str) -> Result<()> {
    let re = Regex::new(LABEL_PATTERN)?;
    if !re.is_match(label) {
        return Err(InvalidLabel(label.to_string()).into());
    }
    Ok(())
}

/// Check that `tld` is usable as the synthetic top-level domain.
pub fn validate_tld(tld: &str) -> Result<()> {
    validate_label(tld).context("invalid TLD")
}
