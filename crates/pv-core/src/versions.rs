//! Bookkeeping for externally fetched tool binaries: which version of each
//! tool is installed, persisted as `data/versions.json`.

use crate::paths::Paths;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Contents of `data/versions.json`: tool name → installed version.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VersionState {
    #[serde(default)]
    pub versions: BTreeMap<String, String>,
}

impl VersionState {
    pub async fn load(paths: &Paths) -> Result<Self> {
        Self::load_from_path(&paths.versions_path()).await
    }

    pub async fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("cannot read version state from {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("cannot parse version state at {}", path.display()))
    }

    pub async fn save(&self, paths: &Paths) -> Result<()> {
        self.save_to_path(&paths.versions_path()).await
    }

    pub async fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut content = serde_json::to_string_pretty(self)?;
        content.push('\n');
        tokio::fs::write(path, content)
            .await
            .with_context(|| format!("cannot write version state to {}", path.display()))?;
        Ok(())
    }

    /// Recorded version for a tool; empty when the tool was never installed.
    pub fn get(&self, tool: &str) -> &str {
        self.versions.get(tool).map_or("", String::as_str)
    }

    pub fn set(&mut self, tool: &str, version: &str) {
        self.versions.insert(tool.to_string(), version.to_string());
    }

    /// Whether `latest` differs from the recorded version. Leading `v`
    /// prefixes are ignored so GitHub tags compare against bare versions.
    pub fn needs_update(&self, tool: &str, latest: &str) -> bool {
        let installed = self.get(tool);
        if installed.is_empty() {
            return true;
        }
        normalize(installed) != normalize(latest)
    }
}

fn normalize(version: &str) -> &str {
    version.strip_prefix('v').unwrap_or(version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn roundtrip_and_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("versions.json");

        let empty = VersionState::load_from_path(&path).await.unwrap();
        assert_eq!(empty.get("composer"), "");

        let mut state = VersionState::default();
        state.set("composer", "latest");
        state.set("mago", "1.12.0");
        state.save_to_path(&path).await.unwrap();

        let loaded = VersionState::load_from_path(&path).await.unwrap();
        assert_eq!(loaded, state);
        assert_eq!(loaded.get("mago"), "1.12.0");
    }

    #[test]
    fn needs_update_ignores_v_prefix() {
        let mut state = VersionState::default();
        assert!(state.needs_update("frankenphp", "v1.11.3"));

        state.set("frankenphp", "v1.11.3");
        assert!(!state.needs_update("frankenphp", "1.11.3"));
        assert!(!state.needs_update("frankenphp", "v1.11.3"));
        assert!(state.needs_update("frankenphp", "v1.12.0"));
    }
}
