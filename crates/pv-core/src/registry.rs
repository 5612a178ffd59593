//! The project registry: an ordered list of linked projects persisted as
//! `data/registry.json`.

use crate::paths::Paths;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("a project named {0:?} is already linked")]
    DuplicateName(String),
    #[error("no linked project named {0:?}")]
    NotFound(String),
}

/// What kind of thing lives in a linked directory, decided once at link
/// time by [`crate::detect::detect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ProjectType {
    #[serde(rename = "laravel-octane")]
    LaravelOctane,
    #[serde(rename = "laravel")]
    Laravel,
    #[serde(rename = "php")]
    Php,
    #[serde(rename = "static")]
    Static,
    /// Nothing recognizable; no site config is emitted.
    #[default]
    #[serde(rename = "", other)]
    Unknown,
}

impl ProjectType {
    /// Types that run through a PHP interpreter (and therefore care which
    /// version serves them).
    pub fn is_php(self) -> bool {
        matches!(self, Self::LaravelOctane | Self::Laravel | Self::Php)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::LaravelOctane => "laravel-octane",
            Self::Laravel => "laravel",
            Self::Php => "php",
            Self::Static => "static",
            Self::Unknown => "",
        }
    }
}

impl fmt::Display for ProjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One linked project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Project {
    /// DNS label; the site is served at `<name>.<tld>`.
    pub name: String,
    /// Absolute project directory.
    pub path: PathBuf,
    #[serde(rename = "type", default)]
    pub kind: ProjectType,
    /// Pinned PHP `major.minor`, or empty to follow the global default.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub php: String,
}

impl Project {
    /// The version that actually serves this project: the pin if set, else
    /// the global default.
    pub fn effective_php<'a>(&'a self, global_php: &'a str) -> &'a str {
        if self.php.is_empty() {
            global_php
        } else {
            &self.php
        }
    }
}

/// Ordered project list. Insertion order is preserved for listing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default)]
    pub projects: Vec<Project>,
}

impl Registry {
    /// Load the registry, or an empty one when the file does not exist.
    pub async fn load(paths: &Paths) -> Result<Self> {
        Self::load_from_path(&paths.registry_path()).await
    }

    pub async fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("cannot read registry from {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(&content)
            .with_context(|| format!("cannot parse registry at {}", path.display()))
    }

    pub async fn save(&self, paths: &Paths) -> Result<()> {
        self.save_to_path(&paths.registry_path()).await
    }

    pub async fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut content = serde_json::to_string_pretty(self)?;
        content.push('\n');
        tokio::fs::write(path, content)
            .await
            .with_context(|| format!("cannot write registry to {}", path.display()))?;
        Ok(())
    }

    /// Append a project. Names are unique; the registry is unchanged on
    /// conflict. Two names may point at the same path intentionally.
    pub fn add(&mut self, project: Project) -> Result<(), RegistryError> {
        if self.find(&project.name).is_some() {
            return Err(RegistryError::DuplicateName(project.name));
        }
        self.projects.push(project);
        Ok(())
    }

    /// Remove by name, returning the removed project.
    pub fn remove(&mut self, name: &str) -> Result<Project, RegistryError> {
        let idx = self
            .projects
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        Ok(self.projects.remove(idx))
    }

    pub fn find(&self, name: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.name == name)
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut Project> {
        self.projects.iter_mut().find(|p| p.name == name)
    }

    pub fn find_by_path(&self, path: &Path) -> Option<&Project> {
        self.projects.iter().find(|p| p.path == path)
    }

    pub fn list(&self) -> &[Project] {
        &self.projects
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    /// Group projects by effective PHP version. Projects without a pin land
    /// under `default_version`.
    pub fn group_by_php(&self, default_version: &str) -> BTreeMap<String, Vec<&Project>> {
        let mut groups: BTreeMap<String, Vec<&Project>> = BTreeMap::new();
        for p in &self.projects {
            groups
                .entry(p.effective_php(default_version).to_string())
                .or_default()
                .push(p);
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn project(name: &str, php: &str) -> Project {
        Project {
            name: name.to_string(),
            path: PathBuf::from("/srv").join(name),
            kind: ProjectType::Laravel,
            php: php.to_string(),
        }
    }

    #[test]
    fn add_rejects_duplicate_names_and_leaves_registry_unchanged() {
        let mut registry = Registry::default();
        registry.add(project("blog", "")).unwrap();

        let err = registry.add(project("blog", "8.3")).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateName("blog".to_string()));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.find("blog").unwrap().php, "");
    }

    #[test]
    fn add_allows_same_path_under_two_names() {
        let mut registry = Registry::default();
        let mut a = project("a", "");
        let mut b = project("b", "");
        a.path = PathBuf::from("/srv/shared");
        b.path = PathBuf::from("/srv/shared");
        registry.add(a).unwrap();
        registry.add(b).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn remove_returns_the_project() {
        let mut registry = Registry::default();
        registry.add(project("blog", "8.3")).unwrap();

        let removed = registry.remove("blog").unwrap();
        assert_eq!(removed.php, "8.3");
        assert!(registry.is_empty());

        let err = registry.remove("blog").unwrap_err();
        assert_eq!(err, RegistryError::NotFound("blog".to_string()));
    }

    #[test]
    fn listing_preserves_insertion_order() {
        let mut registry = Registry::default();
        for name in ["zulu", "alpha", "mike"] {
            registry.add(project(name, "")).unwrap();
        }
        let names: Vec<_> = registry.list().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["zulu", "alpha", "mike"]);
    }

    #[test]
    fn group_by_php_resolves_empty_to_default() {
        let mut registry = Registry::default();
        registry.add(project("a", "")).unwrap();
        registry.add(project("b", "8.3")).unwrap();
        registry.add(project("c", "")).unwrap();

        let groups = registry.group_by_php("8.4");
        assert_eq!(groups["8.4"].len(), 2);
        assert_eq!(groups["8.3"].len(), 1);
    }

    #[tokio::test]
    async fn persistence_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data").join("registry.json");

        let mut registry = Registry::default();
        registry.add(project("blog", "8.3")).unwrap();
        registry
            .add(Project {
                name: "docs".to_string(),
                path: PathBuf::from("/srv/docs"),
                kind: ProjectType::Static,
                php: String::new(),
            })
            .unwrap();
        registry.save_to_path(&path).await.unwrap();

        // `php` is omitted when empty; `type` uses the wire names.
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"type\": \"laravel\""));
        assert!(raw.contains("\"type\": \"static\""));
        assert!(raw.contains("\"php\": \"8.3\""));
        assert_eq!(raw.matches("\"php\"").count(), 1);

        let loaded = Registry::load_from_path(&path).await.unwrap();
        assert_eq!(loaded.list(), registry.list());
    }

    #[tokio::test]
    async fn missing_and_empty_files_load_as_empty() {
        let dir = tempdir().unwrap();
        let missing = Registry::load_from_path(&dir.path().join("registry.json"))
            .await
            .unwrap();
        assert!(missing.is_empty());

        let path = dir.path().join("empty.json");
        std::fs::write(&path, "  \n").unwrap();
        let empty = Registry::load_from_path(&path).await.unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn unknown_type_round_trips_as_empty_string() {
        let p = Project {
            name: "mystery".to_string(),
            path: PathBuf::from("/srv/mystery"),
            kind: ProjectType::Unknown,
            php: String::new(),
        };
        let json = serde_json::to_string(&p).unwrap();
        assert!(json.contains("\"type\":\"\""));
        let back: Project = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind, ProjectType::Unknown);
    }
}
