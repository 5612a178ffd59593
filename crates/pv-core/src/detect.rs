//! Project type detection.
//!
//! Best-effort by design: missing or unreadable files fall through to the
//! next rule, and the answer for an unrecognizable directory is
//! [`ProjectType::Unknown`], never an error.

use crate::registry::ProjectType;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct ComposerManifest {
    #[serde(default)]
    require: HashMap<String, String>,
}

/// Examine `project_path` and classify it.
///
/// Precedence (first hit wins):
/// 1. composer.json requiring `laravel/framework` + `laravel/octane`, with
///    `public/frankenphp-worker.php` present → [`ProjectType::LaravelOctane`]
/// 2. composer.json requiring `laravel/framework` → [`ProjectType::Laravel`]
/// 3. any parseable composer.json → [`ProjectType::Php`]
/// 4. `index.html` at the root → [`ProjectType::Static`]
/// 5. otherwise → [`ProjectType::Unknown`]
pub fn detect(project_path: &Path) -> ProjectType {
    if let Some(manifest) = read_composer(project_path) {
        if manifest.require.contains_key("laravel/framework") {
            if manifest.require.contains_key("laravel/octane")
                && project_path
                    .join("public")
                    .join("frankenphp-worker.php")
                    .exists()
            {
                return ProjectType::LaravelOctane;
            }
            return ProjectType::Laravel;
        }
        return ProjectType::Php;
    }

    if project_path.join("index.html").exists() {
        return ProjectType::Static;
    }

    ProjectType::Unknown
}

fn read_composer(project_path: &Path) -> Option<ComposerManifest> {
    let data = std::fs::read(project_path.join("composer.json")).ok()?;
    serde_json::from_slice(&data).ok()
}
