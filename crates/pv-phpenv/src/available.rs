//! Discovering which PHP versions the release repository offers.

use std::collections::BTreeSet;

use anyhow::{bail, Context, Result};
use regex::Regex;
use serde::Deserialize;

use crate::install::{latest_release_tag, RELEASE_REPO};
use crate::version::sort_versions;

#[derive(Deserialize)]
struct Release {
    #[serde(default)]
    assets: Vec<Asset>,
}

#[derive(Deserialize)]
struct Asset {
    name: String,
}

/// Fetches the PHP versions available in the latest release by examining
/// asset names like `frankenphp-mac-arm64-php8.4`. Sorted lowest first.
pub async fn available_versions(client: &reqwest::Client) -> Result<Vec<String>> {
    let tag = latest_release_tag(client).await?;

    let url = format!("https://api.github.com/repos/{RELEASE_REPO}/releases/tags/{tag}");
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
    versions_from_assets(release.assets.iter().map(|a| a.name.as_str()))
}

/// Distinct `major.minor` versions named by release assets.
fn versions_from_assets<'a>(names: impl Iterator<Item = &'a str>) -> Result<Vec<String>> {
    let re = Regex::new(r"-php(\d+\.\d+)$")?;

    let mut seen = BTreeSet::new();
    for name in names {
        if let Some(version) = re.captures(name).and_then(|caps| caps.get(1)) {
            seen.insert(version.as_str().to_string());
        }
    }

    let mut versions: Vec<String> = seen.into_iter().collect();
    sort_versions(&mut versions);
    Ok(versions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versions_deduplicate_across_platforms() {
        let assets = [
            "frankenphp-mac-arm64-php8.3",
            "frankenphp-mac-x86_64-php8.3",
            "frankenphp-linux-x86_64-php8.3",
            "frankenphp-mac-arm64-php8.4",
            "checksums.txt",
        ];
        let versions = versions_from_assets(assets.into_iter()).unwrap();
        assert_eq!(versions, ["8.3", "8.4"]);
    }

    #[test]
    fn versions_sort_numerically() {
        let assets = [
            "frankenphp-linux-x86_64-php8.10",
            "frankenphp-linux-x86_64-php8.9",
        ];
        let versions = versions_from_assets(assets.into_iter()).unwrap();
        assert_eq!(versions, ["8.9", "8.10"]);
    }

    #[test]
    fn suffix_must_terminate_the_name() {
        let assets = ["frankenphp-linux-x86_64-php8.4.tar.gz"];
        assert!(versions_from_assets(assets.into_iter())
            .unwrap()
            .is_empty());
    }
}
