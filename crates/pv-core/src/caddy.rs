//! Site config generation for the main and secondary FrankenPHP servers.
//!
//! The route table is never held in memory. It is recomputed from
//! `(projects, global_php)` into a file tree under `config/`, and the
//! running server is asked to re-read it. [`generate_all_configs`] is the
//! reconciliation point: the tree it leaves behind is a pure function of
//! its inputs, so stale files from earlier states cannot survive.

use crate::paths::{self, Paths};
use crate::registry::{Project, ProjectType};
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Top-level config for the main server: FrankenPHP with its own local CA,
/// importing every per-site file.
const MAIN_CADDYFILE: &str = "{
    frankenphp
    local_certs
}

import sites/*
";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    /// Served by the main instance; terminates TLS itself.
    Main,
    /// Served by a secondary instance in plain HTTP behind the main proxy.
    Secondary,
}

/// Regenerate the entire config tree from scratch.
///
/// 1. Remove `sites/` and every `sites-*/`, recreate `sites/`.
/// 2. Write per-project configs (direct body, or proxy stub + secondary body).
/// 3. Rewrite the top-level Caddyfile.
/// 4. Write `php-<v>.Caddyfile` for each active non-global version.
/// 5. Remove stale `php-<v>.Caddyfile` files.
pub async fn generate_all_configs(
    paths: &Paths,
    tld: &str,
    projects: &[Project],
    global_php: &str,
) -> Result<()> {
    clean_sites_dirs(paths).await?;

    for project in projects {
        generate_site_config(paths, project, tld, global_php)
            .await
            .with_context(|| format!("cannot generate site config for {:?}", project.name))?;
    }

    generate_caddyfile(paths).await?;

    let active = active_versions(projects, global_php);
    for version in &active {
        generate_version_caddyfile(paths, version).await?;
    }

    cleanup_stale_version_caddyfiles(paths, &active).await
}

/// Write the config file(s) for one project.
///
/// A project is served directly by the main server when `global_php` is
/// empty (single-version mode), when its effective version equals the
/// global, or when it is not a PHP type. Otherwise the main server gets a
/// reverse-proxy stub and the real body goes under `sites-<v>/` for the
/// secondary bound to that version's port.
pub async fn generate_site_config(
    paths: &Paths,
    project: &Project,
    tld: &str,
    global_php: &str,
) -> Result<()> {
    if project.kind == ProjectType::Unknown {
        return Ok(());
    }
    paths.ensure_dirs()?;

    let root = resolve_root(project);
    let version = project.effective_php(global_php);
    let needs_proxy = !global_php.is_empty() && version != global_php && project.kind.is_php();

    if needs_proxy {
        let port = paths::port_for_version(version);
        write_site(
            &paths.sites_dir(),
            &project.name,
            &proxy_site(&project.name, tld, port),
        )
        .await?;

        let version_dir = paths.version_sites_dir(version);
        fs::create_dir_all(&version_dir).await?;
        if let Some(body) = site_body(project, tld, &root, Role::Secondary) {
            write_site(&version_dir, &project.name, &body).await?;
        }
        return Ok(());
    }

    if let Some(body) = site_body(project, tld, &root, Role::Main) {
        write_site(&paths.sites_dir(), &project.name, &body).await?;
    }
    Ok(())
}

/// Remove every config file for a project (main and all version dirs).
pub async fn remove_site_config(paths: &Paths, name: &str) -> Result<()> {
    remove_if_exists(&paths.sites_dir().join(format!("{name}.caddy"))).await?;

    let Ok(mut entries) = fs::read_dir(paths.config_dir()).await else {
        return Ok(());
    };
    while let Some(entry) = entries.next_entry().await? {
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type().await?.is_dir() && file_name.starts_with("sites-") {
            remove_if_exists(&entry.path().join(format!("{name}.caddy"))).await?;
        }
    }
    Ok(())
}

/// Write the main server's top-level Caddyfile.
pub async fn generate_caddyfile(paths: &Paths) -> Result<()> {
    paths.ensure_dirs()?;
    fs::write(paths.caddyfile_path(), MAIN_CADDYFILE)
        .await
        .context("cannot write main Caddyfile")
}

/// Write the Caddyfile for one secondary instance: plain HTTP on the
/// version's port, no admin API, importing `sites-<v>/*`.
pub async fn generate_version_caddyfile(paths: &Paths, version: &str) -> Result<()> {
    paths.ensure_dirs()?;
    let port = paths::port_for_version(version);
    let content = format!(
        "{{
    frankenphp
    auto_https off
    admin off
    http_port {port}
}}

import sites-{version}/*
"
    );
    fs::write(paths.version_caddyfile_path(version), content)
        .await
        .with_context(|| format!("cannot write Caddyfile for PHP {version}"))
}

/// The set of non-global PHP versions that have at least one linked PHP
/// project, i.e. the secondary instances the supervisor must run.
pub fn active_versions(projects: &[Project], global_php: &str) -> BTreeSet<String> {
    projects
        .iter()
        .filter(|p| p.kind.is_php())
        .map(|p| p.effective_php(global_php))
        .filter(|v| !v.is_empty() && *v != global_php)
        .map(str::to_string)
        .collect()
}

/// Document root served for a project.
///
/// Laravel apps serve `public/`; plain PHP serves `public/` only when that
/// directory exists; everything else serves the project root.
pub fn resolve_root(project: &Project) -> PathBuf {
    match project.kind {
        ProjectType::Laravel | ProjectType::LaravelOctane => project.path.join("public"),
        ProjectType::Php => {
            let public = project.path.join("public");
            if public.is_dir() {
                public
            } else {
                project.path.clone()
            }
        }
        _ => project.path.clone(),
    }
}

fn site_body(project: &Project, tld: &str, root: &Path, role: Role) -> Option<String> {
    let name = &project.name;
    let root = root.display();
    let host = match role {
        Role::Main => format!("{name}.{tld}"),
        Role::Secondary => format!("http://{name}.{tld}"),
    };
    let tls = match role {
        Role::Main => "    tls internal\n",
        Role::Secondary => "",
    };

    match project.kind {
        ProjectType::LaravelOctane => {
            let path = project.path.display();
            Some(format!(
                "{host} {{
{tls}    root * {root}
    encode zstd gzip

    php_server {{
        root {root}
        worker {{
            file frankenphp-worker.php
            num 1
            watch {path}/**/*.php
        }}
    }}
}}
"
            ))
        }
        ProjectType::Laravel | ProjectType::Php => Some(format!(
            "{host} {{
{tls}    root * {root}
    encode zstd gzip

    php_server {{
        root {root}
        worker index.php
    }}
}}
"
        )),
        ProjectType::Static if role == Role::Main => Some(format!(
            "{host} {{
    tls internal
    root * {root}
    file_server
}}
"
        )),
        _ => None,
    }
}

fn proxy_site(name: &str, tld: &str, port: u16) -> String {
    format!(
        "{name}.{tld} {{
    tls internal
    reverse_proxy 127.0.0.1:{port}
}}
"
    )
}

async fn write_site(dir: &Path, name: &str, body: &str) -> Result<()> {
    let path = dir.join(format!("{name}.caddy"));
    fs::write(&path, body)
        .await
        .with_context(|| format!("cannot write {}", path.display()))
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("cannot remove {}", path.display())),
    }
}

async fn clean_sites_dirs(paths: &Paths) -> Result<()> {
    let sites = paths.sites_dir();
    match fs::remove_dir_all(&sites).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e).context("cannot clean sites dir"),
    }
    fs::create_dir_all(&sites).await?;

    let Ok(mut entries) = fs::read_dir(paths.config_dir()).await else {
        return Ok(());
    };
    while let Some(entry) = entries.next_entry().await? {
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if entry.file_type().await?.is_dir() && file_name.starts_with("sites-") {
            fs::remove_dir_all(entry.path())
                .await
                .with_context(|| format!("cannot clean {file_name}"))?;
        }
    }
    Ok(())
}

async fn cleanup_stale_version_caddyfiles(paths: &Paths, active: &BTreeSet<String>) -> Result<()> {
    let Ok(mut entries) = fs::read_dir(paths.config_dir()).await else {
        return Ok(());
    };
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().into_owned();
        let Some(version) = file_name
            .strip_prefix("php-")
            .and_then(|rest| rest.strip_suffix(".Caddyfile"))
        else {
            continue;
        };
        if !active.contains(version) {
            remove_if_exists(&entry.path()).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn project(name: &str, path: &Path, kind: ProjectType, php: &str) -> Project {
        Project {
            name: name.to_string(),
            path: path.to_path_buf(),
            kind,
            php: php.to_string(),
        }
    }

    /// Snapshot of every file under the config dir, path → content.
    fn config_tree(paths: &Paths) -> BTreeMap<String, String> {
        fn walk(dir: &Path, base: &Path, out: &mut BTreeMap<String, String>) {
            let Ok(entries) = std::fs::read_dir(dir) else {
                return;
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    walk(&path, base, out);
                } else {
                    let rel = path
                        .strip_prefix(base)
                        .unwrap_or(&path)
                        .to_string_lossy()
                        .into_owned();
                    out.insert(rel, std::fs::read_to_string(&path).unwrap());
                }
            }
        }
        let mut out = BTreeMap::new();
        walk(&paths.config_dir(), &paths.config_dir(), &mut out);
        out
    }

    #[tokio::test]
    async fn fresh_static_link_emits_file_server_and_no_version_dirs() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_root(dir.path().join("pv"));
        let projects = vec![project(
            "site",
            Path::new("/tmp/site"),
            ProjectType::Static,
            "",
        )];

        generate_all_configs(&paths, "test", &projects, "").await.unwrap();

        let body =
            std::fs::read_to_string(paths.sites_dir().join("site.caddy")).unwrap();
        assert!(body.starts_with("site.test {"));
        assert!(body.contains("file_server"));
        assert!(body.contains("tls internal"));

        let tree = config_tree(&paths);
        assert!(tree.keys().all(|k| !k.starts_with("sites-")), "{tree:?}");
    }

    #[tokio::test]
    async fn non_global_php_project_gets_proxy_stub_and_secondary_body() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_root(dir.path().join("pv"));
        let app = dir.path().join("app");
        let projects = vec![project("app", &app, ProjectType::Laravel, "8.3")];

        generate_all_configs(&paths, "test", &projects, "8.4").await.unwrap();

        let main = std::fs::read_to_string(paths.sites_dir().join("app.caddy")).unwrap();
        assert!(main.contains("reverse_proxy 127.0.0.1:8830"));
        assert!(main.contains("tls internal"));
        assert!(!main.contains("php_server"));

        let secondary =
            std::fs::read_to_string(paths.version_sites_dir("8.3").join("app.caddy")).unwrap();
        assert!(secondary.starts_with("http://app.test {"));
        assert!(!secondary.contains("tls internal"));
        assert!(secondary.contains("php_server"));
        assert!(secondary.contains(&format!("root * {}", app.join("public").display())));

        let version_caddyfile =
            std::fs::read_to_string(paths.version_caddyfile_path("8.3")).unwrap();
        assert!(version_caddyfile.contains("http_port 8830"));
        assert!(version_caddyfile.contains("admin off"));
        assert!(version_caddyfile.contains("auto_https off"));
        assert!(version_caddyfile.contains("import sites-8.3/*"));
    }

    #[tokio::test]
    async fn matching_global_version_serves_directly() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_root(dir.path().join("pv"));
        let projects = vec![project(
            "app",
            Path::new("/srv/app"),
            ProjectType::Laravel,
            "8.4",
        )];

        generate_all_configs(&paths, "test", &projects, "8.4").await.unwrap();

        let main = std::fs::read_to_string(paths.sites_dir().join("app.caddy")).unwrap();
        assert!(main.contains("php_server"));
        assert!(!main.contains("reverse_proxy"));
        assert!(!paths.version_sites_dir("8.4").exists());
    }

    #[tokio::test]
    async fn empty_global_means_single_version_mode() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_root(dir.path().join("pv"));
        // Pinned version, but no global: still served directly.
        let projects = vec![project(
            "app",
            Path::new("/srv/app"),
            ProjectType::Php,
            "8.3",
        )];

        generate_all_configs(&paths, "test", &projects, "").await.unwrap();

        let main = std::fs::read_to_string(paths.sites_dir().join("app.caddy")).unwrap();
        assert!(main.contains("php_server"));
        assert!(config_tree(&paths).keys().all(|k| !k.starts_with("sites-")));
        // The pin still counts as an active version even though the site is
        // served directly, so its secondary Caddyfile exists.
        assert!(paths.version_caddyfile_path("8.3").exists());
    }

    #[tokio::test]
    async fn unknown_projects_emit_nothing() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_root(dir.path().join("pv"));
        let projects = vec![project(
            "mystery",
            Path::new("/srv/mystery"),
            ProjectType::Unknown,
            "",
        )];

        generate_all_configs(&paths, "test", &projects, "8.4").await.unwrap();
        assert!(!paths.sites_dir().join("mystery.caddy").exists());
    }

    #[tokio::test]
    async fn octane_worker_block_watches_project_tree() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_root(dir.path().join("pv"));
        let projects = vec![project(
            "fast",
            Path::new("/srv/fast"),
            ProjectType::LaravelOctane,
            "",
        )];

        generate_all_configs(&paths, "test", &projects, "").await.unwrap();

        let body = std::fs::read_to_string(paths.sites_dir().join("fast.caddy")).unwrap();
        assert!(body.contains("file frankenphp-worker.php"));
        assert!(body.contains("num 1"));
        assert!(body.contains("watch /srv/fast/**/*.php"));
        assert!(body.contains("root * /srv/fast/public"));
    }

    #[tokio::test]
    async fn regeneration_is_idempotent_and_removes_stale_state() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_root(dir.path().join("pv"));

        let with_pin = vec![
            project("app", Path::new("/srv/app"), ProjectType::Laravel, "8.3"),
            project("docs", Path::new("/srv/docs"), ProjectType::Static, ""),
        ];
        generate_all_configs(&paths, "test", &with_pin, "8.4").await.unwrap();
        let first = config_tree(&paths);

        generate_all_configs(&paths, "test", &with_pin, "8.4").await.unwrap();
        let second = config_tree(&paths);
        assert_eq!(first, second, "two runs over the same inputs must agree");

        // Drop the pinned project: its proxy stub, the sites-8.3 dir, and
        // the php-8.3.Caddyfile must all disappear.
        let without_pin = vec![with_pin[1].clone()];
        generate_all_configs(&paths, "test", &without_pin, "8.4").await.unwrap();
        let third = config_tree(&paths);

        assert!(third.contains_key("sites/docs.caddy"));
        assert!(!third.contains_key("sites/app.caddy"));
        assert!(third.keys().all(|k| !k.starts_with("sites-8.3")), "{third:?}");
        assert!(!third.contains_key("php-8.3.Caddyfile"));
    }

    #[tokio::test]
    async fn main_caddyfile_enables_local_certs_and_imports_sites() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_root(dir.path().join("pv"));
        generate_caddyfile(&paths).await.unwrap();

        let content = std::fs::read_to_string(paths.caddyfile_path()).unwrap();
        assert!(content.contains("frankenphp"));
        assert!(content.contains("local_certs"));
        assert!(content.contains("import sites/*"));
    }

    #[tokio::test]
    async fn remove_site_config_clears_all_roles() {
        let dir = tempdir().unwrap();
        let paths = Paths::with_root(dir.path().join("pv"));
        let projects = vec![project(
            "app",
            Path::new("/srv/app"),
            ProjectType::Laravel,
            "8.3",
        )];
        generate_all_configs(&paths, "test", &projects, "8.4").await.unwrap();
        assert!(paths.version_sites_dir("8.3").join("app.caddy").exists());

        remove_site_config(&paths, "app").await.unwrap();
        assert!(!paths.sites_dir().join("app.caddy").exists());
        assert!(!paths.version_sites_dir("8.3").join("app.caddy").exists());

        // Removing again is not an error.
        remove_site_config(&paths, "app").await.unwrap();
    }

    #[test]
    fn active_versions_dedupes_and_skips_global_static_and_empty() {
        let projects = vec![
            project("a", Path::new("/srv/a"), ProjectType::Laravel, "8.3"),
            project("b", Path::new("/srv/b"), ProjectType::Php, "8.3"),
            project("c", Path::new("/srv/c"), ProjectType::Laravel, "8.4"),
            project("d", Path::new("/srv/d"), ProjectType::Static, "8.2"),
            project("e", Path::new("/srv/e"), ProjectType::Laravel, ""),
            project("f", Path::new("/srv/f"), ProjectType::Unknown, "8.1"),
        ];

        let active = active_versions(&projects, "8.4");
        let got: Vec<_> = active.iter().map(String::as_str).collect();
        assert_eq!(got, ["8.3"]);

        // Without a global default every pinned version is "non-global".
        let all_pins = active_versions(&projects, "");
        let got: Vec<_> = all_pins.iter().map(String::as_str).collect();
        assert_eq!(got, ["8.3", "8.4"]);
    }

    #[test]
    fn resolve_root_prefers_public_for_php_only_when_present() {
        let dir = tempdir().unwrap();
        let with_public = dir.path().join("with");
        std::fs::create_dir_all(with_public.join("public")).unwrap();
        let without_public = dir.path().join("without");
        std::fs::create_dir_all(&without_public).unwrap();

        let p1 = project("w", &with_public, ProjectType::Php, "");
        assert_eq!(resolve_root(&p1), with_public.join("public"));

        let p2 = project("wo", &without_public, ProjectType::Php, "");
        assert_eq!(resolve_root(&p2), without_public);

        // Laravel always serves public/, present or not.
        let p3 = project("l", &without_public, ProjectType::Laravel, "");
        assert_eq!(resolve_root(&p3), without_public.join("public"));
    }
}
