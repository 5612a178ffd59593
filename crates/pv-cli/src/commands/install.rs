//! `pv install`: first-time setup.
//!
//! Walks through the whole bootstrap: prerequisites, directories, settings,
//! PHP, tools, shims, Caddyfile, registry, resolver, CA trust, self-test.
//! The privileged steps (resolver file, trust) are non-fatal; everything
//! they would have done is printed for manual recovery.

use anyhow::{bail, Context, Result};
use pv_core::{caddy, Paths, Registry, Settings, VersionState};
use pv_utils::platform;

use super::CliError;
use crate::{setup, tools};

pub async fn run(force: bool, tld: &str, php: Option<&str>) -> Result<()> {
    pv_core::settings::validate_tld(tld)?;

    let paths = Paths::new();

    println!("Checking prerequisites...");
    platform::check_os()?;
    println!("  ✓ {} detected", platform::label());

    if setup::is_already_installed(&paths) && !force {
        return Err(CliError::AlreadyInstalled(paths.root().display().to_string()).into());
    }

    println!("\nCreating directory structure...");
    paths.ensure_dirs().context("cannot create directories")?;
    println!("  ✓ ~/.pv directories created");

    let settings = Settings {
        tld: tld.to_string(),
        global_php: String::new(),
    };
    settings.save(&paths).await.context("cannot save settings")?;
    println!("  ✓ TLD set to .{tld}");

    let client = tools::http_client()?;

    let php_version = match php {
        Some(version) => {
            pv_phpenv::validate_version_format(version)?;
            version.to_string()
        }
        None => {
            println!("\nDetecting available PHP versions...");
            let available = pv_phpenv::available::available_versions(&client)
                .await
                .context("cannot detect available PHP versions")?;
            let Some(latest) = available.last() else {
                bail!("no PHP versions found in releases");
            };
            println!("  Latest available: PHP {latest}");
            latest.clone()
        }
    };

    println!("\nInstalling PHP {php_version}...");
    pv_phpenv::install::install(&client, &paths, &php_version)
        .await
        .with_context(|| format!("cannot install PHP {php_version}"))?;

    pv_phpenv::set_global(&paths, &php_version)
        .await
        .context("cannot set global PHP")?;
    println!("  ✓ PHP {php_version} set as global default");

    println!("\nDownloading tools...");
    let mut versions = VersionState::load(&paths)
        .await
        .context("cannot load version state")?;

    for tool in tools::TOOLS {
        let latest = tools::fetch_latest_version(&client, tool)
            .await
            .with_context(|| format!("cannot check {} version", tool.display_name))?;

        tools::install_tool(&client, &paths, tool, &latest)
            .await
            .with_context(|| format!("cannot install {}", tool.display_name))?;

        versions.set(tool.name, &latest);
    }

    println!("\nWriting PHP shim...");
    pv_phpenv::shim::write_shims(&paths)
        .await
        .context("cannot write shims")?;
    println!("  ✓ PHP shim created");

    println!("\nWriting version manifest...");
    versions.set("php", &php_version);
    versions.save(&paths).await.context("cannot save versions")?;
    println!("  ✓ versions.json saved");

    println!("\nGenerating Caddyfile...");
    caddy::generate_caddyfile(&paths)
        .await
        .context("cannot generate Caddyfile")?;
    println!("  ✓ Caddyfile created");

    println!("\nInitializing registry...");
    Registry::default()
        .save(&paths)
        .await
        .context("cannot save registry")?;
    println!("  ✓ registry.json created");

    println!("\nSetting up DNS resolver...");
    println!("  This requires administrator privileges.");
    match setup::run_sudo_resolver(tld).await {
        Ok(()) => println!("  ✓ DNS resolver configured"),
        Err(err) => {
            println!("  x DNS resolver setup failed: {err:#}");
            println!("  You can set this up manually later:");
            println!("    sudo mkdir -p /etc/resolver");
            println!(
                "    printf 'nameserver 127.0.0.1\\nport 10053\\n' | sudo tee /etc/resolver/{tld}"
            );
        }
    }

    println!("\nTrusting CA certificate...");
    match setup::run_sudo_trust_with_server(&paths).await {
        Ok(()) => println!("  ✓ Caddy CA certificate trusted"),
        Err(err) => {
            println!("  x CA trust failed: {err:#}");
            println!("  You can set this up manually later:");
            println!(
                "    {} run --config {} --adapter caddyfile &",
                paths.frankenphp_path().display(),
                paths.caddyfile_path().display()
            );
            println!("    sudo {} trust", paths.frankenphp_path().display());
            println!("    kill %1");
        }
    }

    println!("\nRunning self-test...");
    let results = setup::run_self_test(&paths, tld).await;
    setup::print_results(&results);

    println!();
    setup::print_path_instructions();

    println!();
    println!("pv installed!");
    println!();
    println!("  PHP:        {php_version} (global default)");
    for tool in tools::TOOLS {
        let installed = versions.get(tool.name);
        let installed = if installed.is_empty() {
            "unknown"
        } else {
            installed
        };
        println!("  {:<12} {installed}", format!("{}:", tool.display_name));
    }
    println!();
    println!("Install additional PHP versions with: pv php install <version>");
    println!("Run `pv link .` in a project to get started.");

    Ok(())
}
