//! `pv status`: server state, versions, and linked projects at a glance.

use anyhow::{Context, Result};
use pv_core::paths::{port_for_version, DNS_PORT};
use pv_core::{Paths, Registry, Settings};
use pv_server::supervisor;

pub async fn run() -> Result<()> {
    let paths = Paths::new();
    let settings = Settings::load(&paths).await.context("cannot load settings")?;

    let running = supervisor::is_running(&paths);
    if running {
        let pid = supervisor::read_pid(&paths)?;
        println!("Status:  running (PID {pid})");
    } else {
        println!("Status:  stopped");
    }

    println!("TLD:     .{}", settings.tld);
    println!("DNS:     127.0.0.1:{DNS_PORT}");
    println!("HTTPS:   port 443");
    println!("HTTP:    port 80");

    let global_php = settings.global_php.clone();
    if !global_php.is_empty() {
        println!("PHP:     {global_php} (global)");
    }

    let versions = pv_phpenv::installed_versions(&paths)
        .await
        .unwrap_or_default();
    if !versions.is_empty() {
        let labels: Vec<String> = versions
            .iter()
            .map(|v| {
                if *v == global_php {
                    format!("{v}*")
                } else {
                    v.clone()
                }
            })
            .collect();
        println!("PHP installed: {}", labels.join(", "));
    }

    let registry = match Registry::load(&paths).await {
        Ok(registry) => registry,
        Err(err) => {
            println!("Sites:   (cannot load registry: {err:#})");
            return Ok(());
        }
    };

    let projects = registry.list();
    println!("Sites:   {} linked", projects.len());

    if !projects.is_empty() && running {
        println!();
        println!("Projects:");
        for project in projects {
            let mut php = project.effective_php(&global_php);
            if php.is_empty() {
                php = "-";
            }
            let kind = project.kind.as_str();
            let type_label = if kind.is_empty() { "unknown" } else { kind };
            let port_info = if php != global_php && php != "-" {
                format!(" (port {})", port_for_version(php))
            } else {
                String::new()
            };
            println!(
                "  {:<20} {type_label:<16} PHP {php}{port_info}",
                format!("{}.{}", project.name, settings.tld)
            );
        }
    }

    Ok(())
}
