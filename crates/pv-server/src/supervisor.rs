//! The foreground supervisor: PID file, DNS responder, FrankenPHP fleet.
//!
//! [`start`] runs until a signal arrives or a component dies, then tears the
//! fleet down in reverse start order: secondaries first, then the main
//! instance, then the DNS responder, and finally the PID file. A crashed
//! secondary is treated like a signal; the supervisor does not restart
//! children.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use pv_core::caddy::{active_versions, generate_all_configs};
use pv_core::paths::port_for_version;
use pv_core::{Paths, Registry, Settings};
use pv_utils::process::pid_alive;

use crate::dns::DnsServer;
use crate::frankenphp::{self, PhpServer};

/// Removes the PID file when dropped, so every exit path from [`start`]
/// leaves no stale file behind.
struct PidFile {
    path: PathBuf,
}

impl PidFile {
    fn write(paths: &Paths) -> Result<Self> {
        let path = paths.pid_path();
        std::fs::write(&path, std::process::id().to_string())
            .with_context(|| format!("cannot write PID file {}", path.display()))?;
        Ok(Self { path })
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!("cannot remove PID file {}: {err}", self.path.display());
            }
        }
    }
}

/// Reads the supervisor PID recorded by a running [`start`].
pub fn read_pid(paths: &Paths) -> Result<i32> {
    let path = paths.pid_path();
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("cannot read PID file {}", path.display()))?;
    raw.trim()
        .parse()
        .with_context(|| format!("PID file {} does not contain a PID", path.display()))
}

/// True when the PID file exists and its process answers a null-signal
/// probe. A stale file left by a crash reads as not running.
pub fn is_running(paths: &Paths) -> bool {
    match read_pid(paths) {
        Ok(pid) => pid_alive(pid),
        Err(_) => false,
    }
}

/// Runs the development environment in the foreground until shutdown.
///
/// Brings up, in order: the PID file, the DNS responder on 127.0.0.1, the
/// main FrankenPHP instance (gated on its admin API), and one secondary
/// FrankenPHP per non-global PHP version in use. Secondaries are best
/// effort; a failure to start one is reported and skipped. Returns after
/// teardown, which runs on SIGINT, SIGTERM, or the death of any component.
pub async fn start(paths: &Paths, tld: &str) -> Result<()> {
    paths.ensure_dirs().context("cannot create pv directories")?;

    let mut sigint =
        signal(SignalKind::interrupt()).context("cannot install SIGINT handler")?;
    let mut sigterm =
        signal(SignalKind::terminate()).context("cannot install SIGTERM handler")?;

    let _pid_file = PidFile::write(paths)?;

    let settings = Settings::load(paths).await?;
    let registry = Registry::load(paths).await?;
    generate_all_configs(paths, tld, registry.list(), &settings.global_php).await?;

    let dns = DnsServer::bind(tld).await?;
    let dns_addr = dns.local_addr().context("DNS socket has no local addr")?;
    let (dns_shutdown, dns_shutdown_rx) = watch::channel(false);
    let mut dns_task = tokio::spawn(dns.serve(dns_shutdown_rx));
    println!("DNS server listening on {dns_addr}");

    let main_server = match frankenphp::start_main(paths).await {
        Ok(server) => server,
        Err(err) => {
            stop_dns(&dns_shutdown, dns_task).await;
            return Err(err);
        }
    };
    println!("FrankenPHP started");
    println!("Serving .{tld} domains on https (port 443) and http (port 80)");

    let mut secondaries = Vec::new();
    for version in active_versions(registry.list(), &settings.global_php) {
        let port = port_for_version(&version);
        println!("Starting FrankenPHP for PHP {version} on port {port}...");
        match frankenphp::start_secondary(paths, &version).await {
            Ok(server) => {
                println!("FrankenPHP (PHP {version}) started on port {port}");
                secondaries.push(server);
            }
            Err(err) => {
                println!("Warning: cannot start FrankenPHP for PHP {version}: {err:#}");
            }
        }
    }

    wait_for_event(
        &mut sigint,
        &mut sigterm,
        &mut dns_task,
        &main_server,
        &secondaries,
    )
    .await;

    for server in &secondaries {
        if let Err(err) = server.stop().await {
            warn!("cannot stop FrankenPHP (PHP {}): {err:#}", server.version());
        }
    }
    if let Err(err) = main_server.stop().await {
        warn!("cannot stop FrankenPHP: {err:#}");
    }
    stop_dns(&dns_shutdown, dns_task).await;

    Ok(())
}

/// Blocks until the first shutdown-worthy event: a signal, the DNS task
/// ending, the main instance exiting, or any secondary exiting.
///
/// `select!` needs a fixed set of arms, so the variable number of
/// secondaries is merged into one channel by a forwarder task apiece; the
/// forwarders are cancelled by dropping `cancel` on return.
async fn wait_for_event(
    sigint: &mut Signal,
    sigterm: &mut Signal,
    dns_task: &mut JoinHandle<Result<()>>,
    main_server: &PhpServer,
    secondaries: &[PhpServer],
) {
    let (merged_tx, mut merged) = mpsc::channel::<String>(1);
    let (cancel, _) = watch::channel(false);

    for server in secondaries {
        let mut done = server.done_channel();
        let version = server.version().to_string();
        let merged_tx = merged_tx.clone();
        let mut cancelled = cancel.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                // The clone happens inside the arm's future so the non-Send
                // watch::Ref never appears in select!'s output type.
                note = async {
                    done.wait_for(Option::is_some)
                        .await
                        .ok()
                        .and_then(|note| note.clone())
                } => {
                    if let Some(note) = note {
                        if !note.success {
                            println!("FrankenPHP (PHP {version}) exited: {}", note.description);
                        }
                    }
                    if merged_tx.send(version).await.is_err() {
                        debug!("secondary exit observed after shutdown began");
                    }
                }
                _ = cancelled.changed() => {}
            }
        });
    }

    tokio::select! {
        _ = sigint.recv() => {
            println!("\nReceived interrupt, shutting down...");
        }
        _ = sigterm.recv() => {
            println!("\nReceived terminate, shutting down...");
        }
        result = dns_task => {
            match result {
                Ok(Err(err)) => println!("DNS server error: {err:#}"),
                Ok(Ok(())) => {}
                Err(err) => println!("DNS server task failed: {err}"),
            }
        }
        note = main_server.wait_done() => {
            if !note.success {
                println!("FrankenPHP exited: {}", note.description);
            }
        }
        version = merged.recv() => {
            if let Some(version) = version {
                println!("Secondary FrankenPHP (PHP {version}) exited");
            }
        }
    }
}

/// Signals the DNS task to stop and waits for it, unless it already ended.
async fn stop_dns(shutdown: &watch::Sender<bool>, mut task: JoinHandle<Result<()>>) {
    if task.is_finished() {
        return;
    }
    if shutdown.send(true).is_err() {
        // serve() already returned and dropped its receiver.
        return;
    }
    match (&mut task).await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!("DNS server error during shutdown: {err:#}"),
        Err(err) => warn!("DNS server task failed: {err}"),
    }
}

/// Regenerates every Caddy config from the current registry and settings,
/// then asks the running main instance to reload.
pub async fn reconfigure_server(paths: &Paths) -> Result<()> {
    let settings = Settings::load(paths).await?;
    let registry = Registry::load(paths).await?;
    generate_all_configs(paths, &settings.tld, registry.list(), &settings.global_php).await?;
    frankenphp::reload(paths).await
}
