//! FrankenPHP child-process lifecycle.
//!
//! One [`PhpServer`] per running instance. The main instance is gated on its
//! admin API answering; secondaries have the admin API disabled, so they
//! only get a short grace period and an early-exit check. Exit status is
//! published on a watch channel so the startup check, `stop`, and the
//! supervisor's event loop can all observe it independently.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use nix::sys::signal::Signal;
use tokio::process::Command;
use tokio::sync::watch;
use tracing::debug;

use pv_core::paths::ADMIN_PORT;
use pv_core::Paths;
use pv_utils::probe::check_http;
use pv_utils::process::send_signal;

/// How long the main instance gets to expose its admin API.
const READY_TIMEOUT: Duration = Duration::from_secs(5);
const READY_POLL: Duration = Duration::from_millis(200);
/// Grace between SIGTERM and SIGKILL on stop.
const STOP_GRACE: Duration = Duration::from_secs(10);
/// Secondaries have no admin API; give them a moment, then check for an
/// early exit.
const SECONDARY_STARTUP_WAIT: Duration = Duration::from_millis(500);

/// The URL the supervisor polls to decide the main instance is up.
pub fn admin_ready_url() -> String {
    format!("http://localhost:{ADMIN_PORT}/config/")
}

/// How a child ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExitNote {
    /// True for a zero exit status.
    pub success: bool,
    /// Human-readable status, e.g. `exit status: 1` or `signal: 15`.
    pub description: String,
}

/// A supervised FrankenPHP instance.
#[derive(Debug)]
pub struct PhpServer {
    pid: i32,
    done: watch::Receiver<Option<ExitNote>>,
    version: String,
}

/// Spawns the main instance on the global binary and main Caddyfile.
pub async fn start_main(paths: &Paths) -> Result<PhpServer> {
    start_instance(
        &paths.frankenphp_path(),
        &paths.caddyfile_path(),
        &paths.caddy_log_path(),
        Some(admin_ready_url()),
        String::new(),
        &paths.caddy_env(),
    )
    .await
}

/// Spawns a secondary instance for one PHP version, on that version's
/// binary, Caddyfile, and log file.
pub async fn start_secondary(paths: &Paths, version: &str) -> Result<PhpServer> {
    start_instance(
        &paths.frankenphp_for_version(version),
        &paths.version_caddyfile_path(version),
        &paths.version_caddy_log_path(version),
        None,
        version.to_string(),
        &paths.caddy_env(),
    )
    .await
}

async fn start_instance(
    binary: &Path,
    caddyfile: &Path,
    log_path: &Path,
    health_url: Option<String>,
    version: String,
    env: &[(String, String)],
) -> Result<PhpServer> {
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("cannot open log file {}", log_path.display()))?;
    let log_for_stderr = log_file
        .try_clone()
        .with_context(|| format!("cannot clone log handle for {}", log_path.display()))?;

    let mut command = Command::new(binary);
    command
        .arg("run")
        .arg("--config")
        .arg(caddyfile)
        .arg("--adapter")
        .arg("caddyfile")
        .stdout(Stdio::from(log_file))
        .stderr(Stdio::from(log_for_stderr));
    for (key, value) in env {
        command.env(key, value);
    }

    let mut child = command
        .spawn()
        .with_context(|| format!("cannot start {}", binary.display()))?;
    let pid = child
        .id()
        .and_then(|raw| i32::try_from(raw).ok())
        .context("spawned FrankenPHP has no PID")?;

    let (done_tx, done) = watch::channel(None);
    tokio::spawn(async move {
        let note = match child.wait().await {
            Ok(status) => ExitNote {
                success: status.success(),
                description: status.to_string(),
            },
            Err(err) => ExitNote {
                success: false,
                description: format!("wait failed: {err}"),
            },
        };
        // Receivers may already be gone during teardown.
        if done_tx.send(Some(note)).is_err() {
            debug!("FrankenPHP exit observed with no listeners");
        }
    });

    let server = PhpServer { pid, done, version };

    match health_url {
        Some(url) => server.wait_admin_ready(&url).await?,
        None => {
            tokio::time::sleep(SECONDARY_STARTUP_WAIT).await;
            if let Some(note) = server.exit_note() {
                bail!(
                    "FrankenPHP (PHP {}) exited during startup: {}",
                    server.version,
                    note.description
                );
            }
        }
    }

    Ok(server)
}

impl PhpServer {
    /// Non-blocking: the exit note if the child has already exited.
    pub fn exit_note(&self) -> Option<ExitNote> {
        self.done.borrow().clone()
    }

    /// Waits for the child to exit and returns its exit note.
    /// Safe to call from several tasks; a clone of the channel is used.
    pub async fn wait_done(&self) -> ExitNote {
        let mut done = self.done_channel();
        let note = match done.wait_for(Option::is_some).await {
            Ok(note) => note.clone(),
            Err(_) => None,
        };
        note.unwrap_or_else(|| ExitNote {
            success: false,
            description: "exit unobserved".to_string(),
        })
    }

    /// A channel that yields the exit note once the child exits. For callers
    /// that need to watch several instances at once.
    pub fn done_channel(&self) -> watch::Receiver<Option<ExitNote>> {
        self.done.clone()
    }

    /// PHP version this instance serves; empty for the main instance.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn pid(&self) -> i32 {
        self.pid
    }

    /// SIGTERM, wait up to 10 s, then SIGKILL and wait.
    pub async fn stop(&self) -> Result<()> {
        if self.exit_note().is_some() {
            return Ok(());
        }

        if let Err(err) = send_signal(self.pid, Signal::SIGTERM) {
            debug!("SIGTERM to {}: {err:#}", self.pid);
        }

        let mut done = self.done.clone();
        let graceful = tokio::time::timeout(STOP_GRACE, done.wait_for(Option::is_some))
            .await
            .is_ok();
        if !graceful {
            if let Err(err) = send_signal(self.pid, Signal::SIGKILL) {
                debug!("SIGKILL to {}: {err:#}", self.pid);
            }
            if done.wait_for(Option::is_some).await.is_err() {
                debug!("FrankenPHP {} exit not observed after SIGKILL", self.pid);
            }
        }
        Ok(())
    }

    async fn wait_admin_ready(&self, url: &str) -> Result<()> {
        let deadline = tokio::time::Instant::now() + READY_TIMEOUT;
        while tokio::time::Instant::now() < deadline {
            if let Some(note) = self.exit_note() {
                bail!("FrankenPHP exited during startup: {}", note.description);
            }
            if check_http(url).await {
                return Ok(());
            }
            tokio::time::sleep(READY_POLL).await;
        }

        self.stop().await?;
        bail!("FrankenPHP admin API did not become ready within 5s")
    }
}

/// Asks the running main instance to re-read the main Caddyfile.
pub async fn reload(paths: &Paths) -> Result<()> {
    let mut command = Command::new(paths.frankenphp_path());
    command
        .arg("reload")
        .arg("--config")
        .arg(paths.caddyfile_path())
        .arg("--adapter")
        .arg("caddyfile");
    for (key, value) in paths.caddy_env() {
        command.env(key, value);
    }

    let output = command
        .output()
        .await
        .context("cannot run frankenphp reload")?;
    if !output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "reload failed: {}: {}{}",
            output.status,
            stdout.trim(),
            stderr.trim()
        );
    }
    Ok(())
}
