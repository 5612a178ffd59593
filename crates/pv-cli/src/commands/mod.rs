//! Command implementations, one module per subcommand.

use anyhow::Result;
use thiserror::Error;

use crate::cli::{Cli, Commands, PhpCommands};

pub mod install;
pub mod link;
pub mod list;
pub mod log;
pub mod php;
pub mod restart;
pub mod start;
pub mod status;
pub mod stop;
pub mod unlink;
pub mod update;
pub mod use_cmd;

/// User-correctable failures. Anything of this type exits with code 1.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("pv is already running (PID file exists and process is alive)")]
    AlreadyRunning,
    #[error("pv is not running")]
    NotRunning,
    #[error("pv does not appear to be running (no PID file)")]
    NoPidFile,
    #[error("pv is already installed at {0}\n  Run with --force to reinstall")]
    AlreadyInstalled(String),
    #[error("{0} is not a directory")]
    NotADirectory(String),
    #[error("current directory is not a linked project")]
    NotLinked,
    #[error("version cannot be empty")]
    EmptyVersion,
    #[error("PHP {0} is already installed")]
    PhpAlreadyInstalled(String),
    #[error("cannot remove PHP {version}: project {project:?} depends on it")]
    VersionInUse { version: String, project: String },
}

/// Reload a running server's configuration, warning instead of failing.
///
/// Returns whether a server was running, so callers can decide whether a
/// restart note is warranted.
pub(crate) async fn reconfigure_if_running(paths: &pv_core::Paths) -> bool {
    if !pv_server::supervisor::is_running(paths) {
        return false;
    }
    if let Err(err) = pv_server::supervisor::reconfigure_server(paths).await {
        eprintln!("Warning: could not reconfigure server: {err:#}");
    }
    true
}

/// Dispatches a parsed command line to its implementation.
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Install { force, tld, php } => {
            install::run(force, &tld, php.as_deref()).await
        }
        Commands::Link { path, name, php } => {
            link::run(&path, name.as_deref(), php.as_deref()).await
        }
        Commands::Unlink { name } => unlink::run(name.as_deref()).await,
        Commands::List => list::run().await,
        Commands::Use { version, project } => use_cmd::run(&version, project).await,
        Commands::Start => start::run().await,
        Commands::Stop => stop::run(),
        Commands::Restart => restart::run().await,
        Commands::Status => status::run().await,
        Commands::Log { site, follow, lines } => {
            log::run(site.as_deref(), follow, lines).await
        }
        Commands::Update => update::run().await,
        Commands::Php { command } => match command {
            PhpCommands::Install { version } => php::install(&version).await,
            PhpCommands::List => php::list().await,
            PhpCommands::Remove { version } => php::remove(&version).await,
        },
    }
}
