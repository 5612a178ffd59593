//! `pv` binary: local PHP development environments.
//!
//! Parses the command line, dispatches to [`commands`], and maps errors to
//! exit codes: `1` for user-correctable problems (bad input, missing
//! versions, conflicts), `2` for everything else.

mod cli;
mod commands;
mod setup;
mod tools;

use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use cli::Cli;
use commands::CliError;

/// Initialize tracing with environment-based filtering.
///
/// User-facing output goes to stdout via `println!`; tracing is diagnostics
/// only, so it defaults to `warn` and writes to stderr.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

/// Maps an error to the process exit code.
///
/// Errors the user can fix by changing their input or environment exit
/// with `1`; unexpected failures (I/O, network, subprocess) exit with `2`.
fn exit_code(err: &anyhow::Error) -> u8 {
    if err.downcast_ref::<CliError>().is_some()
        || err.downcast_ref::<pv_core::registry::RegistryError>().is_some()
        || err.downcast_ref::<pv_core::settings::InvalidLabel>().is_some()
        || err.downcast_ref::<pv_phpenv::PhpenvError>().is_some()
        || err.downcast_ref::<pv_utils::platform::PlatformError>().is_some()
    {
        1
    } else {
        2
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing();

    match commands::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn user_errors_exit_one() {
        let err = anyhow::Error::from(CliError::NotRunning);
        assert_eq!(exit_code(&err), 1);

        // Context wrapping must not hide the underlying class.
        let err = anyhow::Error::from(pv_phpenv::PhpenvError::NotInstalled("8.4".to_string()))
            .context("cannot pin project");
        assert_eq!(exit_code(&err), 1);
    }

    #[test]
    fn system_errors_exit_two() {
        let err = anyhow!("download failed");
        assert_eq!(exit_code(&err), 2);
    }
}
