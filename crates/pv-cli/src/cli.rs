use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pv")]
#[command(version)]
#[command(about = "Local PHP development environments", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Install pv: directories, PHP, tools, DNS resolver, CA trust
    Install {
        /// Reinstall even if pv is already installed
        #[arg(long)]
        force: bool,
        /// Top-level domain to serve projects under
        #[arg(long, default_value = "test")]
        tld: String,
        /// PHP version to install (default: latest available)
        #[arg(long)]
        php: Option<String>,
    },
    /// Link a project directory so it is served at <name>.<tld>
    Link {
        /// Path to the project (default: current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
        /// Override the site name (default: directory basename)
        #[arg(long)]
        name: Option<String>,
        /// Pin the project to a specific PHP version
        #[arg(long)]
        php: Option<String>,
    },
    /// Unlink a project (current directory if no name is given)
    Unlink {
        /// Name of the project to unlink
        name: Option<String>,
    },
    /// List linked projects
    #[command(alias = "ls")]
    List,
    /// Switch the global PHP version (or pin the current project)
    Use {
        /// PHP version, e.g. 8.4 (a php: prefix is accepted)
        version: String,
        /// Pin the current directory's project instead of the global default
        #[arg(long)]
        project: bool,
    },
    /// Start the pv server (DNS + FrankenPHP) in the foreground
    Start,
    /// Stop a running pv server
    Stop,
    /// Reload the server configuration without restarting
    Restart,
    /// Show server status and linked projects
    Status,
    /// Print the server log
    Log {
        /// Only show lines mentioning this site
        site: Option<String>,
        /// Keep the log open and print new lines as they appear
        #[arg(short, long)]
        follow: bool,
        /// Number of trailing lines to print
        #[arg(short = 'n', long, default_value_t = 50)]
        lines: usize,
    },
    /// Update bundled tools to their latest releases
    Update,
    /// Manage installed PHP versions
    Php {
        #[command(subcommand)]
        command: PhpCommands,
    },
}

#[derive(Subcommand)]
pub enum PhpCommands {
    /// Install a PHP version
    Install {
        /// Version as major.minor, e.g. 8.4
        version: String,
    },
    /// List installed PHP versions and the projects using them
    #[command(alias = "ls")]
    List,
    /// Remove an installed PHP version
    Remove {
        /// Version as major.minor, e.g. 8.4
        version: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn list_alias() {
        let cli = Cli::try_parse_from(["pv", "ls"]).unwrap();
        assert!(matches!(cli.command, Commands::List));
    }

    #[test]
    fn log_defaults() {
        let cli = Cli::try_parse_from(["pv", "log"]).unwrap();
        match cli.command {
            Commands::Log { site, follow, lines } => {
                assert!(site.is_none());
                assert!(!follow);
                assert_eq!(lines, 50);
            }
            _ => panic!("expected log command"),
        }
    }

    #[test]
    fn php_install_takes_version() {
        let cli = Cli::try_parse_from(["pv", "php", "install", "8.4"]).unwrap();
        match cli.command {
            Commands::Php { command: PhpCommands::Install { version } } => {
                assert_eq!(version, "8.4");
            }
            _ => panic!("expected php install command"),
        }
    }
}
