//! One-time setup glue: resolver file, CA trust, shell hints, self-test.
//!
//! Everything here shells out or prints; the privileged steps go through
//! `sudo sh -c` with explicit scripts so the user can read what runs.

use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use pv_core::Paths;
use pv_server::frankenphp;

const RESOLVER_DIR: &str = "/etc/resolver";
const RESOLVER_CONTENT: &str = "nameserver 127.0.0.1\nport 10053\n";

/// How long the boot self-test lets FrankenPHP run before declaring success.
const BOOT_CHECK_WAIT: Duration = Duration::from_secs(3);

/// Installed means settings exist; a bare `~/.pv` directory left over from
/// a failed attempt does not count.
pub fn is_already_installed(paths: &Paths) -> bool {
    paths.settings_path().exists()
}

/// Script for creating the per-TLD resolver file, run under `sudo sh -c`.
pub fn resolver_setup_script(tld: &str) -> String {
    format!(
        "mkdir -p {RESOLVER_DIR} && printf 'nameserver 127.0.0.1\\nport 10053\\n' > {RESOLVER_DIR}/{tld}"
    )
}

/// Script for `frankenphp trust`. sudo clears the environment, so the
/// storage overrides are spelled out inline.
pub fn trust_script(paths: &Paths) -> String {
    let root = paths.root().display();
    format!(
        "XDG_DATA_HOME=\"{root}\" XDG_CONFIG_HOME=\"{root}\" \"{}\" trust",
        paths.frankenphp_path().display()
    )
}

/// Create `/etc/resolver/<tld>` with elevated privileges. Stdio is
/// inherited so the password prompt reaches the user.
pub async fn run_sudo_resolver(tld: &str) -> Result<()> {
    run_sudo(&resolver_setup_script(tld)).await
}

async fn run_sudo(script: &str) -> Result<()> {
    let status = tokio::process::Command::new("sudo")
        .args(["sh", "-c", script])
        .status()
        .await
        .context("cannot run sudo")?;
    if !status.success() {
        bail!("sudo exited with {status}");
    }
    Ok(())
}

/// Verify the resolver file exists with exactly the expected content.
pub fn check_resolver_file(tld: &str) -> Result<()> {
    let path = PathBuf::from(RESOLVER_DIR).join(tld);
    let data = std::fs::read_to_string(&path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    if data != RESOLVER_CONTENT {
        bail!("unexpected content in {}", path.display());
    }
    Ok(())
}

/// Trust the Caddy-generated CA certificate.
///
/// `frankenphp trust` talks to the admin API, so a server has to be up:
/// start one against the main Caddyfile, run the trust script under sudo,
/// and stop the server again whatever the outcome.
pub async fn run_sudo_trust_with_server(paths: &Paths) -> Result<()> {
    let server = frankenphp::start_main(paths).await?;

    let result = run_sudo(&trust_script(paths)).await;

    if let Err(err) = server.stop().await {
        tracing::debug!(?err, "cannot stop temporary trust server");
    }
    result
}

/// The user's shell, from `$SHELL`.
pub fn detect_shell() -> String {
    match std::env::var("SHELL") {
        Ok(shell) if !shell.is_empty() => PathBuf::from(shell)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "sh".to_string()),
        _ => "sh".to_string(),
    }
}

/// RC file to append the PATH line to, per shell.
pub fn shell_config_file(shell: &str) -> PathBuf {
    let home = directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().to_path_buf())
        .unwrap_or_default();
    match shell {
        "zsh" => home.join(".zshrc"),
        "bash" => home.join(".bashrc"),
        "fish" => home.join(".config").join("fish").join("config.fish"),
        _ => home.join(".profile"),
    }
}

pub fn path_export_line(shell: &str) -> &'static str {
    match shell {
        "fish" => r#"set -gx PATH "$HOME/.pv/bin" $PATH"#,
        _ => r#"export PATH="$HOME/.pv/bin:$PATH""#,
    }
}

pub fn print_path_instructions() {
    let shell = detect_shell();
    let config_file = shell_config_file(&shell);
    let export_line = path_export_line(&shell);

    println!("Add ~/.pv/bin to your PATH by running:");
    println!();
    println!("  echo '{export_line}' >> {}", config_file.display());
    println!("  source {}", config_file.display());
}

/// Outcome of one self-test check.
pub struct TestResult {
    pub name: &'static str,
    pub error: Option<anyhow::Error>,
}

impl TestResult {
    fn pass(name: &'static str) -> Self {
        Self { name, error: None }
    }

    fn fail(name: &'static str, error: anyhow::Error) -> Self {
        Self {
            name,
            error: Some(error),
        }
    }
}

/// Post-install verification: tool binaries answer, the resolver file is
/// in place, and FrankenPHP boots with the generated config.
pub async fn run_self_test(paths: &Paths, tld: &str) -> Vec<TestResult> {
    vec![
        check_binary("FrankenPHP", &paths.frankenphp_path(), "version").await,
        check_binary("Mago", &paths.bin_dir().join("mago"), "--version").await,
        check_binary("PHP CLI", &paths.php_shim_path(), "--version").await,
        check_resolver_configured(tld),
        check_frankenphp_boots(paths).await,
    ]
}

async fn check_binary(name: &'static str, path: &std::path::Path, arg: &str) -> TestResult {
    let output = match tokio::process::Command::new(path).arg(arg).output().await {
        Ok(output) => output,
        Err(err) => return TestResult::fail(name, anyhow::Error::from(err)),
    };
    if !output.status.success() {
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        return TestResult::fail(
            name,
            anyhow::anyhow!("{}: {}", output.status, combined.trim()),
        );
    }
    TestResult::pass(name)
}

fn check_resolver_configured(tld: &str) -> TestResult {
    match check_resolver_file(tld) {
        Ok(()) => TestResult::pass("DNS resolver"),
        Err(err) => TestResult::fail("DNS resolver", err),
    }
}

/// Boot check: spawn against the main Caddyfile and require the process to
/// stay up for [`BOOT_CHECK_WAIT`]. An early exit means a config error.
async fn check_frankenphp_boots(paths: &Paths) -> TestResult {
    const NAME: &str = "FrankenPHP boots";

    let mut child = match tokio::process::Command::new(paths.frankenphp_path())
        .args(["run", "--config"])
        .arg(paths.caddyfile_path())
        .args(["--adapter", "caddyfile"])
        .envs(paths.caddy_env())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(child) => child,
        Err(err) => {
            return TestResult::fail(NAME, anyhow::Error::from(err).context("failed to start"))
        }
    };

    match tokio::time::timeout(BOOT_CHECK_WAIT, child.wait()).await {
        Ok(Ok(status)) => TestResult::fail(NAME, anyhow::anyhow!("exited unexpectedly: {status}")),
        Ok(Err(err)) => TestResult::fail(NAME, anyhow::Error::from(err)),
        Err(_) => {
            // Still running; that is the pass condition.
            if let Err(err) = child.kill().await {
                tracing::debug!(?err, "cannot kill boot-check server");
            }
            TestResult::pass(NAME)
        }
    }
}

/// Print results with checkmarks; returns whether everything passed.
pub fn print_results(results: &[TestResult]) -> bool {
    let mut all_passed = true;
    for result in results {
        match &result.error {
            Some(err) => {
                println!("  x {}: {err:#}", result.name);
                all_passed = false;
            }
            None => println!("  ✓ {}", result.name),
        }
    }
    all_passed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolver_script_writes_the_tld_file() {
        let script = resolver_setup_script("test");
        assert!(script.starts_with("mkdir -p /etc/resolver && "));
        assert!(script.ends_with("> /etc/resolver/test"));
        assert!(script.contains(r"printf 'nameserver 127.0.0.1\nport 10053\n'"));
    }

    #[test]
    fn trust_script_carries_storage_overrides() {
        let paths = Paths::with_root(PathBuf::from("/tmp/pv-root"));
        let script = trust_script(&paths);
        assert!(script.contains("XDG_DATA_HOME=\"/tmp/pv-root\""));
        assert!(script.contains("XDG_CONFIG_HOME=\"/tmp/pv-root\""));
        assert!(script.ends_with("\" trust"));
    }

    #[test]
    fn shell_config_file_per_shell() {
        assert!(shell_config_file("zsh").ends_with(".zshrc"));
        assert!(shell_config_file("bash").ends_with(".bashrc"));
        assert!(shell_config_file("fish").ends_with("config.fish"));
        assert!(shell_config_file("tcsh").ends_with(".profile"));
    }

    #[test]
    fn path_export_line_per_shell() {
        assert_eq!(
            path_export_line("fish"),
            r#"set -gx PATH "$HOME/.pv/bin" $PATH"#
        );
        assert_eq!(
            path_export_line("zsh"),
            r#"export PATH="$HOME/.pv/bin:$PATH""#
        );
    }

    #[test]
    fn installed_means_settings_exist() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_root(dir.path().to_path_buf());
        assert!(!is_already_installed(&paths));

        std::fs::create_dir_all(paths.config_dir()).unwrap();
        std::fs::write(paths.settings_path(), "{}").unwrap();
        assert!(is_already_installed(&paths));
    }
}
