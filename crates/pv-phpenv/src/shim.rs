//! The version-dispatching `php` shim.
//!
//! The shim is a static shell script at `bin/php` that re-runs project
//! version resolution on every invocation by walking upward from the working
//! directory, so `php` always matches what the server would use for that
//! project. It is written once at install and never consulted by pv itself.

use anyhow::{Context, Result};

use pv_core::Paths;
use pv_utils::download::make_executable;

const PHP_SHIM_TEMPLATE: &str = r#"#!/bin/bash
# pv PHP version shim: resolves the PHP version per project.
set -euo pipefail

PV_PHP_DIR="@PHP_DIR@"
PV_SETTINGS="@SETTINGS@"

# Read global default version from settings.
global_php() {
    if [ -f "$PV_SETTINGS" ]; then
        # Simple JSON parse for global_php field.
        grep -o '"global_php"[[:space:]]*:[[:space:]]*"[^"]*"' "$PV_SETTINGS" | \
            grep -o '"[^"]*"$' | tr -d '"' || true
    fi
}

# Walk up directories looking for .pv-php or composer.json.
resolve_version() {
    local dir="$PWD"
    while [ "$dir" != "/" ]; do
        # Check .pv-php file.
        if [ -f "$dir/.pv-php" ]; then
            cat "$dir/.pv-php" | tr -d '[:space:]'
            return
        fi
        # Check composer.json for PHP constraint (extract major.minor).
        if [ -f "$dir/composer.json" ]; then
            local constraint
            constraint=$(grep -o '"php"[[:space:]]*:[[:space:]]*"[^"]*"' "$dir/composer.json" | \
                grep -o '"[^"]*"$' | tr -d '"' || true)
            if [ -n "$constraint" ]; then
                # Extract the first major.minor version from the constraint.
                local ver
                ver=$(echo "$constraint" | grep -o '[0-9]\+\.[0-9]\+' | head -1 || true)
                if [ -n "$ver" ] && [ -d "$PV_PHP_DIR/$ver" ]; then
                    echo "$ver"
                    return
                fi
            fi
        fi
        dir=$(dirname "$dir")
    done

    # Fall back to global default.
    global_php
}

VERSION=$(resolve_version)
if [ -z "$VERSION" ]; then
    echo "pv: no PHP version configured. Run: pv php install <version>" >&2
    exit 1
fi

BINARY="$PV_PHP_DIR/$VERSION/php"
if [ ! -x "$BINARY" ]; then
    echo "pv: PHP $VERSION is not installed. Run: pv php install $VERSION" >&2
    exit 1
fi

exec "$BINARY" "$@"
"#;

/// Writes the `php` shim into `bin/`, executable.
pub async fn write_shims(paths: &Paths) -> Result<()> {
    let script = PHP_SHIM_TEMPLATE
        .replace("@PHP_DIR@", &paths.php_dir().display().to_string())
        .replace("@SETTINGS@", &paths.settings_path().display().to_string());

    let shim_path = paths.php_shim_path();
    if let Some(parent) = shim_path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&shim_path, script)
        .await
        .with_context(|| format!("cannot write php shim to {}", shim_path.display()))?;
    make_executable(&shim_path)?;
    Ok(())
}
