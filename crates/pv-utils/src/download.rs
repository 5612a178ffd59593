use anyhow::{bail, Context, Result};
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// Fetch `url` to `dest` atomically: the body streams into a temp file in
/// the destination directory, which is renamed into place only on success.
/// A crash mid-download never leaves a truncated binary at `dest`.
pub async fn download(client: &reqwest::Client, url: &str, dest: &Path) -> Result<()> {
    let mut resp = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("download failed for {url}"))?;
    if !resp.status().is_success() {
        bail!("download failed: HTTP {} for {url}", resp.status().as_u16());
    }

    let dir = dest.parent().unwrap_or_else(|| Path::new("."));
    let tmp = tempfile::Builder::new()
        .prefix(".pv-download-")
        .tempfile_in(dir)
        .context("cannot create temp file")?;

    let mut file = tokio::fs::File::create(tmp.path())
        .await
        .context("cannot open temp file")?;
    while let Some(chunk) = resp.chunk().await.context("download read failed")? {
        file.write_all(&chunk).await.context("download write failed")?;
    }
    file.flush().await?;
    drop(file);

    tmp.persist(dest)
        .with_context(|| format!("cannot move download into {}", dest.display()))?;
    Ok(())
}

/// Check that the SHA-256 of `path` matches `expected_hex`, which may be in
/// sha256sum's `hash  filename` format.
pub fn verify_checksum(path: &Path, expected_hex: &str) -> Result<()> {
    let expected = expected_hex.split_whitespace().next().unwrap_or("");

    let mut file = std::fs::File::open(path)
        .with_context(|| format!("cannot open {} for checksum", path.display()))?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    let actual = hex::encode(hasher.finalize());

    if actual != expected {
        bail!("checksum mismatch for {}: got {actual}, want {expected}", path.display());
    }
    Ok(())
}

/// Download a checksum string (trimmed) from `url`.
pub async fn fetch_checksum(client: &reqwest::Client, url: &str) -> Result<String> {
    let resp = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("fetch checksum failed for {url}"))?;
    if !resp.status().is_success() {
        bail!("fetch checksum failed: HTTP {}", resp.status().as_u16());
    }
    Ok(resp.text().await?.trim().to_string())
}

/// chmod 0755.
pub fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .with_context(|| format!("cannot make {} executable", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn checksum_accepts_bare_and_sha256sum_formats() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("tool.bin");
        std::fs::write(&file, b"payload").unwrap();

        let digest = hex::encode(Sha256::digest(b"payload"));
        verify_checksum(&file, &digest).unwrap();
        verify_checksum(&file, &format!("{digest}  tool.bin")).unwrap();

        let err = verify_checksum(&file, &"0".repeat(64)).unwrap_err();
        assert!(err.to_string().contains("checksum mismatch"));
    }

    #[test]
    fn make_executable_sets_0755() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir().unwrap();
        let file = dir.path().join("tool");
        std::fs::write(&file, b"#!/bin/sh\n").unwrap();

        make_executable(&file).unwrap();
        let mode = std::fs::metadata(&file).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}
