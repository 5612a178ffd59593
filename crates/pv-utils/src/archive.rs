use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use std::path::Path;

/// Extract the single regular file named `member` (matched by base name)
/// from a tar.gz archive into `dest`.
pub fn extract_tar_gz(archive: &Path, dest: &Path, member: &str) -> Result<()> {
    let file = std::fs::File::open(archive)
        .with_context(|| format!("cannot open archive {}", archive.display()))?;
    let mut tar = tar::Archive::new(GzDecoder::new(file));

    for entry in tar.entries().context("cannot read archive")? {
        let mut entry = entry.context("cannot read archive entry")?;
        let is_target = {
            let path = entry.path().context("archive entry has no path")?;
            path.file_name().is_some_and(|name| name == member)
        };
        if is_target && entry.header().entry_type().is_file() {
            let mut out = std::fs::File::create(dest)
                .with_context(|| format!("cannot create {}", dest.display()))?;
            std::io::copy(&mut entry, &mut out)
                .with_context(|| format!("cannot extract {member:?}"))?;
            return Ok(());
        }
    }

    bail!("{member:?} not found in archive {}", archive.display());
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tempfile::tempdir;

    fn build_archive(path: &Path, members: &[(&str, &[u8])]) {
        let file = std::fs::File::create(path).unwrap();
        let gz = GzEncoder::new(file, Compression::default());
        let mut builder = tar::Builder::new(gz);
        for (name, data) in members {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn extracts_member_by_base_name() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("php.tar.gz");
        build_archive(
            &archive,
            &[("bin/other", b"nope"), ("dist/php", b"elephpant")],
        );

        let dest = dir.path().join("php");
        extract_tar_gz(&archive, &dest, "php").unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), b"elephpant");
    }

    #[test]
    fn missing_member_is_an_error() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("tool.tar.gz");
        build_archive(&archive, &[("bin/tool", b"x")]);

        let err = extract_tar_gz(&archive, &dir.path().join("php"), "php").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
