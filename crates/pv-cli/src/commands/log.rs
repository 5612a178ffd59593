//! `pv log`: print (and optionally follow) the main Caddy log.

use anyhow::{bail, Context, Result};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use pv_core::Paths;

/// How often follow mode polls the file for appended lines.
const FOLLOW_POLL: Duration = Duration::from_millis(200);

pub async fn run(site: Option<&str>, follow: bool, lines: usize) -> Result<()> {
    let paths = Paths::new();
    let log_path = paths.caddy_log_path();

    let file = match tokio::fs::File::open(&log_path).await {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            bail!(
                "no log file found at {} (has the server been started?)",
                log_path.display()
            );
        }
        Err(err) => return Err(err).context("cannot open log file"),
    };

    let mut reader = BufReader::new(file);

    for line in tail_lines(&mut reader, lines, site).await? {
        println!("{line}");
    }

    if !follow {
        return Ok(());
    }

    // The reader sits at end-of-file now; keep polling for appended lines.
    let mut line = String::new();
    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            tokio::time::sleep(FOLLOW_POLL).await;
            continue;
        }
        let line = line.trim_end_matches('\n');
        if matches_filter(line, site) {
            println!("{line}");
        }
    }
}

/// Last `n` lines matching the optional substring filter.
async fn tail_lines<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    n: usize,
    filter: Option<&str>,
) -> Result<Vec<String>> {
    let mut all = Vec::new();
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            break;
        }
        let line = line.trim_end_matches('\n');
        if matches_filter(line, filter) {
            all.push(line.to_string());
        }
    }

    if all.len() > n {
        all.drain(..all.len() - n);
    }
    Ok(all)
}

fn matches_filter(line: &str, filter: Option<&str>) -> bool {
    filter.map_or(true, |f| line.contains(f))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tail_keeps_the_last_n_lines() {
        let data = b"one\ntwo\nthree\nfour\n";
        let mut reader = BufReader::new(&data[..]);
        let lines = tail_lines(&mut reader, 2, None).await.unwrap();
        assert_eq!(lines, vec!["three", "four"]);
    }

    #[tokio::test]
    async fn tail_applies_the_site_filter() {
        let data = b"GET blog.test/a\nGET shop.test/b\nGET blog.test/c\n";
        let mut reader = BufReader::new(&data[..]);
        let lines = tail_lines(&mut reader, 50, Some("blog")).await.unwrap();
        assert_eq!(lines, vec!["GET blog.test/a", "GET blog.test/c"]);
    }

    #[tokio::test]
    async fn tail_of_short_file_returns_everything() {
        let data = b"only\n";
        let mut reader = BufReader::new(&data[..]);
        let lines = tail_lines(&mut reader, 50, None).await.unwrap();
        assert_eq!(lines, vec!["only"]);
    }
}
