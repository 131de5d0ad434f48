use std::process::Stdio;

use chrono::{NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper_core::{RemoteFile, ScraperConfig, ScraperError, ScraperResult};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

/// Flags shared by the listing (dry-run) and download invocations.
fn common_args(config: &ScraperConfig) -> Vec<String> {
    vec![
        "-4".to_string(),
        "-az".to_string(),
        "--bwlimit=10000".to_string(),
        "--timeout=300".to_string(),
        "--contimeout=300".to_string(),
        "--chmod=u=rwX".to_string(),
        format!("--port={}", config.rsync_port),
    ]
}

/// `<path> <date>-<time>` e.g. `2026/07/31/foo.tar.gz 2026/07/31-12:00:00`,
/// produced by `--out-format "%n %M"`. Lines ending in ` is uptodate` or
/// matching neither are skipped.
static LISTING_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4}/\d\d/\d\d/[^/].*) (\d{4}/\d\d/\d\d-\d\d:\d\d:\d\d)$")
        .expect("valid regex")
});

/// Lists the remote module, returning every candidate file as a
/// `(path, mtime)` pair. Streams stdout line by line rather than buffering
/// the whole transcript, since a full listing can be very large; the child's
/// exit status is awaited concurrently in a separate task so a full stdout
/// pipe never deadlocks against an unread exit code.
pub async fn list_remote_files(config: &ScraperConfig) -> ScraperResult<Vec<RemoteFile>> {
    let mut cmd = Command::new(&config.rsync_binary);
    cmd.args(common_args(config));
    cmd.arg("-n").arg("-vv").arg("--out-format=%n %M");
    cmd.arg(config.rsync_url() + "/");
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .map_err(|e| ScraperError::RsyncListing(format!("failed to spawn rsync: {e}")))?;

    let stdout = child
        .stdout
        .take()
        .expect("child did not have a stdout handle");
    let stderr = child
        .stderr
        .take()
        .expect("child did not have a stderr handle");

    let mut out_reader = BufReader::new(stdout).lines();
    let mut err_reader = BufReader::new(stderr).lines();

    let wait_handle = tokio::spawn(async move { child.wait().await });

    let mut files = Vec::new();
    while let Some(line) = out_reader
        .next_line()
        .await
        .map_err(|e| ScraperError::RsyncListing(format!("reading rsync stdout: {e}")))?
    {
        match parse_listing_line(&line) {
            Some(Some(file)) => files.push(file),
            Some(None) => {} // uptodate, or shape rejected by RemoteFile::new
            None => tracing::debug!(line = %line, "ignoring unrecognized rsync listing line"),
        }
    }

    let status = wait_handle
        .await
        .map_err(|e| ScraperError::RsyncListing(format!("rsync task join error: {e}")))?
        .map_err(|e| ScraperError::RsyncListing(format!("rsync wait error: {e}")))?;

    match status.code() {
        Some(0) | Some(23) | Some(24) => Ok(files),
        _ => {
            let mut stderr_text = String::new();
            while let Ok(Some(line)) = err_reader.next_line().await {
                stderr_text.push_str(&line);
                stderr_text.push('\n');
            }
            Err(ScraperError::RsyncListing(format!(
                "rsync exited with {:?}: {}",
                status.code(),
                stderr_text.trim()
            )))
        }
    }
}

/// `Some(Some(file))` for a parsed data line, `Some(None)` for a recognized
/// but ignorable line (uptodate), `None` for anything unrecognized.
fn parse_listing_line(line: &str) -> Option<Option<RemoteFile>> {
    if line.ends_with(" is uptodate") {
        return Some(None);
    }
    let caps = LISTING_LINE_RE.captures(line)?;
    let path = caps.get(1)?.as_str();
    let stamp = caps.get(2)?.as_str();
    let naive = NaiveDateTime::parse_from_str(stamp, "%Y/%m/%d-%H:%M:%S").ok()?;
    let mtime = Utc.from_utc_datetime(&naive).timestamp();
    Some(RemoteFile::new(path, mtime))
}

/// Destination directory rsync will be pointed at for a download batch.
pub fn local_destination(config: &ScraperConfig) -> std::path::PathBuf {
    config
        .data_dir
        .join(&config.rsync_host)
        .join(&config.rsync_module)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_listing_line() {
        let line = "2026/07/31/20260731T120000Z-foo.tar.gz 2026/07/31-12:00:00";
        let parsed = parse_listing_line(line).unwrap().unwrap();
        assert_eq!(parsed.path, "2026/07/31/20260731T120000Z-foo.tar.gz");
        assert_eq!(parsed.mtime, 1785499200);
    }

    #[test]
    fn parses_listing_line_with_space_in_basename() {
        let line = "2026/07/31/20260731T120000Z foo bar.tar.gz 2026/07/31-12:00:00";
        let parsed = parse_listing_line(line).unwrap().unwrap();
        assert_eq!(parsed.path, "2026/07/31/20260731T120000Z foo bar.tar.gz");
        assert_eq!(parsed.mtime, 1785499200);
    }

    #[test]
    fn skips_uptodate_line() {
        assert_eq!(parse_listing_line("2026/07/31/foo.tar.gz is uptodate"), Some(None));
    }

    #[test]
    fn ignores_unrecognized_line() {
        assert_eq!(parse_listing_line("receiving incremental file list"), None);
    }
}
