use std::io::Write;
use std::process::Stdio;

use scraper_core::{RemoteFile, ScraperConfig, ScraperError, ScraperResult};
use tokio::process::Command;

use crate::lister::local_destination;

/// rsync allocates per-file bookkeeping proportional to the size of
/// `--files-from`; unbounded batches have been observed to exhaust worker
/// memory, so downloads are chunked at this many paths per invocation.
const MAX_BATCH: usize = 1000;

/// Downloads the given remote files into the endpoint's local buffer
/// directory, in batches of at most [`MAX_BATCH`] paths per rsync
/// invocation. A no-op on an empty input.
pub async fn download_files(config: &ScraperConfig, files: &[RemoteFile]) -> ScraperResult<()> {
    if files.is_empty() {
        tracing::info!(url = %config.rsync_url(), "no files to download");
        return Ok(());
    }

    let destination = local_destination(config);
    tokio::fs::create_dir_all(&destination).await?;

    for batch in files.chunks(MAX_BATCH) {
        download_batch(config, batch, &destination).await?;
    }
    Ok(())
}

async fn download_batch(
    config: &ScraperConfig,
    batch: &[RemoteFile],
    destination: &std::path::Path,
) -> ScraperResult<()> {
    let mut list_file = tempfile::NamedTempFile::new()?;
    for file in batch {
        list_file.write_all(file.path.as_bytes())?;
        list_file.write_all(b"\0")?;
    }
    list_file.flush()?;

    let mut cmd = Command::new(&config.rsync_binary);
    cmd.arg("-4")
        .arg("-az")
        .arg("--bwlimit=10000")
        .arg("--timeout=300")
        .arg("--contimeout=300")
        .arg("--chmod=u=rwX")
        .arg(format!("--port={}", config.rsync_port))
        .arg("--from0")
        .arg("--files-from")
        .arg(list_file.path())
        .arg(config.rsync_url() + "/")
        .arg(destination);
    cmd.stdout(Stdio::null());
    cmd.stderr(Stdio::piped());
    cmd.kill_on_drop(true);

    tracing::info!(count = batch.len(), url = %config.rsync_url(), "downloading batch");

    let output = cmd
        .output()
        .await
        .map_err(|e| ScraperError::RsyncDownload(format!("failed to spawn rsync: {e}")))?;

    match output.status.code() {
        Some(0) | Some(24) => Ok(()),
        _ => Err(ScraperError::RsyncDownload(format!(
            "rsync exited with {:?}: {}",
            output.status.code(),
            String::from_utf8_lossy(&output.stderr).trim()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper_core::config::{
        DEFAULT_DATA_BUFFER_THRESHOLD, DEFAULT_DATA_WAIT_TIME_SECS, DEFAULT_MAX_SLEEP_SECS,
        DEFAULT_MAX_UNCOMPRESSED_SIZE, DEFAULT_METRICS_ADDR,
    };
    use std::path::PathBuf;

    fn test_config(data_dir: PathBuf) -> ScraperConfig {
        ScraperConfig {
            rsync_host: "mlab1.lga0t.measurement-lab.org".into(),
            rsync_module: "ndt".into(),
            rsync_port: 7999,
            rsync_binary: PathBuf::from("/bin/true"),
            tar_binary: PathBuf::from("/bin/true"),
            data_dir,
            bucket: "test-bucket".into(),
            datastore_namespace: "scraper".into(),
            expected_wait_time_secs: 1800.0,
            max_sleep_secs: DEFAULT_MAX_SLEEP_SECS,
            max_uncompressed_size: DEFAULT_MAX_UNCOMPRESSED_SIZE,
            data_wait_time_secs: DEFAULT_DATA_WAIT_TIME_SECS,
            data_buffer_threshold: DEFAULT_DATA_BUFFER_THRESHOLD,
            metrics_addr: DEFAULT_METRICS_ADDR.to_string(),
        }
    }

    #[tokio::test]
    async fn empty_input_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path().to_path_buf());
        download_files(&config, &[]).await.unwrap();
    }
}
