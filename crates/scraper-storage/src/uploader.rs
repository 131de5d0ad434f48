//! Resumable chunked archive upload with bounded-retry semantics.

use std::path::Path;
use std::time::Duration;

use opendal::{ErrorKind, Operator};
use rand::Rng;
use scraper_core::{ScraperError, ScraperResult};
use tokio_util::sync::CancellationToken;

/// Chunk size for resumable uploads. Larger chunks have been observed to
/// spike memory on a busy worker uploading several endpoints at once.
pub const CHUNK_SIZE: usize = 10 * 1024 * 1024;

const BACKOFF_CAP_SECS: f64 = 300.0;
const JITTER_MIN_SECS: f64 = 1.0;
const JITTER_MAX_SECS: f64 = 5.0;

/// Uploads `archive_path` to `object_name`, overwriting any existing object
/// at that key. Transient object-store errors (5xx-equivalent) are retried
/// with exponential backoff plus jitter, uncapped in attempt count — there
/// is no useful forward progress to make while the store is down, so the
/// worker simply waits it out. Any other error is surfaced immediately as
/// non-recoverable. `shutdown` races the backoff sleep so a SIGTERM/SIGINT
/// during a long outage doesn't block the process for up to 300s.
pub async fn upload_archive(
    op: &Operator,
    archive_path: &Path,
    object_name: &str,
    shutdown: &CancellationToken,
) -> ScraperResult<()> {
    let content = tokio::fs::read(archive_path)
        .await
        .map_err(|e| ScraperError::Storage(format!("reading archive for upload: {e}")))?;

    let mut attempt: u32 = 0;
    loop {
        match op.write_with(object_name, content.clone()).chunk(CHUNK_SIZE).await {
            Ok(_) => return Ok(()),
            Err(e) if is_recoverable(&e) => {
                attempt += 1;
                let sleep = backoff_duration(attempt);
                tracing::warn!(
                    object_name,
                    attempt,
                    sleep_secs = sleep.as_secs_f64(),
                    error = %e,
                    "upload failed transiently, retrying"
                );
                if backoff_sleep(sleep, shutdown).await.is_err() {
                    tracing::info!(object_name, "upload backoff interrupted by shutdown signal");
                    return Err(ScraperError::Cancelled);
                }
            }
            Err(e) => {
                return Err(ScraperError::Storage(format!(
                    "upload of {object_name} failed: {e}"
                )));
            }
        }
    }
}

/// Transient/5xx-equivalent failures are retried; everything else is fatal
/// for this cycle.
fn is_recoverable(err: &opendal::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::Unexpected | ErrorKind::RateLimited | ErrorKind::ConditionNotMatch
    )
}

/// `2^attempt` seconds of base delay plus uniform jitter in `[1, 5]`
/// seconds, capped at 300 seconds total.
fn backoff_duration(attempt: u32) -> Duration {
    let base = 2f64.powi(attempt.min(16) as i32);
    let jitter = rand::thread_rng().gen_range(JITTER_MIN_SECS..=JITTER_MAX_SECS);
    let secs = (base + jitter).min(BACKOFF_CAP_SECS);
    Duration::from_secs_f64(secs)
}

/// Sleeps for `duration` unless `shutdown` is cancelled first.
async fn backoff_sleep(duration: Duration, shutdown: &CancellationToken) -> Result<(), ()> {
    tokio::select! {
        _ = tokio::time::sleep(duration) => Ok(()),
        _ = shutdown.cancelled() => Err(()),
    }
}
