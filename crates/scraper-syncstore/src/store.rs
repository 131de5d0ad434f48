//! Remote per-endpoint sync-status record.
//!
//! Backed by an OpenDAL operator over a key/value-style service (e.g.
//! Redis); each endpoint's record lives at `<namespace>/<rsync_url>` as a
//! JSON-encoded [`SyncRecord`]. This is both the worker's own resume point
//! and the signal the data-producing node watches to know what is safe to
//! delete, so every successful write here is durable and visible to that
//! downstream reader immediately.

use chrono::Utc;
use opendal::{ErrorKind, Operator};
use scraper_core::{ScraperError, ScraperResult, SyncRecord};

const MAX_ATTEMPTS: u32 = 5;

pub struct SyncStatusStore {
    op: Operator,
    namespace: String,
}

impl SyncStatusStore {
    pub fn new(op: Operator, namespace: impl Into<String>) -> Self {
        Self {
            op,
            namespace: namespace.into(),
        }
    }

    fn key_for(&self, rsync_url: &str) -> String {
        format!("{}/{}", self.namespace, sanitize(rsync_url))
    }

    async fn read_record(&self, rsync_url: &str) -> ScraperResult<SyncRecord> {
        let key = self.key_for(rsync_url);
        let result = with_retry(|| async {
            match self.op.read(&key).await {
                Ok(buf) => Ok(Some(buf.to_vec())),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await?;

        match result {
            None => Ok(SyncRecord::default()),
            Some(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| ScraperError::SyncStore(format!("decoding sync record: {e}"))),
        }
    }

    async fn write_record(&self, rsync_url: &str, record: &SyncRecord) -> ScraperResult<()> {
        let key = self.key_for(rsync_url);
        let json = serde_json::to_vec(record)
            .map_err(|e| ScraperError::SyncStore(format!("encoding sync record: {e}")))?;
        with_retry(|| async { self.op.write(&key, json.clone()).await })
            .await
            .map(|_| ())
    }

    /// Returns the stored high-water mark, or `default` if the record is
    /// absent or has never been archived.
    pub async fn get_last_archived_mtime(
        &self,
        rsync_url: &str,
        default: i64,
    ) -> ScraperResult<i64> {
        let record = self.read_record(rsync_url).await?;
        Ok(record.last_archived_mtime.unwrap_or(default))
    }

    /// Records that a collection attempt happened now, regardless of
    /// outcome; downstream health checks use recency of this field.
    pub async fn update_last_collection_attempt(&self, rsync_url: &str) -> ScraperResult<()> {
        let mut record = self.read_record(rsync_url).await?;
        record.last_collection_attempt = Some(Utc::now().format("x%Y-%m-%d-%H:%M").to_string());
        self.write_record(rsync_url, &record).await
    }

    /// Advances the high-water mark after a successful upload. The caller
    /// is responsible for ensuring `mtime` is not less than the previous
    /// value (monotonicity is a property of the controller, not enforced
    /// here).
    pub async fn update_last_archived(&self, rsync_url: &str, mtime: i64) -> ScraperResult<()> {
        let mut record = self.read_record(rsync_url).await?;
        let date = chrono::DateTime::<Utc>::from_timestamp(mtime, 0)
            .unwrap_or_else(|| chrono::DateTime::<Utc>::from_timestamp(0, 0).unwrap());
        record.last_archived_mtime = Some(mtime);
        record.last_archived_date = Some(date.format("x%Y-%m-%d").to_string());
        self.write_record(rsync_url, &record).await
    }

    /// Sets (or clears, with an empty string) the last-error field. This
    /// function must never itself route failures back through whatever
    /// logging sink also persists to this store — it only ever logs via
    /// `tracing`, which is not wired to call back into the sync store.
    pub async fn update_error(&self, rsync_url: &str, message: &str) -> ScraperResult<()> {
        let mut record = self.read_record(rsync_url).await?;
        record = if message.is_empty() {
            record.cleared_error()
        } else {
            record.with_error(message)
        };
        self.write_record(rsync_url, &record).await
    }
}

fn sanitize(rsync_url: &str) -> String {
    rsync_url.replace(['/', ':'], "_")
}

/// Retries a transient-failing opendal operation up to [`MAX_ATTEMPTS`]
/// times before surfacing the error.
async fn with_retry<F, Fut, T>(mut f: F) -> ScraperResult<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, opendal::Error>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match f().await {
            Ok(v) => return Ok(v),
            Err(e) if attempt < MAX_ATTEMPTS && is_transient(&e) => {
                tracing::warn!(attempt, error = %e, "sync-status store operation failed, retrying");
                continue;
            }
            Err(e) => {
                return Err(ScraperError::SyncStore(format!(
                    "sync-status store operation failed after {attempt} attempt(s): {e}"
                )))
            }
        }
    }
}

fn is_transient(err: &opendal::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::Unexpected | ErrorKind::RateLimited | ErrorKind::ConditionNotMatch
    )
}
