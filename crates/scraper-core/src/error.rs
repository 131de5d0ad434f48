use thiserror::Error;

pub type ScraperResult<T> = Result<T, ScraperError>;

/// A stable, short label for a failure kind, used to dimension metrics and to
/// populate the sync record's error field without leaking dynamic detail.
pub type ErrorLabel = &'static str;

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("rsync listing failed: {0}")]
    RsyncListing(String),

    #[error("rsync download failed: {0}")]
    RsyncDownload(String),

    #[error("tar packing failed: {0}")]
    TarError(String),

    #[error("tar reported success but did not produce {0}")]
    NoTarFile(String),

    /// Non-recoverable by construction: `upload_archive` retries every
    /// transient (5xx-equivalent) object-store failure internally, forever,
    /// so the only `Storage` errors that ever reach the controller are the
    /// non-retried kind.
    #[error("object store error: {0}")]
    Storage(String),

    #[error("sync-status store error: {0}")]
    SyncStore(String),

    #[error("invalid hostname: {0}")]
    InvalidHostname(String),

    #[error("operation cancelled by shutdown")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ScraperError {
    /// Whether the controller should treat this as transient and simply
    /// retry on the next cycle, versus a condition that needs attention but
    /// still must not crash the worker.
    pub fn recoverable(&self) -> bool {
        matches!(
            self,
            ScraperError::RsyncListing(_) | ScraperError::RsyncDownload(_) | ScraperError::SyncStore(_)
        )
    }

    /// Stable label used for the `scraper_errors_total{label}` counter and
    /// as a prefix on the sync record's error message.
    pub fn label(&self) -> ErrorLabel {
        match self {
            ScraperError::RsyncListing(_) => "rsync_listing",
            ScraperError::RsyncDownload(_) => "rsync_download",
            ScraperError::TarError(_) => "tar_error",
            ScraperError::NoTarFile(_) => "no_tar_file",
            ScraperError::Storage(_) => "storage",
            ScraperError::SyncStore(_) => "sync_store",
            ScraperError::InvalidHostname(_) => "invalid_hostname",
            ScraperError::Cancelled => "cancelled",
            ScraperError::Io(_) => "io",
            ScraperError::Other(_) => "other",
        }
    }
}
