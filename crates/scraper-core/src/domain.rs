use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// `YYYY/MM/DD/<basename>` with no further slashes in the basename.
static DAY_PATH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}/\d\d/\d\d/[^/].*$").expect("valid regex"));

/// The producer host × site × node × experiment tuple that names one data
/// source, plus the derived fields used in archive filenames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointIdentity {
    pub producer_host: String,
    pub site: String,
    pub node: String,
    pub experiment: String,
}

impl EndpointIdentity {
    pub fn rsync_url(&self, port: u16) -> String {
        format!(
            "rsync://{}:{}/{}",
            self.producer_host, port, self.experiment
        )
    }
}

fn is_day_path(path: &str) -> bool {
    DAY_PATH_RE.is_match(path)
}

/// A file observed on the remote rsync module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    /// Relative path of the form `YYYY/MM/DD/<basename>`.
    pub path: String,
    /// Whole-second mtime, UTC.
    pub mtime: i64,
}

impl RemoteFile {
    /// Builds a `RemoteFile`, rejecting paths that don't match the
    /// `YYYY/MM/DD/<basename>` shape the lister and packer both rely on.
    pub fn new(path: impl Into<String>, mtime: i64) -> Option<Self> {
        let path = path.into();
        if !is_day_path(&path) {
            return None;
        }
        Some(Self { path, mtime })
    }
}

/// A file already present in the local buffer directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    /// Relative path of the form `YYYY/MM/DD/<basename>`.
    pub path: String,
    pub mtime: i64,
    pub size: u64,
}

impl LocalFile {
    pub fn new(path: impl Into<String>, mtime: i64, size: u64) -> Option<Self> {
        let path = path.into();
        if !is_day_path(&path) {
            return None;
        }
        Some(Self { path, mtime, size })
    }
}

/// Metadata for one sealed archive, named from the minimum mtime of its
/// contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    pub filename: String,
    pub min_mtime: i64,
    pub max_mtime: i64,
    pub file_count: usize,
}

impl Archive {
    /// `YYYYMMDDTHHMMSSZ-<node>-<site>-<experiment>-0000.tgz`, per the
    /// legacy fixed sequence suffix.
    pub fn filename_for(endpoint: &EndpointIdentity, min_mtime: i64) -> String {
        let dt = chrono::DateTime::<chrono::Utc>::from_timestamp(min_mtime, 0)
            .unwrap_or_else(|| chrono::DateTime::<chrono::Utc>::from_timestamp(0, 0).unwrap());
        format!(
            "{}-{}-{}-{}-0000.tgz",
            dt.format("%Y%m%dT%H%M%SZ"),
            endpoint.node,
            endpoint.site,
            endpoint.experiment,
        )
    }

    /// `<experiment>/<YYYY>/<MM>/<DD>/<basename>` object-store key.
    pub fn object_name(&self, experiment: &str) -> String {
        let dt = chrono::DateTime::<chrono::Utc>::from_timestamp(self.min_mtime, 0)
            .unwrap_or_else(|| chrono::DateTime::<chrono::Utc>::from_timestamp(0, 0).unwrap());
        format!(
            "{}/{}/{}",
            experiment,
            dt.format("%Y/%m/%d"),
            self.filename
        )
    }
}

/// The durable per-endpoint sync-status record: both the resume point for
/// this worker and the signal the producer watches to know what is safe to
/// delete.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncRecord {
    /// Seconds since epoch of the largest mtime fully archived so far.
    pub last_archived_mtime: Option<i64>,
    /// `x%Y-%02m-%02d` formatted date of the last archived mtime.
    pub last_archived_date: Option<String>,
    /// `x%Y-%m-%d-%H:%M` formatted timestamp of the last collection
    /// attempt (successful or not).
    pub last_collection_attempt: Option<String>,
    /// Last error message, truncated to MAX_ERROR_LEN bytes; empty once a
    /// cycle completes cleanly.
    #[serde(default)]
    pub last_error_message: String,
}

/// Sync records must not grow the error field unboundedly; truncated at the
/// byte boundary the original spreadsheet-backed store also enforced.
pub const MAX_ERROR_LEN: usize = 1400;

impl SyncRecord {
    pub fn with_error(mut self, message: &str) -> Self {
        self.last_error_message = truncate_error(message);
        self
    }

    pub fn cleared_error(mut self) -> Self {
        self.last_error_message.clear();
        self
    }
}

fn truncate_error(message: &str) -> String {
    if message.len() <= MAX_ERROR_LEN {
        message.to_string()
    } else {
        message.chars().take(MAX_ERROR_LEN).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_file_accepts_day_path() {
        assert!(RemoteFile::new("2026/07/31/foo.tar", 10).is_some());
    }

    #[test]
    fn remote_file_rejects_malformed_path() {
        assert!(RemoteFile::new("foo/bar", 10).is_none());
        assert!(RemoteFile::new("2026/07/31/", 10).is_none());
    }

    #[test]
    fn archive_filename_uses_min_mtime_and_identity() {
        let endpoint = EndpointIdentity {
            producer_host: "mlab1.lga0t.measurement-lab.org".into(),
            site: "lga0t".into(),
            node: "mlab1".into(),
            experiment: "ndt".into(),
        };
        let name = Archive::filename_for(&endpoint, 1_800_000_000);
        assert!(name.starts_with("20270115T080000Z"));
        assert!(name.ends_with("-mlab1-lga0t-ndt-0000.tgz"));
    }

    #[test]
    fn error_message_is_truncated() {
        let long = "x".repeat(MAX_ERROR_LEN + 50);
        let record = SyncRecord::default().with_error(&long);
        assert_eq!(record.last_error_message.len(), MAX_ERROR_LEN);
    }
}
