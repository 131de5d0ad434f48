use std::path::PathBuf;

/// Frozen, startup-assembled tunables for one endpoint worker.
///
/// Built once from CLI flags (see `scraperd::cli::Cli`) and never mutated
/// afterward; every component takes a `&ScraperConfig` rather than holding
/// its own copy of individual fields.
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    /// The mlab rsync host, e.g. `mlab1.lga0t.measurement-lab.org`.
    pub rsync_host: String,
    /// The rsync module (experiment) name on that host.
    pub rsync_module: String,
    /// Port the remote rsync daemon listens on.
    pub rsync_port: u16,
    /// Path to the local rsync binary.
    pub rsync_binary: PathBuf,
    /// Path to the local tar binary.
    pub tar_binary: PathBuf,
    /// Root directory under which this endpoint's buffer directory lives.
    pub data_dir: PathBuf,
    /// Object-store bucket archives are uploaded to.
    pub bucket: String,
    /// Namespace prefix for this endpoint's sync-status record, allowing
    /// multiple independent deployments to share one key/value backend.
    pub datastore_namespace: String,
    /// Mean inter-cycle sleep, seconds. Actual sleep is drawn from an
    /// exponential distribution with this mean, then clamped to `max_sleep`.
    pub expected_wait_time_secs: f64,
    /// Hard cap on the inter-cycle sleep, seconds.
    pub max_sleep_secs: u64,
    /// Maximum uncompressed bytes per archive before the packer seals it
    /// (subject to the same-second grouping invariant).
    pub max_uncompressed_size: u64,
    /// Minimum file age, seconds, before a file becomes upload-eligible.
    pub data_wait_time_secs: i64,
    /// Byte budget of aged-but-unarchived data above which an early upload
    /// is triggered regardless of the daily boundary.
    pub data_buffer_threshold: u64,
    /// Bind address for the `/metrics`, `/healthz`, `/readyz` HTTP server.
    pub metrics_addr: String,
}

impl ScraperConfig {
    pub fn rsync_url(&self) -> String {
        format!(
            "rsync://{}:{}/{}",
            self.rsync_host, self.rsync_port, self.rsync_module
        )
    }
}

pub const DEFAULT_RSYNC_PORT: u16 = 7999;
pub const DEFAULT_RSYNC_BINARY: &str = "/usr/bin/rsync";
pub const DEFAULT_TAR_BINARY: &str = "/bin/tar";
pub const DEFAULT_DATASTORE_NAMESPACE: &str = "scraper";
pub const DEFAULT_EXPECTED_WAIT_TIME_SECS: f64 = 1800.0;
pub const DEFAULT_MAX_SLEEP_SECS: u64 = 3600;
pub const DEFAULT_MAX_UNCOMPRESSED_SIZE: u64 = 1_000_000_000;
pub const DEFAULT_DATA_WAIT_TIME_SECS: i64 = 3600;
pub const DEFAULT_DATA_BUFFER_THRESHOLD: u64 = 100_000_000;
pub const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:9090";

pub const QUIESCENCE_WINDOW_SECS: i64 = 15 * 60;
