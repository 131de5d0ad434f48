use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use scraper_core::config::{
    ScraperConfig, DEFAULT_DATASTORE_NAMESPACE, DEFAULT_DATA_BUFFER_THRESHOLD,
    DEFAULT_DATA_WAIT_TIME_SECS, DEFAULT_EXPECTED_WAIT_TIME_SECS, DEFAULT_MAX_SLEEP_SECS,
    DEFAULT_MAX_UNCOMPRESSED_SIZE, DEFAULT_RSYNC_BINARY, DEFAULT_RSYNC_PORT, DEFAULT_TAR_BINARY,
};

/// Repeatedly scrape a single experiment at one mlab site, uploading the
/// results to object storage once enough time has passed.
#[derive(Parser, Debug)]
#[command(name = "scraperd", version, about)]
pub struct Cli {
    /// The mlab host to connect to over rsync, e.g. mlab1.lga0t.measurement-lab.org
    #[arg(long, env = "SCRAPER_RSYNC_HOST")]
    pub rsync_host: String,

    /// The rsync module (experiment) to connect to on the server
    #[arg(long, env = "SCRAPER_RSYNC_MODULE")]
    pub rsync_module: String,

    /// The port on which the remote rsync daemon runs
    #[arg(long, env = "SCRAPER_RSYNC_PORT", default_value_t = DEFAULT_RSYNC_PORT)]
    pub rsync_port: u16,

    /// The location of the rsync binary
    #[arg(long, env = "SCRAPER_RSYNC_BINARY", default_value = DEFAULT_RSYNC_BINARY)]
    pub rsync_binary: PathBuf,

    /// The location of the tar binary
    #[arg(long, env = "SCRAPER_TAR_BINARY", default_value = DEFAULT_TAR_BINARY)]
    pub tar_binary: PathBuf,

    /// The directory under which to save downloaded data
    #[arg(long, env = "SCRAPER_DATA_DIR")]
    pub data_dir: PathBuf,

    /// The object-store bucket to upload archives to
    #[arg(long, env = "SCRAPER_BUCKET")]
    pub bucket: String,

    /// Namespace for this endpoint's sync-status record, so independent
    /// deployments can share a sync-status backend without colliding
    #[arg(long, env = "SCRAPER_DATASTORE_NAMESPACE", default_value = DEFAULT_DATASTORE_NAMESPACE)]
    pub datastore_namespace: String,

    /// The average number of seconds to wait between cycles. The actual
    /// sleep is drawn from an exponential distribution with this mean.
    #[arg(long, env = "SCRAPER_EXPECTED_WAIT_TIME", default_value_t = DEFAULT_EXPECTED_WAIT_TIME_SECS)]
    pub expected_wait_time: f64,

    /// The maximum number of uncompressed bytes in one tarfile
    #[arg(long, env = "SCRAPER_MAX_UNCOMPRESSED_SIZE", default_value_t = DEFAULT_MAX_UNCOMPRESSED_SIZE)]
    pub max_uncompressed_size: u64,

    /// Minimum file age, in seconds, before it becomes upload-eligible
    #[arg(long, env = "SCRAPER_DATA_WAIT_TIME", default_value_t = DEFAULT_DATA_WAIT_TIME_SECS)]
    pub data_wait_time: i64,

    /// Byte budget of aged-but-unarchived data above which an early upload
    /// is triggered regardless of the daily boundary
    #[arg(long, env = "SCRAPER_DATA_BUFFER_THRESHOLD", default_value_t = DEFAULT_DATA_BUFFER_THRESHOLD)]
    pub data_buffer_threshold: u64,

    /// The port on which Prometheus metrics, healthz, and readyz are served
    #[arg(long, env = "SCRAPER_METRICS_PORT", default_value_t = 9090)]
    pub metrics_port: u16,

    /// Object-store (S3-compatible) endpoint URL for archive uploads
    #[arg(long, env = "SCRAPER_OBJECT_STORE_ENDPOINT")]
    pub object_store_endpoint: String,

    /// Object-store region
    #[arg(long, env = "SCRAPER_OBJECT_STORE_REGION", default_value = "us-east-1")]
    pub object_store_region: String,

    /// Object-store access key id
    #[arg(long, env = "SCRAPER_OBJECT_STORE_ACCESS_KEY_ID")]
    pub object_store_access_key_id: String,

    /// Object-store secret access key
    #[arg(long, env = "SCRAPER_OBJECT_STORE_SECRET_ACCESS_KEY")]
    pub object_store_secret_access_key: String,

    /// Redis (or other key/value service) endpoint backing the sync-status
    /// record store
    #[arg(long, env = "SCRAPER_SYNCSTORE_ENDPOINT")]
    pub syncstore_endpoint: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "SCRAPER_LOG", default_value = "info")]
    pub log: String,

    /// Log format (json, text)
    #[arg(long, env = "SCRAPER_LOG_FORMAT", default_value = "text")]
    pub log_format: LogFormat,
}

#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Json,
    Text,
}

impl Cli {
    pub fn into_scraper_config(self) -> ScraperConfig {
        ScraperConfig {
            rsync_host: self.rsync_host,
            rsync_module: self.rsync_module,
            rsync_port: self.rsync_port,
            rsync_binary: self.rsync_binary,
            tar_binary: self.tar_binary,
            data_dir: self.data_dir,
            bucket: self.bucket,
            datastore_namespace: self.datastore_namespace,
            expected_wait_time_secs: self.expected_wait_time,
            max_sleep_secs: DEFAULT_MAX_SLEEP_SECS,
            max_uncompressed_size: self.max_uncompressed_size,
            data_wait_time_secs: self.data_wait_time,
            data_buffer_threshold: self.data_buffer_threshold,
            metrics_addr: format!("0.0.0.0:{}", self.metrics_port),
        }
    }
}
