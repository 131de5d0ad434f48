//! scraperd: mlab endpoint scraper daemon
//!
//! Mirrors one rsync module from one mlab host, batches stable data into
//! compressed tar archives, and uploads them to object storage while
//! maintaining a remote sync-status record.

mod cli;
mod controller;
mod metrics;
mod shutdown;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use prometheus_client::registry::Registry;
use scraper_core::hostname::endpoint_identity;
use scraper_storage::operator::ObjectStoreConfig;
use scraper_syncstore::SyncStatusStore;
use tracing::info;

use cli::{Cli, LogFormat};
use controller::Controller;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log, &cli.log_format);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %cli.rsync_host,
        module = %cli.rsync_module,
        "scraperd starting"
    );

    let endpoint = endpoint_identity(&cli.rsync_host, &cli.rsync_module)
        .context("rsync host is not a valid mlab hostname")?;

    let object_store_config = ObjectStoreConfig {
        endpoint: cli.object_store_endpoint.clone(),
        region: cli.object_store_region.clone(),
        bucket: cli.bucket.clone(),
        access_key_id: cli.object_store_access_key_id.clone(),
        secret_access_key: cli.object_store_secret_access_key.clone(),
    };
    let object_store =
        scraper_storage::build_operator(&object_store_config).context("building archive object store")?;
    scraper_storage::check_health(&object_store)
        .await
        .context("archive object store is not reachable")?;
    info!(endpoint = %cli.object_store_endpoint, bucket = %cli.bucket, "archive store: connected");

    let syncstore_op = build_syncstore_operator(&cli.syncstore_endpoint)
        .context("building sync-status store operator")?;
    let sync_store = SyncStatusStore::new(syncstore_op, cli.datastore_namespace.clone());

    let mut registry = Registry::default();
    let worker_metrics = Arc::new(metrics::WorkerMetrics::new(&mut registry));
    let ready = Arc::new(AtomicBool::new(false));

    let config = cli.into_scraper_config();

    let metrics_addr = config.metrics_addr.clone();
    let health_state = metrics::HealthState {
        registry: Arc::new(registry),
        ready: ready.clone(),
    };
    tokio::spawn(async move {
        if let Err(e) = metrics::serve(metrics_addr, health_state).await {
            tracing::error!(error = %e, "metrics server failed");
        }
    });

    let shutdown = shutdown::spawn_listener();

    let controller = Controller::new(
        config,
        endpoint,
        object_store,
        sync_store,
        worker_metrics,
        ready,
    );

    controller.run_forever(shutdown).await;

    info!("scraperd stopped");
    Ok(())
}

/// Builds the operator backing the sync-status record store. Any opendal
/// key/value service works here; redis is the donor's choice for a small,
/// frequently-read-and-written record per endpoint.
fn build_syncstore_operator(endpoint: &str) -> Result<opendal::Operator> {
    let builder = opendal::services::Redis::default().endpoint(endpoint);
    let op = opendal::Operator::new(builder)
        .context("creating OpenDAL redis operator")?
        .layer(opendal::layers::LoggingLayer::default())
        .layer(
            opendal::layers::RetryLayer::new()
                .with_max_times(5)
                .with_jitter(),
        )
        .finish();
    Ok(op)
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json())
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .init();
        }
    }
}
