//! Prometheus `/metrics` + `/healthz` + `/readyz` endpoints for one endpoint
//! worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use prometheus_client::encoding::text::encode;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::Histogram;
use prometheus_client::registry::Registry;

/// Generalizes `run_scraper.py`'s `RSYNC_RUNS` / `UPLOAD_RUNS` / `SLEEPS` /
/// `SCRAPER_SUCCESS` into typed, labeled metrics.
pub struct WorkerMetrics {
    pub rsync_listing_duration: Histogram,
    pub rsync_download_duration: Histogram,
    pub upload_duration: Histogram,
    pub sleep_duration: Histogram,
    pub cycles_total: Family<Vec<(String, String)>, Counter>,
    pub errors_total: Family<Vec<(String, String)>, Counter>,
}

/// Roughly logarithmic buckets spanning a second to several hours, matching
/// the shape of the donor's `scraper.TIME_BUCKETS`.
fn time_buckets() -> impl Iterator<Item = f64> {
    [
        1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0, 7200.0,
    ]
    .into_iter()
}

impl WorkerMetrics {
    pub fn new(registry: &mut Registry) -> Self {
        let rsync_listing_duration = Histogram::new(time_buckets());
        let rsync_download_duration = Histogram::new(time_buckets());
        let upload_duration = Histogram::new(time_buckets());
        let sleep_duration = Histogram::new(time_buckets());
        let cycles_total = Family::default();
        let errors_total = Family::default();

        registry.register(
            "scraper_rsync_listing_duration_seconds",
            "How long each rsync listing took",
            rsync_listing_duration.clone(),
        );
        registry.register(
            "scraper_rsync_download_duration_seconds",
            "How long each rsync download took",
            rsync_download_duration.clone(),
        );
        registry.register(
            "scraper_upload_duration_seconds",
            "How long each archive upload took",
            upload_duration.clone(),
        );
        registry.register(
            "scraper_sleep_seconds",
            "How long the worker slept between cycles",
            sleep_duration.clone(),
        );
        registry.register(
            "scraper_cycles_total",
            "Completed cycles by outcome",
            cycles_total.clone(),
        );
        registry.register(
            "scraper_errors_total",
            "Errors observed by stable label",
            errors_total.clone(),
        );

        Self {
            rsync_listing_duration,
            rsync_download_duration,
            upload_duration,
            sleep_duration,
            cycles_total,
            errors_total,
        }
    }

    pub fn record_cycle(&self, outcome: &str) {
        self.cycles_total
            .get_or_create(&vec![("outcome".to_string(), outcome.to_string())])
            .inc();
    }

    pub fn record_error(&self, label: &str) {
        self.errors_total
            .get_or_create(&vec![("label".to_string(), label.to_string())])
            .inc();
    }
}

#[derive(Clone)]
pub struct HealthState {
    pub registry: Arc<Registry>,
    pub ready: Arc<AtomicBool>,
}

pub async fn serve(addr: String, state: HealthState) -> anyhow::Result<()> {
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .route("/readyz", get(readyz_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("metrics bind {addr}: {e}"))?;

    tracing::info!(addr = %addr, "metrics: listening on /metrics, /healthz, /readyz");

    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("metrics server: {e}"))
}

async fn metrics_handler(State(state): State<HealthState>) -> impl IntoResponse {
    let mut body = String::new();
    match encode(&mut body, &state.registry) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            body,
        ),
        Err(e) => {
            tracing::error!("metrics encode failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                e.to_string(),
            )
        }
    }
}

async fn healthz_handler() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn readyz_handler(State(state): State<HealthState>) -> impl IntoResponse {
    if state.ready.load(Ordering::Relaxed) {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "storage unreachable")
    }
}
