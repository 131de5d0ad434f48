//! The per-endpoint sync cycle: list -> download -> decide -> pack ->
//! upload -> advance -> sleep.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, TimeZone, Timelike, Utc};
use opendal::Operator;
use rand::Rng;
use scraper_core::config::QUIESCENCE_WINDOW_SECS;
use scraper_core::{EndpointIdentity, RemoteFile, ScraperConfig, ScraperError};
use scraper_syncstore::SyncStatusStore;
use tokio_util::sync::CancellationToken;

use crate::metrics::WorkerMetrics;

pub struct Controller {
    config: ScraperConfig,
    endpoint: EndpointIdentity,
    object_store: Operator,
    sync_store: SyncStatusStore,
    metrics: Arc<WorkerMetrics>,
    ready: Arc<std::sync::atomic::AtomicBool>,
}

impl Controller {
    pub fn new(
        config: ScraperConfig,
        endpoint: EndpointIdentity,
        object_store: Operator,
        sync_store: SyncStatusStore,
        metrics: Arc<WorkerMetrics>,
        ready: Arc<std::sync::atomic::AtomicBool>,
    ) -> Self {
        Self {
            config,
            endpoint,
            object_store,
            sync_store,
            metrics,
            ready,
        }
    }

    fn rsync_url(&self) -> String {
        self.config.rsync_url()
    }

    /// Runs cycles until `shutdown` is cancelled. Performs one stale-disk
    /// drain before the first cycle so a restart with unflushed buffers
    /// makes forward progress before re-listing the remote side.
    pub async fn run_forever(&self, shutdown: CancellationToken) {
        tracing::info!(url = %self.rsync_url(), "stale-disk drain");
        if let Err(e) = self.drain_stale_disk(&shutdown).await {
            self.handle_error(&e).await;
        }
        self.refresh_readiness().await;

        loop {
            if shutdown.is_cancelled() {
                break;
            }

            match self.run_cycle(&shutdown).await {
                Ok(()) => {
                    self.metrics.record_cycle("success");
                }
                Err(e) => {
                    self.handle_error(&e).await;
                    let outcome = if e.recoverable() {
                        "recoverable_error"
                    } else {
                        "non_recoverable_error"
                    };
                    self.metrics.record_cycle(outcome);
                }
            }
            self.refresh_readiness().await;

            let sleep_secs = next_sleep_secs(
                self.config.expected_wait_time_secs,
                self.config.max_sleep_secs,
            );
            tracing::info!(seconds = sleep_secs, "sleeping until next cycle");
            self.metrics.sleep_duration.observe(sleep_secs);

            let slept = crate::shutdown::sleep_or_cancel(
                Duration::from_secs_f64(sleep_secs),
                &shutdown,
            )
            .await;
            if !slept {
                tracing::info!("sleep interrupted by shutdown signal");
                break;
            }
        }
    }

    /// `/readyz` reflects the last cycle's storage health check, not just
    /// whether a cycle ever once succeeded.
    async fn refresh_readiness(&self) {
        let healthy = scraper_storage::is_healthy(&self.object_store).await;
        self.ready.store(healthy, Ordering::Relaxed);
    }

    async fn handle_error(&self, error: &ScraperError) {
        tracing::error!(url = %self.rsync_url(), label = error.label(), error = %error, "cycle failed");
        self.metrics.record_error(error.label());
        // Best-effort: a failure to persist the error must not itself
        // crash the worker, and must not be retried through this path.
        if let Err(e) = self.sync_store.update_error(&self.rsync_url(), &error.to_string()).await {
            tracing::warn!(error = %e, "failed to persist error to sync-status store");
        }
    }

    async fn drain_stale_disk(&self, shutdown: &CancellationToken) -> Result<(), ScraperError> {
        let high = self
            .sync_store
            .get_last_archived_mtime(&self.rsync_url(), 0)
            .await?;
        let now = Utc::now().timestamp();
        self.process_upload_policy(shutdown, high, now).await
    }

    async fn run_cycle(&self, shutdown: &CancellationToken) -> Result<(), ScraperError> {
        let rsync_url = self.rsync_url();
        self.sync_store.update_last_collection_attempt(&rsync_url).await?;

        let high = self.sync_store.get_last_archived_mtime(&rsync_url, 0).await?;
        let now = Utc::now().timestamp();
        let quiescence_boundary = now - QUIESCENCE_WINDOW_SECS;

        let started = std::time::Instant::now();
        let remote_files = scraper_rsync::list_remote_files(&self.config).await?;
        self.metrics
            .rsync_listing_duration
            .observe(started.elapsed().as_secs_f64());

        let filtered: Vec<RemoteFile> = remote_files
            .into_iter()
            .filter(|f| f.mtime > high && f.mtime <= quiescence_boundary)
            .collect();

        let started = std::time::Instant::now();
        scraper_rsync::download_files(&self.config, &filtered).await?;
        self.metrics
            .rsync_download_duration
            .observe(started.elapsed().as_secs_f64());

        self.process_upload_policy(shutdown, high, now).await?;

        self.sync_store.update_error(&rsync_url, "").await?;
        Ok(())
    }

    /// Implements the upload policy: an early upload when aged-unarchived
    /// data exceeds the buffer threshold, otherwise the ordinary daily
    /// boundary, otherwise nothing this cycle.
    async fn process_upload_policy(
        &self,
        shutdown: &CancellationToken,
        high: i64,
        now: i64,
    ) -> Result<(), ScraperError> {
        let destination = scraper_rsync::local_destination(&self.config);
        let eligible_boundary = now - self.config.data_wait_time_secs;

        let aged = scraper_pack::scan_window(&destination, high, eligible_boundary)?;
        let aged_bytes: u64 = aged.iter().map(|f| f.size).sum();

        let daily = daily_boundary(now);
        if aged_bytes > self.config.data_buffer_threshold {
            tracing::info!(
                aged_bytes,
                threshold = self.config.data_buffer_threshold,
                "early upload triggered by buffer threshold"
            );
        }
        let boundary = decide_upload_boundary(
            aged_bytes,
            self.config.data_buffer_threshold,
            eligible_boundary,
            daily,
            high,
        );

        let Some(boundary) = boundary else {
            return Ok(());
        };

        let files = scraper_pack::scan_window(&destination, high, boundary)?;
        if files.is_empty() {
            return Ok(());
        }

        let batches = scraper_pack::group_into_batches(files, self.config.max_uncompressed_size);

        for batch in batches {
            let sealed = scraper_pack::seal_batch(
                &self.config.tar_binary,
                &destination,
                &self.endpoint,
                batch,
            )
            .await?;

            let object_name = sealed.archive.object_name(&self.endpoint.experiment);
            let started = std::time::Instant::now();
            scraper_storage::upload_archive(&self.object_store, &sealed.path, &object_name, shutdown)
                .await?;
            self.metrics
                .upload_duration
                .observe(started.elapsed().as_secs_f64());

            self.sync_store
                .update_last_archived(&self.rsync_url(), sealed.archive.max_mtime)
                .await?;

            scraper_pack::cleanup_after_upload(&destination, &sealed)?;
        }

        Ok(())
    }
}

/// The upload-policy decision, factored out of I/O so it can be checked
/// against the input space directly: early-upload by buffer threshold takes
/// priority, otherwise the daily boundary applies only if it has advanced
/// past the high-water mark, otherwise nothing is due this cycle.
fn decide_upload_boundary(
    aged_bytes: u64,
    threshold: u64,
    eligible_boundary: i64,
    daily: i64,
    high: i64,
) -> Option<i64> {
    if aged_bytes > threshold {
        Some(eligible_boundary)
    } else if daily > high {
        Some(daily)
    } else {
        None
    }
}

/// 23:59:59 UTC of the day before yesterday if it's before 08:00 UTC,
/// otherwise of yesterday. Before 08:00 we can't yet be sure yesterday's
/// data has finished landing on disk.
fn daily_boundary(now: i64) -> i64 {
    let dt = Utc.timestamp_opt(now, 0).single().expect("valid timestamp");
    let days_back = if dt.hour() >= 8 { 1 } else { 2 };
    let day = dt.date_naive() - chrono::Duration::days(days_back);
    let end_of_day = day.and_hms_opt(23, 59, 59).expect("valid time");
    Utc.from_utc_datetime(&end_of_day).timestamp()
}

/// Draws an exponentially-distributed sleep with the configured mean,
/// clamped to `max_sleep_secs`, so the resulting arrival process across
/// many workers stays memoryless (Poisson) without any one worker stalling
/// for an unbounded tail.
fn next_sleep_secs(mean_secs: f64, max_secs: u64) -> f64 {
    let u: f64 = rand::thread_rng().gen_range(f64::EPSILON..1.0);
    let drawn = -mean_secs * u.ln();
    drawn.min(max_secs as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daily_boundary_before_8am_goes_back_two_days() {
        let dt = Utc.with_ymd_and_hms(2026, 7, 31, 7, 0, 0).unwrap();
        let boundary = daily_boundary(dt.timestamp());
        let boundary_dt = Utc.timestamp_opt(boundary, 0).single().unwrap();
        assert_eq!(boundary_dt.day(), 29);
        assert_eq!(boundary_dt.hour(), 23);
        assert_eq!(boundary_dt.minute(), 59);
    }

    #[test]
    fn daily_boundary_after_8am_goes_back_one_day() {
        let dt = Utc.with_ymd_and_hms(2026, 7, 31, 9, 0, 0).unwrap();
        let boundary = daily_boundary(dt.timestamp());
        let boundary_dt = Utc.timestamp_opt(boundary, 0).single().unwrap();
        assert_eq!(boundary_dt.day(), 30);
    }

    #[test]
    fn sleep_is_clamped_to_max() {
        for _ in 0..1000 {
            let s = next_sleep_secs(1800.0, 3600);
            assert!(s <= 3600.0);
            assert!(s >= 0.0);
        }
    }

    #[test]
    fn buffer_threshold_wins_over_daily_boundary() {
        let boundary = decide_upload_boundary(2_000, 1_000, 555, 100, 50);
        assert_eq!(boundary, Some(555));
    }

    #[test]
    fn daily_boundary_used_when_under_threshold_and_advanced() {
        let boundary = decide_upload_boundary(500, 1_000, 555, 600, 100);
        assert_eq!(boundary, Some(600));
    }

    #[test]
    fn nothing_due_when_under_threshold_and_daily_not_advanced() {
        let boundary = decide_upload_boundary(500, 1_000, 555, 100, 100);
        assert_eq!(boundary, None);
    }
}

#[cfg(test)]
mod proptest_suite {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn decision_always_matches_one_of_the_three_branches(
            aged_bytes in 0u64..10_000_000,
            threshold in 0u64..10_000_000,
            eligible_boundary in 0i64..2_000_000_000,
            daily in 0i64..2_000_000_000,
            high in 0i64..2_000_000_000,
        ) {
            let result = decide_upload_boundary(aged_bytes, threshold, eligible_boundary, daily, high);
            if aged_bytes > threshold {
                prop_assert_eq!(result, Some(eligible_boundary));
            } else if daily > high {
                prop_assert_eq!(result, Some(daily));
            } else {
                prop_assert_eq!(result, None);
            }
        }

        #[test]
        fn daily_boundary_is_always_before_now(now in 0i64..4_000_000_000) {
            let boundary = daily_boundary(now);
            prop_assert!(boundary < now);
        }

        #[test]
        fn daily_boundary_is_always_23_59_59_utc(now in 0i64..4_000_000_000) {
            let boundary = daily_boundary(now);
            let dt = Utc.timestamp_opt(boundary, 0).single().unwrap();
            prop_assert_eq!(dt.hour(), 23);
            prop_assert_eq!(dt.minute(), 59);
            prop_assert_eq!(dt.second(), 59);
        }
    }
}
