//! Graceful shutdown: SIGTERM/SIGINT race against the controller's sleep
//! phases. In-flight subprocesses are allowed to finish naturally — a
//! half-written archive or partial download is itself safely recoverable
//! on the next cycle — and the process exits only between cycles.

use tokio_util::sync::CancellationToken;

pub fn spawn_listener() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("received SIGINT, will stop after the current cycle");
            }
            _ = sigterm.recv() => {
                tracing::info!("received SIGTERM, will stop after the current cycle");
            }
        }
        child.cancel();
    });
    token
}

/// Sleeps for `duration`, returning early if `token` is cancelled.
/// Returns `true` if the sleep completed normally, `false` if interrupted.
pub async fn sleep_or_cancel(duration: std::time::Duration, token: &CancellationToken) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => true,
        _ = token.cancelled() => false,
    }
}
