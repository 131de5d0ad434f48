//! Object-store health check.

use anyhow::Result;
use opendal::Operator;

/// Verifies the archive bucket is reachable by listing the root; the
/// lightest operation that still exercises auth and connectivity.
pub async fn check_health(op: &Operator) -> Result<()> {
    op.list("/")
        .await
        .map(|_| ())
        .map_err(|e| anyhow::anyhow!("storage health check failed: {e}"))
}

pub async fn is_healthy(op: &Operator) -> bool {
    check_health(op).await.is_ok()
}
