//! Periodic removal of expired slot locks.
//!
//! Storage hygiene only: every read already treats expired locks as absent,
//! so correctness never depends on this job running.

use std::sync::Arc;
use std::time::Duration;

use slotlock_core::lock_store::LockStore;
use tokio_util::sync::CancellationToken;

/// Run the sweeper loop until `cancel` is triggered.
pub async fn run(store: Arc<dyn LockStore>, interval: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = interval.as_secs(), "Lock sweeper started");

    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately; skip it so startup is quiet.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Lock sweeper stopping");
                break;
            }
            _ = ticker.tick() => {
                match store.purge_expired().await {
                    Ok(purged) if purged > 0 => {
                        tracing::info!(purged, "Lock sweeper: purged expired locks");
                    }
                    Ok(_) => tracing::debug!("Lock sweeper: nothing to purge"),
                    Err(e) => tracing::error!(error = %e, "Lock sweeper: purge failed"),
                }
            }
        }
    }
}
