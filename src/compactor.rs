use std::sync::Weak;
use std::time::Duration;

use tracing::info;

use crate::engine::Store;
use crate::observability::WAL_COMPACTIONS_TOTAL;

/// Background task that rewrites the WAL once `threshold` appends have
/// piled up since the last compaction. Exits once the store is dropped.
pub async fn run_compactor(store: Weak<Store>, threshold: u64, period: Duration) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        let Some(store) = store.upgrade() else {
            tracing::debug!("store dropped, compactor exiting");
            return;
        };
        compact_if_due(&store, threshold).await;
    }
}

/// Compact if the threshold is reached. Returns whether a compaction ran.
pub async fn compact_if_due(store: &Store, threshold: u64) -> bool {
    let appends = store.wal_appends_since_compact().await;
    if appends < threshold {
        return false;
    }
    match store.compact().await {
        Ok(()) => {
            metrics::counter!(WAL_COMPACTIONS_TOTAL).increment(1);
            info!("compacted WAL after {appends} appends");
            true
        }
        Err(e) => {
            tracing::warn!("compaction failed: {e}");
            false
        }
    }
}
