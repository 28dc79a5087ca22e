use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::engine::Engine;
use crate::observability::WAL_COMPACTIONS_TOTAL;

const CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Background task that rewrites the WAL once enough appends pile up.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut interval = tokio::time::interval(CHECK_INTERVAL);
    loop {
        interval.tick().await;
        compact_if_due(&engine, threshold).await;
    }
}

/// Returns the number of records written, or `None` when nothing ran.
async fn compact_if_due(engine: &Engine, threshold: u64) -> Option<usize> {
    let appends = engine.wal_appends_since_compact().await;
    if appends < threshold {
        return None;
    }
    match engine.compact_wal().await {
        Ok(records) => {
            info!("compacted WAL: {appends} appends folded into {records} records");
            metrics::counter!(WAL_COMPACTIONS_TOTAL, "status" => "ok").increment(1);
            Some(records)
        }
        Err(e) => {
            tracing::error!("WAL compaction failed: {e}");
            metrics::counter!(WAL_COMPACTIONS_TOTAL, "status" => "error").increment(1);
            None
        }
    }
}
