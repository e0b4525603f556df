//! Fixed-cadence INCREMENTAL imports.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::domain::models::SyncType;
use crate::error::ImportError;
use crate::service::import::ImportOrchestrator;

/// Runs `run(INCREMENTAL)` every `interval` (first run immediately) until
/// `shutdown` fires. A tick that finds a run already active is skipped;
/// ticks missed while a run was in progress are not made up.
///
/// On shutdown the in-flight run is cancelled at its next batch boundary
/// and awaited.
pub async fn run_scheduled(orchestrator: Arc<ImportOrchestrator>, interval: Duration, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(interval_secs = interval.as_secs(), "[SCHEDULER] Started");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        match orchestrator.run_with_shutdown(SyncType::Incremental, &shutdown).await {
            Ok(outcome) => tracing::info!(
                sync_log_id = outcome.sync_log_id,
                status = %outcome.status,
                records = outcome.records_processed,
                "[SCHEDULER] Scheduled import finished"
            ),
            Err(ImportError::AlreadyRunning) => {
                tracing::info!("[SCHEDULER] Import already running, skipping this tick")
            }
            Err(e) => tracing::error!("[SCHEDULER] Scheduled import failed: {}", e),
        }
    }

    tracing::info!("[SCHEDULER] Stopped");
}
