//! Runs the phases in order and keeps run bookkeeping (status row, sync log,
//! run lock) consistent whatever way the run ends.

use chrono::Utc;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use super::phase::{Phase, PhaseContext, PhaseReport};
use super::phases::default_phases;
use crate::config::ImportConfig;
use crate::domain::models::{
    Checkpoint, CheckpointInfo, EntityType, PhaseName, RunStatus, SyncErrorEntry, SyncLog, SyncStatus, SyncType,
};
use crate::error::{ImportError, Result, StorageResultExt};
use crate::repository::ImportStore;
use crate::service::fetcher::PageFetcher;
use crate::service::rate_limiter::RateLimiter;
use crate::service::retry::RetryManager;
use crate::service::scraper::PaginationHandler;
use crate::service::session::PageSession;
use crate::service::validation_tracker::{
    ValidationMetrics, ValidationMetricsTracker, ValidationReporter, ValidationSummary,
};

const INTERRUPTED_MESSAGE: &str = "interrupted: process stopped before the run finished";

/// What a finished (completed or cancelled) run reports back.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub sync_log_id: i64,
    pub sync_type: SyncType,
    pub status: SyncStatus,
    pub records_processed: i64,
    pub summary: ValidationSummary,
    pub phases: Vec<PhaseReport>,
    pub failures: Vec<SyncErrorEntry>,
}

/// Per-run inputs threaded into the phase loop.
struct RunScope<'a> {
    mode: SyncType,
    sync_log_id: i64,
    cancel: &'a CancellationToken,
    checkpoint: Option<&'a Checkpoint>,
}

/// Clears the in-process running flag however `run` exits.
struct RunningGuard<'a>(&'a AtomicBool);

impl<'a> RunningGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct ImportOrchestrator {
    store: ImportStore,
    config: ImportConfig,
    session: Arc<dyn PageSession>,
    rate_limiter: Arc<RateLimiter>,
    tracker: Mutex<ValidationMetricsTracker>,
    phases: Vec<Box<dyn Phase>>,
    running: AtomicBool,
    cancel: Mutex<CancellationToken>,
    /// Identity written into the cross-process run lock.
    holder: String,
}

impl ImportOrchestrator {
    pub fn new(store: ImportStore, config: ImportConfig, session: Arc<dyn PageSession>) -> Self {
        let config = config.normalized();
        Self {
            store,
            rate_limiter: Arc::new(RateLimiter::from_millis(config.rate_limit_ms)),
            tracker: Mutex::new(ValidationMetricsTracker::new(
                config.validation_threshold,
                config.max_stored_errors,
            )),
            config,
            session,
            phases: default_phases(),
            running: AtomicBool::new(false),
            cancel: Mutex::new(CancellationToken::new()),
            holder: format!("import-{}", uuid::Uuid::new_v4()),
        }
    }

    /// Replace the phase list. Phases still run in the order given.
    pub fn with_phases(mut self, phases: Vec<Box<dyn Phase>>) -> Self {
        self.phases = phases;
        self
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    // ========================================================================
    // RUN
    // ========================================================================

    /// Execute every phase for `mode`.
    ///
    /// Completed and cancelled runs return `Ok`; a fatal error finalizes the
    /// sync log as FAILED and is then returned. A second call while a run is
    /// active (here or in another process) fails with `AlreadyRunning`.
    pub async fn run(&self, mode: SyncType) -> Result<RunOutcome> {
        self.run_with_shutdown(mode, &CancellationToken::new()).await
    }

    /// Like [`run`](Self::run), but the run is also cancelled when `shutdown`
    /// fires, including when it already fired before the call.
    pub async fn run_with_shutdown(&self, mode: SyncType, shutdown: &CancellationToken) -> Result<RunOutcome> {
        let _running = RunningGuard::acquire(&self.running).ok_or(ImportError::AlreadyRunning)?;
        // Installed before the first await so a cancel during startup is kept.
        let cancel = shutdown.child_token();
        *self.cancel_slot() = cancel.clone();

        let lease = chrono::Duration::from_std(self.config.lock_lease)
            .map_err(|e| ImportError::Other(anyhow::anyhow!("invalid lock lease: {e}")))?;
        if !self.store.sync.try_acquire_lock(&self.holder, lease).await.storage()? {
            tracing::warn!("[ORCHESTRATOR] Run lock held by another process");
            return Err(ImportError::AlreadyRunning);
        }

        let result = self.run_locked(mode, cancel).await;

        if let Err(e) = self.store.sync.release_lock(&self.holder).await {
            tracing::error!("[ORCHESTRATOR] Failed to release run lock: {:#}", e);
        }
        result
    }

    async fn run_locked(&self, mode: SyncType, cancel: CancellationToken) -> Result<RunOutcome> {
        let recovered = self.store.sync.fail_interrupted_logs(INTERRUPTED_MESSAGE).await.storage()?;
        if recovered > 0 {
            tracing::warn!(recovered, "[ORCHESTRATOR] Marked interrupted runs as FAILED");
        }

        self.tracker().reset();
        self.rate_limiter.reset().await;

        let checkpoint = self.store.checkpoints.load().await.storage()?;
        let sync_log_id = self.store.sync.create_log(mode, Utc::now()).await.storage()?;

        let mut status = self.store.sync.get_status().await.storage()?;
        status.is_running = true;
        status.current_operation = Some(format!("Starting {} import", mode));
        status.last_sync_type = Some(mode);
        status.last_error = None;
        status.total_records_processed = 0;
        self.store.sync.save_status(&status).await.storage()?;

        tracing::info!(
            mode = %mode,
            sync_log_id,
            resume = checkpoint.as_ref().map(|c| c.phase.as_str()),
            "[ORCHESTRATOR] Run started"
        );

        let mut reports: Vec<PhaseReport> = Vec::new();
        let mut current_phase: Option<PhaseName> = None;
        let result = self
            .execute_phases(
                RunScope {
                    mode,
                    sync_log_id,
                    cancel: &cancel,
                    checkpoint: checkpoint.as_ref(),
                },
                &mut reports,
                &mut current_phase,
                &mut status,
            )
            .await;

        let records_processed: i64 = reports.iter().map(|r| r.records_processed() as i64).sum();
        let mut failures: Vec<SyncErrorEntry> = reports.iter().flat_map(|r| r.failures.iter().cloned()).collect();

        let (final_status, error) = match result {
            Ok(()) => (SyncStatus::Completed, None),
            Err(ImportError::Cancelled) => (SyncStatus::Cancelled, None),
            Err(e) => {
                failures.push(SyncErrorEntry {
                    phase: current_phase,
                    identifier: None,
                    message: e.to_string(),
                });
                (SyncStatus::Failed, Some(e))
            }
        };

        self.finalize(sync_log_id, final_status, records_processed, &failures, &mut status, error.as_ref())
            .await;

        let summary = self.get_validation_summary();
        match final_status {
            SyncStatus::Completed => {
                tracing::info!(
                    records_processed,
                    validation_rate = summary.validation_rate,
                    "[ORCHESTRATOR] Run completed"
                );
                if !summary.meets_threshold {
                    tracing::warn!(
                        validation_rate = summary.validation_rate,
                        threshold = self.config.validation_threshold,
                        "[ORCHESTRATOR] Validation rate below threshold"
                    );
                }
            }
            SyncStatus::Cancelled => tracing::info!(records_processed, "[ORCHESTRATOR] Run cancelled"),
            _ => {}
        }

        if let Some(e) = error {
            tracing::error!(phase = ?current_phase, "[ORCHESTRATOR] Run failed: {}", e);
            return Err(e);
        }

        Ok(RunOutcome {
            sync_log_id,
            sync_type: mode,
            status: final_status,
            records_processed,
            summary,
            phases: reports,
            failures,
        })
    }

    async fn execute_phases(
        &self,
        scope: RunScope<'_>,
        reports: &mut Vec<PhaseReport>,
        current_phase: &mut Option<PhaseName>,
        status: &mut RunStatus,
    ) -> Result<()> {
        let pagination = PaginationHandler::new(PageFetcher::new(
            self.session.clone(),
            self.rate_limiter.clone(),
            RetryManager::new(self.config.retry.clone()),
        ));

        let RunScope {
            mode,
            sync_log_id,
            cancel,
            checkpoint,
        } = scope;

        // Phases before the checkpoint's phase finished in the interrupted run.
        let start_ordinal = checkpoint.map_or(0, |c| c.phase.ordinal());
        let total = self.phases.len();

        let ctx = PhaseContext {
            mode,
            config: &self.config,
            store: &self.store,
            pagination: &pagination,
            reporter: self,
            cancel,
            checkpoint,
        };

        for (position, phase) in self.phases.iter().enumerate() {
            let name = phase.phase_name();
            if name.ordinal() < start_ordinal {
                tracing::info!(phase = %name, "[PHASE] Skipped, completed before resume");
                continue;
            }

            ctx.ensure_not_cancelled()?;
            *current_phase = Some(name);

            status.current_operation = Some(format!("{} ({}/{})", name, position + 1, total));
            self.store.sync.save_status(status).await.storage()?;
            tracing::info!(phase = %name, "[PHASE] Started");

            let report = phase.execute(&ctx).await?;

            tracing::info!(
                phase = %name,
                inserted = report.inserted,
                updated = report.updated,
                invalid = report.invalid,
                duplicates = report.duplicates,
                failures = report.failures.len(),
                "[PHASE] Finished"
            );

            self.store
                .sync
                .append_errors(sync_log_id, &report.failures)
                .await
                .storage()?;
            status.total_records_processed += report.records_processed() as i64;
            self.store.sync.save_status(status).await.storage()?;
            reports.push(report);
        }

        *current_phase = None;
        Ok(())
    }

    /// Terminal bookkeeping. Storage faults here are logged, never raised, so
    /// the original outcome still reaches the caller.
    async fn finalize(
        &self,
        sync_log_id: i64,
        final_status: SyncStatus,
        records_processed: i64,
        failures: &[SyncErrorEntry],
        status: &mut RunStatus,
        error: Option<&ImportError>,
    ) {
        match self
            .store
            .sync
            .finalize_log(sync_log_id, final_status, records_processed, failures)
            .await
        {
            Ok(true) => {}
            Ok(false) => tracing::warn!(sync_log_id, "[ORCHESTRATOR] Sync log was already terminal"),
            Err(e) => tracing::error!(sync_log_id, "[ORCHESTRATOR] Failed to finalize sync log: {:#}", e),
        }

        status.is_running = false;
        status.current_operation = None;
        status.total_records_processed = records_processed;
        status.last_error = error.map(ToString::to_string);
        if final_status == SyncStatus::Completed {
            status.last_sync_time = Some(Utc::now());
        }

        if let Err(e) = self.store.sync.save_status(status).await {
            tracing::error!("[ORCHESTRATOR] Failed to save run status: {:#}", e);
        }
    }

    /// Request cooperative cancellation of the active run. Takes effect at the
    /// next phase or batch boundary.
    pub fn cancel(&self) {
        tracing::info!("[ORCHESTRATOR] Cancellation requested");
        self.cancel_slot().cancel();
    }

    /// Close the page session. The orchestrator cannot fetch afterwards.
    pub async fn shutdown(&self) {
        self.cancel();
        self.session.close().await;
    }

    // ========================================================================
    // INSPECTION
    // ========================================================================

    pub fn get_validation_metrics(&self) -> ValidationMetrics {
        self.tracker().get_metrics()
    }

    pub fn get_validation_summary(&self) -> ValidationSummary {
        self.tracker().get_summary()
    }

    pub async fn status(&self) -> Result<RunStatus> {
        self.store.sync.get_status().await.storage()
    }

    pub async fn recent_sync_logs(&self, limit: i64) -> Result<Vec<SyncLog>> {
        self.store.sync.recent_logs(limit).await.storage()
    }

    pub async fn inspect_checkpoint(&self) -> Result<Option<CheckpointInfo>> {
        Ok(self.store.checkpoints.load().await.storage()?.map(|c| c.info()))
    }

    fn tracker(&self) -> MutexGuard<'_, ValidationMetricsTracker> {
        self.tracker.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn cancel_slot(&self) -> MutexGuard<'_, CancellationToken> {
        self.cancel.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ValidationReporter for ImportOrchestrator {
    fn record_valid(&self, entity: EntityType) {
        self.tracker().record_valid(entity);
    }

    fn record_invalid(&self, entity: EntityType, message: &str, context: Option<&str>) {
        self.tracker().record_invalid(entity, message, context);
    }

    fn record_duplicate_skipped(&self, entity: EntityType) {
        self.tracker().record_duplicate_skipped(entity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{fixtures, StaticSession};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct CountingPhase {
        name: PhaseName,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Phase for CountingPhase {
        fn phase_name(&self) -> PhaseName {
            self.name
        }

        async fn execute(&self, ctx: &PhaseContext<'_>) -> Result<PhaseReport> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            ctx.reporter.record_valid(EntityType::Player);
            let mut report = PhaseReport::new(self.name);
            report.inserted = 1;
            Ok(report)
        }
    }

    struct FailingPhase;

    #[async_trait]
    impl Phase for FailingPhase {
        fn phase_name(&self) -> PhaseName {
            PhaseName::Clubs
        }

        async fn execute(&self, _ctx: &PhaseContext<'_>) -> Result<PhaseReport> {
            Err(ImportError::SessionLost("blocked".into()))
        }
    }

    async fn orchestrator(phases: Vec<Box<dyn Phase>>) -> ImportOrchestrator {
        let store = ImportStore::new(fixtures::setup_test_db().await);
        let config = ImportConfig {
            rate_limit_ms: 0,
            ..Default::default()
        };
        ImportOrchestrator::new(store, config, Arc::new(StaticSession::new())).with_phases(phases)
    }

    #[tokio::test]
    async fn test_completed_run_bookkeeping() {
        let calls = Arc::new(AtomicUsize::new(0));
        let orch = orchestrator(vec![
            Box::new(CountingPhase { name: PhaseName::Players, calls: calls.clone() }),
            Box::new(CountingPhase { name: PhaseName::Clubs, calls: calls.clone() }),
        ])
        .await;

        let outcome = orch.run(SyncType::Full).await.unwrap();
        assert_eq!(outcome.status, SyncStatus::Completed);
        assert_eq!(outcome.records_processed, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(outcome.summary.meets_threshold);

        let status = orch.status().await.unwrap();
        assert!(!status.is_running);
        assert!(status.last_sync_time.is_some());
        assert_eq!(status.last_sync_type, Some(SyncType::Full));
        assert_eq!(status.total_records_processed, 2);

        let log = &orch.recent_sync_logs(1).await.unwrap()[0];
        assert_eq!(log.status, SyncStatus::Completed);
        assert_eq!(log.records_processed, 2);
        assert!(!orch.is_running());
    }

    #[tokio::test]
    async fn test_fatal_phase_error_finalizes_failed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let orch = orchestrator(vec![
            Box::new(FailingPhase),
            Box::new(CountingPhase { name: PhaseName::Tournaments, calls: calls.clone() }),
        ])
        .await;

        let err = orch.run(SyncType::Incremental).await.unwrap_err();
        assert!(matches!(err, ImportError::SessionLost(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let log = &orch.recent_sync_logs(1).await.unwrap()[0];
        assert_eq!(log.status, SyncStatus::Failed);
        assert_eq!(log.errors.len(), 1);
        assert_eq!(log.errors[0].phase, Some(PhaseName::Clubs));

        let status = orch.status().await.unwrap();
        assert!(!status.is_running);
        assert!(status.last_error.as_deref().unwrap_or_default().contains("blocked"));

        // The lock was released; the next run is not a conflict.
        let err = orch.run(SyncType::Incremental).await.unwrap_err();
        assert!(matches!(err, ImportError::SessionLost(_)));
    }

    #[tokio::test]
    async fn test_foreign_lock_is_a_conflict() {
        let orch = orchestrator(Vec::new()).await;
        orch.store
            .sync
            .try_acquire_lock("other-process", chrono::Duration::hours(1))
            .await
            .unwrap();

        let err = orch.run(SyncType::Full).await.unwrap_err();
        assert!(matches!(err, ImportError::AlreadyRunning));
        assert!(orch.recent_sync_logs(5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_during_lock_acquisition_is_kept() {
        let calls = Arc::new(AtomicUsize::new(0));
        let orch = orchestrator(vec![Box::new(CountingPhase {
            name: PhaseName::Players,
            calls: calls.clone(),
        })])
        .await;

        let run = orch.run(SyncType::Full);
        tokio::pin!(run);
        // One poll: the run is now parked on the lock query.
        tokio::select! {
            biased;
            _ = &mut run => panic!("run finished without yielding"),
            _ = std::future::ready(()) => {}
        }
        orch.cancel();

        let outcome = run.await.unwrap();
        assert_eq!(outcome.status, SyncStatus::Cancelled);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(orch.recent_sync_logs(1).await.unwrap()[0].status, SyncStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_shutdown_fired_before_run_cancels_it() {
        let calls = Arc::new(AtomicUsize::new(0));
        let orch = orchestrator(vec![Box::new(CountingPhase {
            name: PhaseName::Players,
            calls: calls.clone(),
        })])
        .await;
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let outcome = orch.run_with_shutdown(SyncType::Incremental, &shutdown).await.unwrap();
        assert_eq!(outcome.status, SyncStatus::Cancelled);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_resume_skips_phases_before_checkpoint() {
        let players = Arc::new(AtomicUsize::new(0));
        let games = Arc::new(AtomicUsize::new(0));
        let orch = orchestrator(vec![
            Box::new(CountingPhase { name: PhaseName::Players, calls: players.clone() }),
            Box::new(CountingPhase { name: PhaseName::Games, calls: games.clone() }),
        ])
        .await;

        orch.store
            .checkpoints
            .save(&Checkpoint::new(PhaseName::Games, 0, 3, vec!["1".into()]))
            .await
            .unwrap();
        let info = orch.inspect_checkpoint().await.unwrap().unwrap();
        assert_eq!(info.phase, PhaseName::Games);

        orch.run(SyncType::Full).await.unwrap();
        assert_eq!(players.load(Ordering::SeqCst), 0);
        assert_eq!(games.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_validation_reporting_goes_through_one_tracker() {
        let orch = orchestrator(Vec::new()).await;
        orch.record_valid(EntityType::Club);
        orch.record_invalid(EntityType::Club, "name missing", Some("3"));
        orch.record_duplicate_skipped(EntityType::Club);

        let metrics = orch.get_validation_metrics();
        assert_eq!(metrics.total_fetched, 2);
        assert_eq!(metrics.duplicates_skipped, 1);
        assert_eq!(orch.get_validation_summary().errors_by_entity[&EntityType::Club], 1);
    }
}
