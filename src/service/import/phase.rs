//! The phase contract and the batch/checkpoint machinery every phase shares.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;

use super::persist::Persist;
use crate::config::ImportConfig;
use crate::domain::models::{Checkpoint, PhaseName, SyncErrorEntry, SyncType};
use crate::domain::raw::ExternalId;
use crate::domain::Validate;
use crate::error::{ImportError, Result, StorageResultExt};
use crate::repository::{ImportStore, UpsertOutcome};
use crate::service::scraper::{PaginationHandler, Parsed, Scraper};
use crate::service::validation_tracker::ValidationReporter;

// ============================================================================
// CONTRACT
// ============================================================================

/// Everything a phase may touch during one run.
pub struct PhaseContext<'a> {
    pub mode: SyncType,
    pub config: &'a ImportConfig,
    pub store: &'a ImportStore,
    pub pagination: &'a PaginationHandler,
    pub reporter: &'a dyn ValidationReporter,
    pub cancel: &'a CancellationToken,
    /// The stored checkpoint, whichever phase wrote it.
    pub checkpoint: Option<&'a Checkpoint>,
}

impl PhaseContext<'_> {
    pub fn ensure_not_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(ImportError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PhaseReport {
    pub phase: PhaseName,
    pub inserted: u64,
    pub updated: u64,
    pub invalid: u64,
    pub duplicates: u64,
    /// Identifiers whose pages could not be loaded; the run carries on.
    pub failures: Vec<SyncErrorEntry>,
    pub resumed: bool,
}

impl PhaseReport {
    pub fn new(phase: PhaseName) -> Self {
        Self {
            phase,
            inserted: 0,
            updated: 0,
            invalid: 0,
            duplicates: 0,
            failures: Vec::new(),
            resumed: false,
        }
    }

    /// Rows written (inserted or refreshed).
    pub fn records_processed(&self) -> u64 {
        self.inserted + self.updated
    }
}

#[async_trait]
pub trait Phase: Send + Sync {
    fn phase_name(&self) -> PhaseName;

    async fn execute(&self, ctx: &PhaseContext<'_>) -> Result<PhaseReport>;

    fn create_checkpoint(
        &self,
        batch_index: usize,
        total_batches: usize,
        processed_ids: Vec<String>,
    ) -> Checkpoint {
        Checkpoint::new(
            self.phase_name(),
            batch_index as i64,
            total_batches as i64,
            processed_ids,
        )
    }
}

// ============================================================================
// BATCH PROGRESS
// ============================================================================

/// Tracks which identifiers a phase has durably handled, seeded from the
/// checkpoint when it belongs to this phase.
pub struct BatchProgress {
    phase: PhaseName,
    processed: Vec<String>,
    processed_set: HashSet<String>,
    resumed: bool,
}

impl BatchProgress {
    pub fn resume(phase: PhaseName, checkpoint: Option<&Checkpoint>) -> Self {
        let processed: Vec<String> = checkpoint
            .filter(|c| c.phase == phase)
            .map(|c| c.processed_ids.clone())
            .unwrap_or_default();
        let resumed = checkpoint.is_some_and(|c| c.phase == phase);

        if resumed {
            tracing::info!(
                phase = %phase,
                processed = processed.len(),
                "[PHASE] Resuming from checkpoint"
            );
        }

        Self {
            phase,
            processed_set: processed.iter().cloned().collect(),
            processed,
            resumed,
        }
    }

    pub fn is_resumed(&self) -> bool {
        self.resumed
    }

    pub fn is_processed(&self, id: &str) -> bool {
        self.processed_set.contains(id)
    }

    pub fn processed_ids(&self) -> &[String] {
        &self.processed
    }

    /// Record a durably stored batch, then persist the checkpoint.
    pub async fn commit(
        &mut self,
        phase: &dyn Phase,
        ctx: &PhaseContext<'_>,
        batch_index: usize,
        total_batches: usize,
        ids: Vec<String>,
    ) -> Result<()> {
        for id in ids {
            if self.processed_set.insert(id.clone()) {
                self.processed.push(id);
            }
        }

        let checkpoint = phase.create_checkpoint(batch_index, total_batches, self.processed.clone());
        ctx.store.checkpoints.save(&checkpoint).await.storage()?;
        tracing::debug!(phase = %self.phase, "[PHASE] {}", checkpoint.message);
        Ok(())
    }

    /// The phase finished; its checkpoint is no longer needed.
    pub async fn complete(&self, ctx: &PhaseContext<'_>) -> Result<()> {
        ctx.store.checkpoints.clear().await.storage()
    }
}

pub fn into_batches<T>(items: Vec<T>, batch_size: usize) -> Vec<Vec<T>> {
    let batch_size = batch_size.max(1);
    let mut batches = Vec::with_capacity(items.len().div_ceil(batch_size));
    let mut current = Vec::with_capacity(batch_size);
    for item in items {
        current.push(item);
        if current.len() == batch_size {
            batches.push(std::mem::replace(&mut current, Vec::with_capacity(batch_size)));
        }
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

// ============================================================================
// RECORD PIPELINE
// ============================================================================

/// Drops rows already handled in this phase (this run or the resumed one).
struct RecordFilter<'p> {
    seen: HashSet<String>,
    progress: &'p BatchProgress,
}

impl<'p> RecordFilter<'p> {
    fn new(progress: &'p BatchProgress) -> Self {
        Self {
            seen: HashSet::new(),
            progress,
        }
    }

    /// Splits parsed rows into fresh records, reporting the rest.
    fn admit<T: Persist>(
        &mut self,
        ctx: &PhaseContext<'_>,
        report: &mut PhaseReport,
        rows: Vec<Parsed<T>>,
    ) -> Vec<T> {
        let mut fresh = Vec::with_capacity(rows.len());
        for row in rows {
            match row {
                Err(e) => {
                    ctx.reporter
                        .record_invalid(e.entity, &e.message, e.identifier.as_deref());
                    report.invalid += 1;
                }
                Ok(record) => {
                    let id = record.external_id();
                    if self.progress.is_processed(&id) || !self.seen.insert(id) {
                        ctx.reporter.record_duplicate_skipped(T::ENTITY);
                        report.duplicates += 1;
                    } else {
                        fresh.push(record);
                    }
                }
            }
        }
        fresh
    }
}

/// Validate then upsert one batch. A record whose natural key was already
/// stored is refreshed but counted only as a duplicate.
pub async fn persist_records<T: Persist>(
    ctx: &PhaseContext<'_>,
    report: &mut PhaseReport,
    records: Vec<T>,
) -> Result<()> {
    let mut valid = Vec::with_capacity(records.len());
    for record in records {
        match record.validate() {
            Ok(()) => valid.push(record),
            Err(message) => {
                let id = record.external_id();
                tracing::debug!(entity = %T::ENTITY, id = %id, "Invalid record: {}", message);
                ctx.reporter.record_invalid(T::ENTITY, &message, Some(id.as_str()));
                report.invalid += 1;
            }
        }
    }

    if valid.is_empty() {
        return Ok(());
    }

    let outcomes = T::upsert_all(ctx.store, &valid).await.storage()?;
    for outcome in outcomes {
        match outcome {
            UpsertOutcome::Inserted => {
                report.inserted += 1;
                ctx.reporter.record_valid(T::ENTITY);
            }
            UpsertOutcome::Updated => {
                report.updated += 1;
                report.duplicates += 1;
                ctx.reporter.record_duplicate_skipped(T::ENTITY);
            }
        }
    }
    Ok(())
}

/// Listing phases: the whole listing is scraped first, then stored in
/// checkpointed batches.
pub async fn import_listing<S>(phase: &dyn Phase, ctx: &PhaseContext<'_>, scraper: &S) -> Result<PhaseReport>
where
    S: Scraper,
    S::Item: Persist,
{
    let mut report = PhaseReport::new(phase.phase_name());
    let mut progress = BatchProgress::resume(phase.phase_name(), ctx.checkpoint);
    report.resumed = progress.is_resumed();

    let rows = scraper.scrape(None).await?;
    let fresh = RecordFilter::new(&progress).admit(ctx, &mut report, rows);

    let batches = into_batches(fresh, ctx.config.batch_size);
    let total = batches.len();
    tracing::info!(phase = %phase.phase_name(), batches = total, "[PHASE] Listing scraped");

    for (index, batch) in batches.into_iter().enumerate() {
        ctx.ensure_not_cancelled()?;
        let ids: Vec<String> = batch.iter().map(ExternalId::external_id).collect();
        persist_records(ctx, &mut report, batch).await?;
        progress.commit(phase, ctx, index, total, ids).await?;
    }

    progress.complete(ctx).await?;
    Ok(report)
}

/// Detail phases: one scrape per identifier (tournament, player), batched by
/// identifier. A non-fatal failure for one identifier goes to the report and
/// leaves it unprocessed so a resumed run retries it.
pub async fn import_per_identifier<S>(
    phase: &dyn Phase,
    ctx: &PhaseContext<'_>,
    identifiers: Vec<String>,
    scraper: &S,
) -> Result<PhaseReport>
where
    S: Scraper,
    S::Item: Persist,
{
    let phase_name = phase.phase_name();
    let mut report = PhaseReport::new(phase_name);
    let mut progress = BatchProgress::resume(phase_name, ctx.checkpoint);
    report.resumed = progress.is_resumed();

    let pending: Vec<String> = identifiers
        .into_iter()
        .filter(|id| !progress.is_processed(id))
        .collect();
    let batches = into_batches(pending, ctx.config.batch_size);
    let total = batches.len();
    tracing::info!(phase = %phase_name, batches = total, "[PHASE] Identifiers planned");

    let mut seen: HashSet<String> = HashSet::new();

    for (index, batch) in batches.into_iter().enumerate() {
        ctx.ensure_not_cancelled()?;

        let mut records = Vec::new();
        let mut done = Vec::with_capacity(batch.len());

        for id in batch {
            match scraper.scrape(Some(id.as_str())).await {
                Ok(rows) => {
                    let mut filter = RecordFilter {
                        seen: std::mem::take(&mut seen),
                        progress: &progress,
                    };
                    records.extend(filter.admit(ctx, &mut report, rows));
                    seen = filter.seen;
                    done.push(id);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!(phase = %phase_name, identifier = %id, error = %e, "[PHASE] Identifier failed");
                    report.failures.push(SyncErrorEntry {
                        phase: Some(phase_name),
                        identifier: Some(id),
                        message: e.to_string(),
                    });
                }
            }
        }

        persist_records(ctx, &mut report, records).await?;
        progress.commit(phase, ctx, index, total, done).await?;
    }

    progress.complete(ctx).await?;
    Ok(report)
}
