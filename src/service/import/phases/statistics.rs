//! Derives per-role statistics from stored participations. No network.

use async_trait::async_trait;

use crate::domain::models::PhaseName;
use crate::domain::stats::aggregate_role_stats;
use crate::error::{Result, StorageResultExt};
use crate::service::import::phase::{into_batches, persist_records, BatchProgress, Phase, PhaseContext, PhaseReport};

pub struct StatisticsPhase;

#[async_trait]
impl Phase for StatisticsPhase {
    fn phase_name(&self) -> PhaseName {
        PhaseName::Statistics
    }

    async fn execute(&self, ctx: &PhaseContext<'_>) -> Result<PhaseReport> {
        let mut report = PhaseReport::new(self.phase_name());
        let mut progress = BatchProgress::resume(self.phase_name(), ctx.checkpoint);
        report.resumed = progress.is_resumed();

        let orphaned = ctx.store.role_stats.delete_without_participations().await.storage()?;
        if orphaned > 0 {
            tracing::info!(orphaned, "[PHASE] Removed role stats of players without games");
        }

        let pending: Vec<String> = ctx
            .store
            .games
            .players_with_participations()
            .await
            .storage()?
            .into_iter()
            .filter(|id| !progress.is_processed(id))
            .collect();

        let batches = into_batches(pending, ctx.config.batch_size);
        let total = batches.len();

        for (index, player_ids) in batches.into_iter().enumerate() {
            ctx.ensure_not_cancelled()?;

            let rows = ctx
                .store
                .games
                .participations_for_players(&player_ids)
                .await
                .storage()?;
            let stats = aggregate_role_stats(&rows);
            tracing::debug!(players = player_ids.len(), groups = stats.len(), "[PHASE] Role stats aggregated");

            // Seats can change on re-scrape; groups that vanished must not linger.
            ctx.store
                .role_stats
                .delete_stale(&player_ids, &stats)
                .await
                .storage()?;

            persist_records(ctx, &mut report, stats).await?;
            progress.commit(self, ctx, index, total, player_ids).await?;
        }

        progress.complete(ctx).await?;
        Ok(report)
    }
}
