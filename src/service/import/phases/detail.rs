//! Phases that scrape one detail page (or page set) per stored identifier.

use async_trait::async_trait;

use crate::domain::models::{PhaseName, SyncType};
use crate::error::{Result, StorageResultExt};
use crate::service::import::phase::{import_per_identifier, Phase, PhaseContext, PhaseReport};
use crate::service::scraper::{
    TournamentGamesScraper, TournamentResultsScraper, YearGapPolicy, YearStatsScraper,
};

/// Games of each tournament. INCREMENTAL only revisits tournaments that are
/// still running or have no games stored.
pub struct GamesPhase;

#[async_trait]
impl Phase for GamesPhase {
    fn phase_name(&self) -> PhaseName {
        PhaseName::Games
    }

    async fn execute(&self, ctx: &PhaseContext<'_>) -> Result<PhaseReport> {
        let ids = match ctx.mode {
            SyncType::Full => ctx.store.tournaments.list_ids().await,
            SyncType::Incremental => ctx.store.tournaments.list_ids_needing_games().await,
        }
        .storage()?;

        let scraper = TournamentGamesScraper::new(ctx.pagination.clone(), &ctx.config.base_url);
        import_per_identifier(self, ctx, ids, &scraper).await
    }
}

pub struct TournamentHistoryPhase;

#[async_trait]
impl Phase for TournamentHistoryPhase {
    fn phase_name(&self) -> PhaseName {
        PhaseName::PlayerTournamentHistory
    }

    async fn execute(&self, ctx: &PhaseContext<'_>) -> Result<PhaseReport> {
        let ids = match ctx.mode {
            SyncType::Full => ctx.store.tournaments.list_ids().await,
            SyncType::Incremental => ctx.store.tournaments.list_ids_needing_results().await,
        }
        .storage()?;

        let scraper = TournamentResultsScraper::new(ctx.pagination.clone(), &ctx.config.base_url);
        import_per_identifier(self, ctx, ids, &scraper).await
    }
}

pub struct YearStatsPhase;

impl YearStatsPhase {
    fn policy(ctx: &PhaseContext<'_>) -> YearGapPolicy {
        match ctx.mode {
            SyncType::Full => {
                YearGapPolicy::full_history(ctx.config.year_stats_min_year, ctx.config.year_gap_limit)
            }
            SyncType::Incremental => YearGapPolicy::current_year_only(),
        }
    }
}

#[async_trait]
impl Phase for YearStatsPhase {
    fn phase_name(&self) -> PhaseName {
        PhaseName::PlayerYearStats
    }

    async fn execute(&self, ctx: &PhaseContext<'_>) -> Result<PhaseReport> {
        let ids = ctx.store.players.list_ids().await.storage()?;
        let scraper = YearStatsScraper::new(ctx.pagination.clone(), &ctx.config.base_url, Self::policy(ctx));
        import_per_identifier(self, ctx, ids, &scraper).await
    }
}
