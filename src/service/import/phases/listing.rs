use async_trait::async_trait;

use crate::domain::models::PhaseName;
use crate::error::Result;
use crate::service::import::phase::{import_listing, Phase, PhaseContext, PhaseReport};
use crate::service::scraper::{ClubsScraper, PlayersScraper, TournamentsScraper};

pub struct PlayersPhase;

#[async_trait]
impl Phase for PlayersPhase {
    fn phase_name(&self) -> PhaseName {
        PhaseName::Players
    }

    async fn execute(&self, ctx: &PhaseContext<'_>) -> Result<PhaseReport> {
        let scraper = PlayersScraper::new(
            ctx.pagination.clone(),
            &ctx.config.base_url,
            ctx.config.listing_page_cap(ctx.mode),
        );
        import_listing(self, ctx, &scraper).await
    }
}

pub struct ClubsPhase;

#[async_trait]
impl Phase for ClubsPhase {
    fn phase_name(&self) -> PhaseName {
        PhaseName::Clubs
    }

    async fn execute(&self, ctx: &PhaseContext<'_>) -> Result<PhaseReport> {
        let scraper = ClubsScraper::new(
            ctx.pagination.clone(),
            &ctx.config.base_url,
            ctx.config.listing_page_cap(ctx.mode),
        );
        import_listing(self, ctx, &scraper).await
    }
}

pub struct TournamentsPhase;

#[async_trait]
impl Phase for TournamentsPhase {
    fn phase_name(&self) -> PhaseName {
        PhaseName::Tournaments
    }

    async fn execute(&self, ctx: &PhaseContext<'_>) -> Result<PhaseReport> {
        let scraper = TournamentsScraper::new(
            ctx.pagination.clone(),
            &ctx.config.base_url,
            ctx.config.listing_page_cap(ctx.mode),
        );
        import_listing(self, ctx, &scraper).await
    }
}
