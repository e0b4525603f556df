//! Maps each storable shape to its repository.

use async_trait::async_trait;

use crate::domain::raw::{ClubRaw, ExternalId, GameRaw, PlayerRaw, PlayerTournamentRaw, PlayerYearStatsRaw, TournamentRaw};
use crate::domain::stats::PlayerRoleStats;
use crate::domain::Validate;
use crate::repository::{ImportStore, UpsertOutcome};

#[async_trait]
pub trait Persist: Validate + ExternalId + Send + Sync + Sized {
    async fn upsert_all(store: &ImportStore, records: &[Self]) -> anyhow::Result<Vec<UpsertOutcome>>;
}

#[async_trait]
impl Persist for PlayerRaw {
    async fn upsert_all(store: &ImportStore, records: &[Self]) -> anyhow::Result<Vec<UpsertOutcome>> {
        store.players.upsert_batch(records).await
    }
}

#[async_trait]
impl Persist for ClubRaw {
    async fn upsert_all(store: &ImportStore, records: &[Self]) -> anyhow::Result<Vec<UpsertOutcome>> {
        store.clubs.upsert_batch(records).await
    }
}

#[async_trait]
impl Persist for TournamentRaw {
    async fn upsert_all(store: &ImportStore, records: &[Self]) -> anyhow::Result<Vec<UpsertOutcome>> {
        store.tournaments.upsert_batch(records).await
    }
}

#[async_trait]
impl Persist for GameRaw {
    async fn upsert_all(store: &ImportStore, records: &[Self]) -> anyhow::Result<Vec<UpsertOutcome>> {
        store.games.upsert_batch(records).await
    }
}

#[async_trait]
impl Persist for PlayerTournamentRaw {
    async fn upsert_all(store: &ImportStore, records: &[Self]) -> anyhow::Result<Vec<UpsertOutcome>> {
        store.results.upsert_batch(records).await
    }
}

#[async_trait]
impl Persist for PlayerYearStatsRaw {
    async fn upsert_all(store: &ImportStore, records: &[Self]) -> anyhow::Result<Vec<UpsertOutcome>> {
        store.year_stats.upsert_batch(records).await
    }
}

#[async_trait]
impl Persist for PlayerRoleStats {
    async fn upsert_all(store: &ImportStore, records: &[Self]) -> anyhow::Result<Vec<UpsertOutcome>> {
        store.role_stats.upsert_batch(records).await
    }
}
