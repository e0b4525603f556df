//! SQLite repositories for imported entities and run bookkeeping.
//!
//! Entity writes are upserts keyed by the source's identifier; each reports
//! whether the row already existed so callers can count re-imports.

use chrono::Utc;
use sqlx::{Sqlite, Transaction};

mod checkpoint_repository;
mod club_repository;
mod game_repository;
mod player_repository;
mod result_repository;
mod role_stats_repository;
mod sync_repository;
mod tournament_repository;
mod year_stats_repository;

pub use checkpoint_repository::CheckpointRepository;
pub use club_repository::ClubRepository;
pub use game_repository::GameRepository;
pub use player_repository::PlayerRepository;
pub use result_repository::ResultRepository;
pub use role_stats_repository::RoleStatsRepository;
pub use sync_repository::SyncRepository;
pub use tournament_repository::TournamentRepository;
pub use year_stats_repository::YearStatsRepository;

/// Whether an upsert created the row or refreshed an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

impl UpsertOutcome {
    fn from_existed(existed: bool) -> Self {
        if existed {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Inserted
        }
    }
}

/// `SELECT COUNT(*)` with text binds, inside an open transaction.
async fn exists_in_tx(
    tx: &mut Transaction<'_, Sqlite>,
    sql: &str,
    binds: &[&str],
) -> Result<bool, sqlx::Error> {
    let mut query = sqlx::query_scalar::<_, i64>(sql);
    for b in binds {
        query = query.bind(*b);
    }
    Ok(query.fetch_one(&mut **tx).await? > 0)
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

fn parse_datetime(s: &str) -> anyhow::Result<chrono::DateTime<Utc>> {
    let dt = chrono::DateTime::parse_from_rfc3339(s)
        .map_err(|e| anyhow::anyhow!("Bad stored timestamp '{}': {}", s, e))?;
    Ok(dt.with_timezone(&Utc))
}

/// Store of every repository over one pool, handed to phases.
#[derive(Clone)]
pub struct ImportStore {
    pub players: PlayerRepository,
    pub clubs: ClubRepository,
    pub tournaments: TournamentRepository,
    pub games: GameRepository,
    pub results: ResultRepository,
    pub year_stats: YearStatsRepository,
    pub role_stats: RoleStatsRepository,
    pub sync: SyncRepository,
    pub checkpoints: CheckpointRepository,
}

impl ImportStore {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self {
            players: PlayerRepository::new(pool.clone()),
            clubs: ClubRepository::new(pool.clone()),
            tournaments: TournamentRepository::new(pool.clone()),
            games: GameRepository::new(pool.clone()),
            results: ResultRepository::new(pool.clone()),
            year_stats: YearStatsRepository::new(pool.clone()),
            role_stats: RoleStatsRepository::new(pool.clone()),
            sync: SyncRepository::new(pool.clone()),
            checkpoints: CheckpointRepository::new(pool),
        }
    }
}
