use anyhow::{Context, Result};
use sqlx::SqlitePool;

use super::{exists_in_tx, now_rfc3339, UpsertOutcome};
use crate::domain::raw::PlayerYearStatsRaw;

#[derive(Clone)]
pub struct YearStatsRepository {
    pool: SqlitePool,
}

impl YearStatsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn upsert_batch(&self, stats: &[PlayerYearStatsRaw]) -> Result<Vec<UpsertOutcome>> {
        let mut outcomes = Vec::with_capacity(stats.len());
        if stats.is_empty() {
            return Ok(outcomes);
        }

        let now = now_rfc3339();
        let mut tx = self.pool.begin().await?;

        for s in stats {
            let year = s.year.to_string();
            let existed = exists_in_tx(
                &mut tx,
                "SELECT COUNT(*) FROM player_year_stats WHERE player_gomafia_id = ? AND year = CAST(? AS INTEGER)",
                &[s.player_id.as_str(), year.as_str()],
            )
            .await?;

            sqlx::query(
                r#"
                INSERT INTO player_year_stats (
                    player_gomafia_id, year, total_games, don_games, mafia_games,
                    sheriff_games, civilian_games, elo_rating, extra_points, last_synced_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(player_gomafia_id, year) DO UPDATE SET
                    total_games = excluded.total_games,
                    don_games = excluded.don_games,
                    mafia_games = excluded.mafia_games,
                    sheriff_games = excluded.sheriff_games,
                    civilian_games = excluded.civilian_games,
                    elo_rating = excluded.elo_rating,
                    extra_points = excluded.extra_points,
                    last_synced_at = excluded.last_synced_at
                "#,
            )
            .bind(&s.player_id)
            .bind(s.year)
            .bind(s.total_games)
            .bind(s.don_games)
            .bind(s.mafia_games)
            .bind(s.sheriff_games)
            .bind(s.civilian_games)
            .bind(s.elo_rating)
            .bind(s.extra_points)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to upsert year stats {}:{}", s.player_id, s.year))?;

            outcomes.push(UpsertOutcome::from_existed(existed));
        }

        tx.commit().await?;
        tracing::debug!("Upserted {} year stat rows", stats.len());
        Ok(outcomes)
    }

    /// Years stored for a player, ascending.
    pub async fn years_for_player(&self, player_id: &str) -> Result<Vec<i32>> {
        sqlx::query_scalar(
            "SELECT year FROM player_year_stats WHERE player_gomafia_id = ? ORDER BY year",
        )
        .bind(player_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list player years")
    }

    pub async fn count(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM player_year_stats")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count year stats")
    }
}
