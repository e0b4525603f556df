//! Tournament repository.
//!
//! Besides upserts, this answers "which tournaments still need work" for the
//! per-tournament phases (games, results) in incremental mode.

use anyhow::{Context, Result};
use sqlx::{Row, SqlitePool};

use super::{exists_in_tx, now_rfc3339, UpsertOutcome};
use crate::domain::models::TournamentStatus;
use crate::domain::raw::TournamentRaw;

#[derive(Clone)]
pub struct TournamentRepository {
    pool: SqlitePool,
}

impl TournamentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn upsert_batch(&self, tournaments: &[TournamentRaw]) -> Result<Vec<UpsertOutcome>> {
        let mut outcomes = Vec::with_capacity(tournaments.len());
        if tournaments.is_empty() {
            return Ok(outcomes);
        }

        let now = now_rfc3339();
        let mut tx = self.pool.begin().await?;

        for t in tournaments {
            let existed = exists_in_tx(
                &mut tx,
                "SELECT COUNT(*) FROM tournaments WHERE gomafia_id = ?",
                &[t.gomafia_id.as_str()],
            )
            .await?;

            sqlx::query(
                r#"
                INSERT INTO tournaments (
                    gomafia_id, name, city, status, stars, start_date, end_date,
                    average_elo, is_fsm_rated, prize_pool, participants_count, last_synced_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(gomafia_id) DO UPDATE SET
                    name = excluded.name,
                    city = excluded.city,
                    status = excluded.status,
                    stars = excluded.stars,
                    start_date = excluded.start_date,
                    end_date = excluded.end_date,
                    average_elo = excluded.average_elo,
                    is_fsm_rated = excluded.is_fsm_rated,
                    prize_pool = excluded.prize_pool,
                    participants_count = excluded.participants_count,
                    last_synced_at = excluded.last_synced_at
                "#,
            )
            .bind(&t.gomafia_id)
            .bind(&t.name)
            .bind(&t.city)
            .bind(t.status.as_str())
            .bind(t.stars.map(i64::from))
            .bind(t.start_date)
            .bind(t.end_date)
            .bind(t.average_elo)
            .bind(t.is_fsm_rated)
            .bind(t.prize_pool)
            .bind(t.participants_count)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to upsert tournament {}", t.gomafia_id))?;

            outcomes.push(UpsertOutcome::from_existed(existed));
        }

        tx.commit().await?;
        tracing::debug!("Upserted {} tournaments", tournaments.len());
        Ok(outcomes)
    }

    /// All tournament ids, in id order.
    pub async fn list_ids(&self) -> Result<Vec<String>> {
        sqlx::query_scalar(
            "SELECT gomafia_id FROM tournaments ORDER BY CAST(gomafia_id AS INTEGER)",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list tournament ids")
    }

    /// Tournaments without stored games, or still changing on the source.
    pub async fn list_ids_needing_games(&self) -> Result<Vec<String>> {
        sqlx::query_scalar(
            r#"
            SELECT t.gomafia_id
            FROM tournaments t
            WHERE t.status != 'CANCELLED'
              AND (t.status != 'COMPLETED'
                   OR NOT EXISTS (SELECT 1 FROM games g WHERE g.tournament_gomafia_id = t.gomafia_id))
            ORDER BY CAST(t.gomafia_id AS INTEGER)
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list tournaments needing games")
    }

    /// Tournaments without stored placements, or still changing on the source.
    pub async fn list_ids_needing_results(&self) -> Result<Vec<String>> {
        sqlx::query_scalar(
            r#"
            SELECT t.gomafia_id
            FROM tournaments t
            WHERE t.status != 'CANCELLED'
              AND (t.status != 'COMPLETED'
                   OR NOT EXISTS (SELECT 1 FROM player_tournaments r WHERE r.tournament_gomafia_id = t.gomafia_id))
            ORDER BY CAST(t.gomafia_id AS INTEGER)
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list tournaments needing results")
    }

    pub async fn get_status(&self, gomafia_id: &str) -> Result<Option<TournamentStatus>> {
        let row = sqlx::query("SELECT status FROM tournaments WHERE gomafia_id = ?")
            .bind(gomafia_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch tournament status")?;

        row.map(|r| {
            r.get::<String, _>("status")
                .parse::<TournamentStatus>()
                .map_err(|e| anyhow::anyhow!("Bad stored tournament status: {}", e))
        })
        .transpose()
    }

    pub async fn count(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM tournaments")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count tournaments")
    }
}
