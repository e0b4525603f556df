use anyhow::{Context, Result};
use sqlx::{Row, SqlitePool};

use super::{exists_in_tx, now_rfc3339, UpsertOutcome};
use crate::domain::stats::PlayerRoleStats;

#[derive(Clone)]
pub struct RoleStatsRepository {
    pool: SqlitePool,
}

impl RoleStatsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn upsert_batch(&self, stats: &[PlayerRoleStats]) -> Result<Vec<UpsertOutcome>> {
        let mut outcomes = Vec::with_capacity(stats.len());
        if stats.is_empty() {
            return Ok(outcomes);
        }

        let now = now_rfc3339();
        let mut tx = self.pool.begin().await?;

        for s in stats {
            let existed = exists_in_tx(
                &mut tx,
                "SELECT COUNT(*) FROM player_role_stats WHERE player_gomafia_id = ? AND role = ?",
                &[s.player_id.as_str(), s.role.as_str()],
            )
            .await?;

            sqlx::query(
                r#"
                INSERT INTO player_role_stats (
                    player_gomafia_id, role, games_played, wins, losses,
                    win_rate, average_performance, last_played, updated_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(player_gomafia_id, role) DO UPDATE SET
                    games_played = excluded.games_played,
                    wins = excluded.wins,
                    losses = excluded.losses,
                    win_rate = excluded.win_rate,
                    average_performance = excluded.average_performance,
                    last_played = excluded.last_played,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(&s.player_id)
            .bind(s.role.as_str())
            .bind(s.games_played)
            .bind(s.wins)
            .bind(s.losses)
            .bind(s.win_rate)
            .bind(s.average_performance)
            .bind(s.last_played)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to upsert role stats {}:{}", s.player_id, s.role.as_str()))?;

            outcomes.push(UpsertOutcome::from_existed(existed));
        }

        tx.commit().await?;
        tracing::debug!("Upserted {} role stat rows", stats.len());
        Ok(outcomes)
    }

    /// Remove rows of `player_ids` whose (player, role) group is not in `keep`.
    /// Used after re-aggregation, when re-scraped seats dropped a role.
    pub async fn delete_stale(&self, player_ids: &[String], keep: &[PlayerRoleStats]) -> Result<u64> {
        if player_ids.is_empty() {
            return Ok(0);
        }

        let mut qb = sqlx::QueryBuilder::new("DELETE FROM player_role_stats WHERE player_gomafia_id IN (");
        let mut separated = qb.separated(", ");
        for id in player_ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(")");

        if !keep.is_empty() {
            qb.push(" AND (player_gomafia_id || '/' || role) NOT IN (");
            let mut separated = qb.separated(", ");
            for s in keep {
                separated.push_bind(format!("{}/{}", s.player_id, s.role.as_str()));
            }
            separated.push_unseparated(")");
        }

        let result = qb
            .build()
            .execute(&self.pool)
            .await
            .context("Failed to delete stale role stats")?;
        Ok(result.rows_affected())
    }

    /// Remove rows of players that no longer have any participation.
    pub async fn delete_without_participations(&self) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM player_role_stats
            WHERE player_gomafia_id NOT IN (SELECT DISTINCT player_gomafia_id FROM game_participations)
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to delete orphaned role stats")?;
        Ok(result.rows_affected())
    }

    /// (role, games_played, wins) for a player, ordered by role.
    pub async fn summary_for_player(&self, player_id: &str) -> Result<Vec<(String, i64, i64)>> {
        let rows = sqlx::query(
            r#"
            SELECT role, games_played, wins
            FROM player_role_stats
            WHERE player_gomafia_id = ?
            ORDER BY role
            "#,
        )
        .bind(player_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load role stats")?;

        Ok(rows
            .iter()
            .map(|r| (r.get("role"), r.get("games_played"), r.get("wins")))
            .collect())
    }

    pub async fn count(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM player_role_stats")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count role stats")
    }
}
