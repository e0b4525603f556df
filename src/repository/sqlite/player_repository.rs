//! Player repository.

use anyhow::{Context, Result};
use sqlx::{Row, SqlitePool};

use super::{exists_in_tx, now_rfc3339, UpsertOutcome};
use crate::domain::raw::PlayerRaw;

#[derive(Clone)]
pub struct PlayerRepository {
    pool: SqlitePool,
}

impl PlayerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Upsert a batch of players in one transaction.
    pub async fn upsert_batch(&self, players: &[PlayerRaw]) -> Result<Vec<UpsertOutcome>> {
        let mut outcomes = Vec::with_capacity(players.len());
        if players.is_empty() {
            return Ok(outcomes);
        }

        let now = now_rfc3339();
        let mut tx = self.pool.begin().await?;

        for player in players {
            let existed = exists_in_tx(
                &mut tx,
                "SELECT COUNT(*) FROM players WHERE gomafia_id = ?",
                &[player.gomafia_id.as_str()],
            )
            .await?;

            sqlx::query(
                r#"
                INSERT INTO players (
                    gomafia_id, name, region, club_gomafia_id, elo,
                    tournaments_played, gg_points, last_synced_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(gomafia_id) DO UPDATE SET
                    name = excluded.name,
                    region = excluded.region,
                    club_gomafia_id = excluded.club_gomafia_id,
                    elo = excluded.elo,
                    tournaments_played = excluded.tournaments_played,
                    gg_points = excluded.gg_points,
                    last_synced_at = excluded.last_synced_at
                "#,
            )
            .bind(&player.gomafia_id)
            .bind(&player.name)
            .bind(&player.region)
            .bind(&player.club_id)
            .bind(player.elo)
            .bind(player.tournaments_played)
            .bind(player.gg_points)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to upsert player {}", player.gomafia_id))?;

            outcomes.push(UpsertOutcome::from_existed(existed));
        }

        tx.commit().await?;
        tracing::debug!("Upserted {} players", players.len());
        Ok(outcomes)
    }

    /// All stored player ids, in id order.
    pub async fn list_ids(&self) -> Result<Vec<String>> {
        sqlx::query_scalar("SELECT gomafia_id FROM players ORDER BY CAST(gomafia_id AS INTEGER)")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list player ids")
    }

    pub async fn get(&self, gomafia_id: &str) -> Result<Option<PlayerRaw>> {
        let row = sqlx::query(
            r#"
            SELECT gomafia_id, name, region, club_gomafia_id, elo, tournaments_played, gg_points
            FROM players
            WHERE gomafia_id = ?
            "#,
        )
        .bind(gomafia_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch player")?;

        Ok(row.map(|row| PlayerRaw {
            gomafia_id: row.get("gomafia_id"),
            name: row.get("name"),
            region: row.get("region"),
            club_id: row.get("club_gomafia_id"),
            elo: row.get("elo"),
            tournaments_played: row.get("tournaments_played"),
            gg_points: row.get("gg_points"),
        }))
    }

    pub async fn count(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM players")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count players")
    }
}
