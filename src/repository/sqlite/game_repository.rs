//! Games and their seat-level participations.
//!
//! A game and its participations are written together: participations for a
//! game are replaced wholesale so a re-scraped game never keeps stale seats.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::{Row, SqlitePool};

use super::{exists_in_tx, now_rfc3339, UpsertOutcome};
use crate::domain::models::Role;
use crate::domain::raw::GameRaw;
use crate::domain::stats::ParticipationRow;

#[derive(Clone)]
pub struct GameRepository {
    pool: SqlitePool,
}

impl GameRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn upsert_batch(&self, games: &[GameRaw]) -> Result<Vec<UpsertOutcome>> {
        let mut outcomes = Vec::with_capacity(games.len());
        if games.is_empty() {
            return Ok(outcomes);
        }

        let now = now_rfc3339();
        let mut tx = self.pool.begin().await?;

        for game in games {
            let existed = exists_in_tx(
                &mut tx,
                "SELECT COUNT(*) FROM games WHERE gomafia_id = ?",
                &[game.gomafia_id.as_str()],
            )
            .await?;

            sqlx::query(
                r#"
                INSERT INTO games (
                    gomafia_id, tournament_gomafia_id, game_date, round,
                    table_number, winner_team, last_synced_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(gomafia_id) DO UPDATE SET
                    tournament_gomafia_id = excluded.tournament_gomafia_id,
                    game_date = excluded.game_date,
                    round = excluded.round,
                    table_number = excluded.table_number,
                    winner_team = excluded.winner_team,
                    last_synced_at = excluded.last_synced_at
                "#,
            )
            .bind(&game.gomafia_id)
            .bind(&game.tournament_id)
            .bind(game.date)
            .bind(game.round)
            .bind(game.table_number)
            .bind(game.winner_team.as_str())
            .bind(&now)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to upsert game {}", game.gomafia_id))?;

            sqlx::query("DELETE FROM game_participations WHERE game_gomafia_id = ?")
                .bind(&game.gomafia_id)
                .execute(&mut *tx)
                .await?;

            if !game.participations.is_empty() {
                let mut qb = sqlx::QueryBuilder::new(
                    r#"
                    INSERT INTO game_participations (
                        game_gomafia_id, player_gomafia_id, role, team, is_winner, performance
                    ) "#,
                );

                qb.push_values(&game.participations, |mut b, p| {
                    b.push_bind(&game.gomafia_id)
                        .push_bind(&p.player_id)
                        .push_bind(p.role.as_str())
                        .push_bind(p.team.as_str())
                        .push_bind(p.is_winner)
                        .push_bind(p.performance);
                });

                qb.build()
                    .execute(&mut *tx)
                    .await
                    .with_context(|| {
                        format!("Failed to insert participations for game {}", game.gomafia_id)
                    })?;
            }

            outcomes.push(UpsertOutcome::from_existed(existed));
        }

        tx.commit().await?;
        tracing::debug!("Upserted {} games", games.len());
        Ok(outcomes)
    }

    /// Players with at least one stored participation.
    pub async fn players_with_participations(&self) -> Result<Vec<String>> {
        sqlx::query_scalar(
            r#"
            SELECT DISTINCT player_gomafia_id
            FROM game_participations
            ORDER BY CAST(player_gomafia_id AS INTEGER)
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list players with participations")
    }

    /// Participations of the given players joined with their game date.
    pub async fn participations_for_players(
        &self,
        player_ids: &[String],
    ) -> Result<Vec<ParticipationRow>> {
        if player_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = sqlx::QueryBuilder::new(
            r#"
            SELECT p.player_gomafia_id, p.role, p.is_winner, p.performance, g.game_date
            FROM game_participations p
            JOIN games g ON g.gomafia_id = p.game_gomafia_id
            WHERE p.player_gomafia_id IN ("#,
        );
        let mut separated = qb.separated(", ");
        for id in player_ids {
            separated.push_bind(id);
        }
        separated.push_unseparated(") ORDER BY p.player_gomafia_id, g.game_date");

        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .context("Failed to load participations")?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let role_str: String = row.get("role");
            let role: Role = role_str
                .parse()
                .map_err(|e| anyhow::anyhow!("Bad role in storage: {}", e))?;
            let game_date: Option<NaiveDate> = row.get("game_date");
            out.push(ParticipationRow {
                player_id: row.get("player_gomafia_id"),
                role,
                is_winner: row.get("is_winner"),
                performance: row.get("performance"),
                game_date,
            });
        }
        Ok(out)
    }

    pub async fn count(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM games")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count games")
    }

    pub async fn count_participations(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM game_participations")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count participations")
    }
}
