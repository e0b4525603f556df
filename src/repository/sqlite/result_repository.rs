//! Per-tournament placements (`player_tournaments`).

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use super::{exists_in_tx, now_rfc3339, UpsertOutcome};
use crate::domain::raw::PlayerTournamentRaw;

#[derive(Clone)]
pub struct ResultRepository {
    pool: SqlitePool,
}

impl ResultRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn upsert_batch(&self, results: &[PlayerTournamentRaw]) -> Result<Vec<UpsertOutcome>> {
        let mut outcomes = Vec::with_capacity(results.len());
        if results.is_empty() {
            return Ok(outcomes);
        }

        let now = now_rfc3339();
        let mut tx = self.pool.begin().await?;

        for r in results {
            let existed = exists_in_tx(
                &mut tx,
                "SELECT COUNT(*) FROM player_tournaments WHERE player_gomafia_id = ? AND tournament_gomafia_id = ?",
                &[r.player_id.as_str(), r.tournament_id.as_str()],
            )
            .await?;

            sqlx::query(
                r#"
                INSERT INTO player_tournaments (
                    player_gomafia_id, tournament_gomafia_id, placement,
                    gg_points, elo_change, prize_money, last_synced_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(player_gomafia_id, tournament_gomafia_id) DO UPDATE SET
                    placement = excluded.placement,
                    gg_points = excluded.gg_points,
                    elo_change = excluded.elo_change,
                    prize_money = excluded.prize_money,
                    last_synced_at = excluded.last_synced_at
                "#,
            )
            .bind(&r.player_id)
            .bind(&r.tournament_id)
            .bind(r.placement)
            .bind(r.gg_points)
            .bind(r.elo_change)
            .bind(r.prize_money)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .with_context(|| {
                format!(
                    "Failed to upsert result {}:{}",
                    r.player_id, r.tournament_id
                )
            })?;

            outcomes.push(UpsertOutcome::from_existed(existed));
        }

        tx.commit().await?;
        tracing::debug!("Upserted {} tournament results", results.len());
        Ok(outcomes)
    }

    pub async fn count_for_tournament(&self, tournament_id: &str) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM player_tournaments WHERE tournament_gomafia_id = ?")
            .bind(tournament_id)
            .fetch_one(&self.pool)
            .await
            .context("Failed to count tournament results")
    }

    pub async fn count(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM player_tournaments")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count tournament results")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::fixtures;

    #[tokio::test]
    async fn test_composite_key_upsert() {
        let pool = fixtures::setup_test_db().await;
        let repo = ResultRepository::new(pool);

        let a = fixtures::placement("1", "50", 1);
        let b = fixtures::placement("2", "50", 2);
        let other = fixtures::placement("1", "51", 3);

        let outcomes = repo.upsert_batch(&[a.clone(), b, other]).await.unwrap();
        assert!(outcomes.iter().all(|o| *o == UpsertOutcome::Inserted));

        assert_eq!(repo.upsert_batch(&[a]).await.unwrap(), vec![UpsertOutcome::Updated]);
        assert_eq!(repo.count_for_tournament("50").await.unwrap(), 2);
        assert_eq!(repo.count().await.unwrap(), 3);
    }
}
