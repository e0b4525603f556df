use anyhow::{Context, Result};
use sqlx::SqlitePool;

use super::{exists_in_tx, now_rfc3339, UpsertOutcome};
use crate::domain::raw::ClubRaw;

#[derive(Clone)]
pub struct ClubRepository {
    pool: SqlitePool,
}

impl ClubRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn upsert_batch(&self, clubs: &[ClubRaw]) -> Result<Vec<UpsertOutcome>> {
        let mut outcomes = Vec::with_capacity(clubs.len());
        if clubs.is_empty() {
            return Ok(outcomes);
        }

        let now = now_rfc3339();
        let mut tx = self.pool.begin().await?;

        for club in clubs {
            let existed = exists_in_tx(
                &mut tx,
                "SELECT COUNT(*) FROM clubs WHERE gomafia_id = ?",
                &[club.gomafia_id.as_str()],
            )
            .await?;

            sqlx::query(
                r#"
                INSERT INTO clubs (
                    gomafia_id, name, region, president_name, members_count, elo, last_synced_at
                )
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(gomafia_id) DO UPDATE SET
                    name = excluded.name,
                    region = excluded.region,
                    president_name = excluded.president_name,
                    members_count = excluded.members_count,
                    elo = excluded.elo,
                    last_synced_at = excluded.last_synced_at
                "#,
            )
            .bind(&club.gomafia_id)
            .bind(&club.name)
            .bind(&club.region)
            .bind(&club.president_name)
            .bind(club.members_count)
            .bind(club.elo)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to upsert club {}", club.gomafia_id))?;

            outcomes.push(UpsertOutcome::from_existed(existed));
        }

        tx.commit().await?;
        tracing::debug!("Upserted {} clubs", clubs.len());
        Ok(outcomes)
    }

    pub async fn count(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM clubs")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count clubs")
    }
}
