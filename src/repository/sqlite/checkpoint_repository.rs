//! The single import checkpoint row.

use anyhow::{Context, Result};
use sqlx::{Row, SqlitePool};

use super::parse_datetime;
use crate::domain::models::{Checkpoint, PhaseName};

const CHECKPOINT_ID: &str = "current";

#[derive(Clone)]
pub struct CheckpointRepository {
    pool: SqlitePool,
}

impl CheckpointRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Replace the stored checkpoint.
    pub async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        let ids = serde_json::to_string(&checkpoint.processed_ids)
            .context("Failed to serialize processed ids")?;

        sqlx::query(
            r#"
            INSERT INTO import_checkpoints (
                id, phase, last_batch_index, total_batches, processed_ids, message, timestamp
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                phase = excluded.phase,
                last_batch_index = excluded.last_batch_index,
                total_batches = excluded.total_batches,
                processed_ids = excluded.processed_ids,
                message = excluded.message,
                timestamp = excluded.timestamp
            "#,
        )
        .bind(CHECKPOINT_ID)
        .bind(checkpoint.phase.as_str())
        .bind(checkpoint.last_batch_index)
        .bind(checkpoint.total_batches)
        .bind(ids)
        .bind(&checkpoint.message)
        .bind(checkpoint.timestamp.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save checkpoint")?;

        Ok(())
    }

    pub async fn load(&self) -> Result<Option<Checkpoint>> {
        let row = sqlx::query(
            r#"
            SELECT phase, last_batch_index, total_batches, processed_ids, message, timestamp
            FROM import_checkpoints
            WHERE id = ?
            "#,
        )
        .bind(CHECKPOINT_ID)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load checkpoint")?;

        let Some(row) = row else {
            return Ok(None);
        };

        let phase_str: String = row.get("phase");
        let phase: PhaseName = phase_str
            .parse()
            .map_err(|e| anyhow::anyhow!("Stored checkpoint has bad phase: {}", e))?;
        let ids_json: String = row.get("processed_ids");
        let processed_ids: Vec<String> =
            serde_json::from_str(&ids_json).context("Stored checkpoint has bad id list")?;
        let timestamp: String = row.get("timestamp");

        Ok(Some(Checkpoint {
            phase,
            last_batch_index: row.get("last_batch_index"),
            total_batches: row.get("total_batches"),
            processed_ids,
            message: row.get("message"),
            timestamp: parse_datetime(&timestamp)?,
        }))
    }

    pub async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM import_checkpoints")
            .execute(&self.pool)
            .await
            .context("Failed to clear checkpoint")?;
        Ok(())
    }
}
