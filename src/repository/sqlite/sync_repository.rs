//! Run bookkeeping: the `current` status row, the sync log history and the
//! cross-process run lock.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::{now_rfc3339, parse_datetime};
use crate::domain::models::{RunStatus, SyncErrorEntry, SyncLog, SyncStatus, SyncType};

const STATUS_ID: &str = "current";
const LOCK_ID: &str = "import";

#[derive(Clone)]
pub struct SyncRepository {
    pool: SqlitePool,
}

impl SyncRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // ========================================================================
    // STATUS
    // ========================================================================

    /// Returns the default (idle) status if no run has ever started.
    pub async fn get_status(&self) -> Result<RunStatus> {
        let row = sqlx::query(
            r#"
            SELECT is_running, current_operation, last_sync_type, last_sync_time,
                   last_error, total_records_processed
            FROM sync_status
            WHERE id = ?
            "#,
        )
        .bind(STATUS_ID)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load sync status")?;

        let Some(row) = row else {
            return Ok(RunStatus::default());
        };

        let last_sync_type: Option<String> = row.get("last_sync_type");
        let last_sync_time: Option<String> = row.get("last_sync_time");

        Ok(RunStatus {
            is_running: row.get("is_running"),
            current_operation: row.get("current_operation"),
            last_sync_type: last_sync_type
                .map(|s| s.parse::<SyncType>())
                .transpose()
                .map_err(|e| anyhow::anyhow!("Bad sync type in status: {}", e))?,
            last_sync_time: last_sync_time.as_deref().map(parse_datetime).transpose()?,
            last_error: row.get("last_error"),
            total_records_processed: row.get("total_records_processed"),
        })
    }

    pub async fn save_status(&self, status: &RunStatus) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sync_status (
                id, is_running, current_operation, last_sync_type, last_sync_time,
                last_error, total_records_processed, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                is_running = excluded.is_running,
                current_operation = excluded.current_operation,
                last_sync_type = excluded.last_sync_type,
                last_sync_time = excluded.last_sync_time,
                last_error = excluded.last_error,
                total_records_processed = excluded.total_records_processed,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(STATUS_ID)
        .bind(status.is_running)
        .bind(&status.current_operation)
        .bind(status.last_sync_type.map(|t| t.as_str()))
        .bind(status.last_sync_time.map(|t| t.to_rfc3339()))
        .bind(&status.last_error)
        .bind(status.total_records_processed)
        .bind(now_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save sync status")?;

        Ok(())
    }

    // ========================================================================
    // LOGS
    // ========================================================================

    /// Open a RUNNING log row; returns its id.
    pub async fn create_log(&self, sync_type: SyncType, start_time: DateTime<Utc>) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO sync_logs (type, status, start_time, records_processed, errors)
            VALUES (?, ?, ?, 0, '[]')
            "#,
        )
        .bind(sync_type.as_str())
        .bind(SyncStatus::Running.as_str())
        .bind(start_time.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to create sync log")?;

        Ok(result.last_insert_rowid())
    }

    /// Move a RUNNING log to a terminal state.
    ///
    /// Returns `false` if the row was already terminal; a terminal log is
    /// never rewritten.
    pub async fn finalize_log(
        &self,
        id: i64,
        status: SyncStatus,
        records_processed: i64,
        errors: &[SyncErrorEntry],
    ) -> Result<bool> {
        let errors_json = serde_json::to_string(errors).context("Failed to serialize sync errors")?;

        let result = sqlx::query(
            r#"
            UPDATE sync_logs
            SET status = ?, end_time = ?, records_processed = ?, errors = ?
            WHERE id = ? AND status = 'RUNNING'
            "#,
        )
        .bind(status.as_str())
        .bind(now_rfc3339())
        .bind(records_processed)
        .bind(errors_json)
        .bind(id)
        .execute(&self.pool)
        .await
        .context("Failed to finalize sync log")?;

        Ok(result.rows_affected() > 0)
    }

    /// Append entries to a running log's error ledger.
    pub async fn append_errors(&self, id: i64, entries: &[SyncErrorEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;

        let current: Option<String> =
            sqlx::query_scalar("SELECT errors FROM sync_logs WHERE id = ? AND status = 'RUNNING'")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        let Some(current) = current else {
            return Ok(());
        };

        let mut all: Vec<SyncErrorEntry> =
            serde_json::from_str(&current).context("Failed to parse sync errors")?;
        all.extend_from_slice(entries);

        sqlx::query("UPDATE sync_logs SET errors = ? WHERE id = ?")
            .bind(serde_json::to_string(&all)?)
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to append sync errors")?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn get_log(&self, id: i64) -> Result<Option<SyncLog>> {
        let row = sqlx::query(
            r#"
            SELECT id, type, status, start_time, end_time, records_processed, errors
            FROM sync_logs
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load sync log")?;

        row.map(|r| row_to_sync_log(&r)).transpose()
    }

    /// Most recent logs first.
    pub async fn recent_logs(&self, limit: i64) -> Result<Vec<SyncLog>> {
        let rows = sqlx::query(
            r#"
            SELECT id, type, status, start_time, end_time, records_processed, errors
            FROM sync_logs
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list sync logs")?;

        rows.iter().map(row_to_sync_log).collect()
    }

    /// Fail every log still RUNNING; used when no process can own them.
    pub async fn fail_interrupted_logs(&self, message: &str) -> Result<u64> {
        let entry = SyncErrorEntry {
            phase: None,
            identifier: None,
            message: message.to_string(),
        };

        // Keeps whatever the interrupted run already appended.
        let result = sqlx::query(
            r#"
            UPDATE sync_logs
            SET status = 'FAILED', end_time = ?, errors = json_insert(errors, '$[#]', json(?))
            WHERE status = 'RUNNING'
            "#,
        )
        .bind(now_rfc3339())
        .bind(serde_json::to_string(&entry)?)
        .execute(&self.pool)
        .await
        .context("Failed to recover interrupted sync logs")?;

        Ok(result.rows_affected())
    }

    // ========================================================================
    // LOCK
    // ========================================================================

    /// Take the import lock for `lease`, replacing an expired one.
    ///
    /// Returns `false` when another holder's lease is still valid.
    pub async fn try_acquire_lock(&self, holder: &str, lease: Duration) -> Result<bool> {
        let now = Utc::now();
        let expires = now + lease;

        let result = sqlx::query(
            r#"
            INSERT INTO import_locks (id, holder, acquired_at, expires_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                holder = excluded.holder,
                acquired_at = excluded.acquired_at,
                expires_at = excluded.expires_at
            WHERE import_locks.expires_at <= ? OR import_locks.holder = excluded.holder
            "#,
        )
        .bind(LOCK_ID)
        .bind(holder)
        .bind(now.to_rfc3339())
        .bind(expires.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to acquire import lock")?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn release_lock(&self, holder: &str) -> Result<()> {
        sqlx::query("DELETE FROM import_locks WHERE id = ? AND holder = ?")
            .bind(LOCK_ID)
            .bind(holder)
            .execute(&self.pool)
            .await
            .context("Failed to release import lock")?;
        Ok(())
    }

    pub async fn lock_holder(&self) -> Result<Option<String>> {
        sqlx::query_scalar("SELECT holder FROM import_locks WHERE id = ?")
            .bind(LOCK_ID)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to read import lock")
    }
}

fn row_to_sync_log(row: &SqliteRow) -> Result<SyncLog> {
    let sync_type: String = row.get("type");
    let status: String = row.get("status");
    let start_time: String = row.get("start_time");
    let end_time: Option<String> = row.get("end_time");
    let errors: String = row.get("errors");

    Ok(SyncLog {
        id: row.get("id"),
        sync_type: sync_type
            .parse()
            .map_err(|e| anyhow::anyhow!("Bad sync type in log: {}", e))?,
        status: status
            .parse()
            .map_err(|e| anyhow::anyhow!("Bad sync status in log: {}", e))?,
        start_time: parse_datetime(&start_time)?,
        end_time: end_time.as_deref().map(parse_datetime).transpose()?,
        records_processed: row.get("records_processed"),
        errors: serde_json::from_str(&errors).context("Failed to parse sync errors")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::PhaseName;
    use crate::test_utils::fixtures;

    #[tokio::test]
    async fn test_status_defaults_then_round_trips() {
        let pool = fixtures::setup_test_db().await;
        let repo = SyncRepository::new(pool);

        assert_eq!(repo.get_status().await.unwrap(), RunStatus::default());

        let status = RunStatus {
            is_running: true,
            current_operation: Some("GAMES".into()),
            last_sync_type: Some(SyncType::Incremental),
            last_sync_time: None,
            last_error: None,
            total_records_processed: 42,
        };
        repo.save_status(&status).await.unwrap();

        let loaded = repo.get_status().await.unwrap();
        assert!(loaded.is_running);
        assert_eq!(loaded.current_operation.as_deref(), Some("GAMES"));
        assert_eq!(loaded.last_sync_type, Some(SyncType::Incremental));
        assert_eq!(loaded.total_records_processed, 42);
    }

    #[tokio::test]
    async fn test_finalize_is_monotonic() {
        let pool = fixtures::setup_test_db().await;
        let repo = SyncRepository::new(pool);

        let id = repo.create_log(SyncType::Full, Utc::now()).await.unwrap();
        let entry = SyncErrorEntry {
            phase: Some(PhaseName::Games),
            identifier: Some("77".into()),
            message: "timeout".into(),
        };
        repo.append_errors(id, &[entry.clone()]).await.unwrap();

        assert!(repo
            .finalize_log(id, SyncStatus::Cancelled, 5, &[entry])
            .await
            .unwrap());
        assert!(!repo
            .finalize_log(id, SyncStatus::Completed, 9, &[])
            .await
            .unwrap());

        let log = repo.get_log(id).await.unwrap().unwrap();
        assert_eq!(log.status, SyncStatus::Cancelled);
        assert_eq!(log.records_processed, 5);
        assert_eq!(log.errors.len(), 1);
        assert!(log.end_time.is_some());
    }

    #[tokio::test]
    async fn test_interrupted_logs_are_failed() {
        let pool = fixtures::setup_test_db().await;
        let repo = SyncRepository::new(pool);

        let stale = repo.create_log(SyncType::Full, Utc::now()).await.unwrap();
        assert_eq!(repo.fail_interrupted_logs("interrupted").await.unwrap(), 1);

        let log = repo.get_log(stale).await.unwrap().unwrap();
        assert_eq!(log.status, SyncStatus::Failed);
        assert_eq!(log.errors[0].message, "interrupted");

        let newer = repo.create_log(SyncType::Incremental, Utc::now()).await.unwrap();
        let recent = repo.recent_logs(10).await.unwrap();
        assert_eq!(recent[0].id, newer);
        assert_eq!(recent.len(), 2);
    }

    #[tokio::test]
    async fn test_interrupted_log_keeps_appended_errors() {
        let pool = fixtures::setup_test_db().await;
        let repo = SyncRepository::new(pool);

        let id = repo.create_log(SyncType::Full, Utc::now()).await.unwrap();
        let failure = SyncErrorEntry {
            phase: Some(PhaseName::Games),
            identifier: Some("77".into()),
            message: "502".into(),
        };
        repo.append_errors(id, &[failure.clone()]).await.unwrap();
        repo.fail_interrupted_logs("interrupted").await.unwrap();

        let log = repo.get_log(id).await.unwrap().unwrap();
        assert_eq!(log.errors.len(), 2);
        assert_eq!(log.errors[0], failure);
        assert_eq!(log.errors[1].message, "interrupted");
    }

    #[tokio::test]
    async fn test_corrupt_error_ledger_is_not_overwritten() {
        let pool = fixtures::setup_test_db().await;
        let repo = SyncRepository::new(pool.clone());

        let id = repo.create_log(SyncType::Full, Utc::now()).await.unwrap();
        sqlx::query("UPDATE sync_logs SET errors = 'not json' WHERE id = ?")
            .bind(id)
            .execute(&pool)
            .await
            .unwrap();

        let entry = SyncErrorEntry {
            phase: None,
            identifier: None,
            message: "late".into(),
        };
        assert!(repo.append_errors(id, &[entry]).await.is_err());
        assert!(repo.get_log(id).await.is_err());

        let raw: String = sqlx::query_scalar("SELECT errors FROM sync_logs WHERE id = ?")
            .bind(id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(raw, "not json");
    }

    #[tokio::test]
    async fn test_bad_stored_timestamp_is_an_error() {
        let pool = fixtures::setup_test_db().await;
        let repo = SyncRepository::new(pool.clone());

        let status = RunStatus {
            last_sync_time: Some(Utc::now()),
            ..Default::default()
        };
        repo.save_status(&status).await.unwrap();
        sqlx::query("UPDATE sync_status SET last_sync_time = 'yesterday'")
            .execute(&pool)
            .await
            .unwrap();

        assert!(repo.get_status().await.is_err());
    }

    #[tokio::test]
    async fn test_lock_conflict_and_expiry() {
        let pool = fixtures::setup_test_db().await;
        let repo = SyncRepository::new(pool);

        assert!(repo.try_acquire_lock("a", Duration::hours(2)).await.unwrap());
        assert!(!repo.try_acquire_lock("b", Duration::hours(2)).await.unwrap());
        assert_eq!(repo.lock_holder().await.unwrap().as_deref(), Some("a"));

        repo.release_lock("a").await.unwrap();
        assert!(repo.try_acquire_lock("b", Duration::seconds(-1)).await.unwrap());
        // b's lease is already expired, so c takes over
        assert!(repo.try_acquire_lock("c", Duration::hours(1)).await.unwrap());
        assert_eq!(repo.lock_holder().await.unwrap().as_deref(), Some("c"));
    }
}
