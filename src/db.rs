use anyhow::{Context, Result};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;

/// Configure SQLite pragmas for optimal performance.
/// These are set per-connection via the after_connect callback.
async fn configure_sqlite_pragmas(conn: &mut sqlx::SqliteConnection) -> Result<(), sqlx::Error> {
    use sqlx::Executor;

    // WAL mode: readers (status polling) are never blocked by the import writer
    conn.execute("PRAGMA journal_mode = WAL").await?;

    conn.execute("PRAGMA synchronous = NORMAL").await?;

    // Negative value = KB, so -65536 = 64MB
    conn.execute("PRAGMA cache_size = -65536").await?;

    // 5 second timeout for busy connections (prevents "database locked" errors)
    conn.execute("PRAGMA busy_timeout = 5000").await?;

    conn.execute("PRAGMA temp_store = MEMORY").await?;

    conn.execute("PRAGMA foreign_keys = ON").await?;

    Ok(())
}

/// Open (creating if needed) the import database at `db_path` and run migrations.
pub async fn init_db(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).context(format!(
            "failed to create database directory: {}",
            parent.display()
        ))?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::info!("Database URL: {}", db_url);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                configure_sqlite_pragmas(conn).await?;
                Ok(())
            })
        })
        .connect(&db_url)
        .await
        .context(format!(
            "failed to connect to database at {}",
            db_path.display()
        ))?;

    run_migrations(&pool).await?;

    tracing::info!("Database initialized successfully at {}", db_path.display());
    Ok(pool)
}

/// Single-connection in-memory database (each connection would otherwise get its own DB).
pub async fn init_in_memory() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .context("failed to create in-memory database")?;

    run_migrations(&pool).await?;
    Ok(pool)
}

async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!()
        .run(pool)
        .await
        .context("failed to run migrations")
}
