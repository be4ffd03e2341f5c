//! Database initialization
//!
//! Opens (or creates) the monitor database and creates the parser
//! statistics, parse error and weekly report tables idempotently.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL lets readers see either the old or the new row, never a torn one
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Open a private in-memory database with the full schema
///
/// Uses a single long-lived connection; every SQLite in-memory connection
/// is its own database.
pub async fn init_in_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all monitor tables (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await?;

    create_parsers_table(pool).await?;
    create_parse_errors_table(pool).await?;
    create_weekly_reports_table(pool).await?;

    Ok(())
}

/// Create the parsers table
///
/// One row per monitored parser. Counters are maintained by ingestion,
/// rolling metrics by accuracy runs.
pub async fn create_parsers_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS parsers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            version TEXT NOT NULL DEFAULT '',
            total_recipes INTEGER NOT NULL DEFAULT 0,
            accuracy_score REAL NOT NULL DEFAULT 0.0,
            error_count INTEGER NOT NULL DEFAULT 0,
            last_run TEXT,
            next_run TEXT,
            last_run_recipes INTEGER NOT NULL DEFAULT 0,
            avg_parse_time REAL NOT NULL DEFAULT 0.0
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the parse_errors table (append-only)
pub async fn create_parse_errors_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS parse_errors (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            parser_id INTEGER NOT NULL REFERENCES parsers(id),
            url TEXT,
            error_message TEXT NOT NULL,
            timestamp TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_parse_errors_parser_time ON parse_errors(parser_id, timestamp)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the weekly_reports table
pub async fn create_weekly_reports_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS weekly_reports (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            report_date TEXT NOT NULL,
            total_recipes INTEGER NOT NULL,
            success_rate REAL,
            avg_accuracy REAL,
            error_count INTEGER NOT NULL,
            report_data TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_weekly_reports_date ON weekly_reports(report_date)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
