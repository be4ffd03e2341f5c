//! Parser health record queries

use chrono::{DateTime, Duration, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::info;

use crate::db::models::{AccuracyMetrics, ParserStats};
use crate::time::{format_timestamp, parse_timestamp};
use crate::{Error, Result};

const PARSER_COLUMNS: &str = "id, name, version, total_recipes, accuracy_score, error_count, \
                              last_run, next_run, last_run_recipes, avg_parse_time";

fn parser_from_row(row: &SqliteRow) -> Result<ParserStats> {
    let last_run: Option<String> = row.try_get("last_run")?;
    let next_run: Option<String> = row.try_get("next_run")?;

    Ok(ParserStats {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        version: row.try_get("version")?,
        total_recipes: row.try_get("total_recipes")?,
        accuracy_score: row.try_get("accuracy_score")?,
        error_count: row.try_get("error_count")?,
        last_run: last_run.as_deref().map(parse_timestamp).transpose()?,
        next_run: next_run.as_deref().map(parse_timestamp).transpose()?,
        last_run_recipes: row.try_get("last_run_recipes")?,
        avg_parse_time: row.try_get("avg_parse_time")?,
    })
}

/// Look up a parser by its unique name
pub async fn find_by_name(pool: &SqlitePool, name: &str) -> Result<Option<ParserStats>> {
    let sql = format!("SELECT {} FROM parsers WHERE name = ?", PARSER_COLUMNS);
    let row = sqlx::query(&sql).bind(name).fetch_optional(pool).await?;

    row.as_ref().map(parser_from_row).transpose()
}

/// All parsers, ordered by name
pub async fn list_parsers(pool: &SqlitePool) -> Result<Vec<ParserStats>> {
    let sql = format!("SELECT {} FROM parsers ORDER BY name", PARSER_COLUMNS);
    let rows = sqlx::query(&sql).fetch_all(pool).await?;

    rows.iter().map(parser_from_row).collect()
}

/// Write the metrics of a completed accuracy run
///
/// One UPDATE statement: readers see either all of the previous metrics or
/// all of the new ones.
pub async fn update_accuracy_metrics(
    pool: &SqlitePool,
    parser_id: i64,
    metrics: &AccuracyMetrics,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE parsers
        SET accuracy_score = ?,
            avg_parse_time = ?,
            last_run = ?,
            last_run_recipes = ?,
            next_run = COALESCE(?, next_run)
        WHERE id = ?
        "#,
    )
    .bind(metrics.accuracy_score)
    .bind(metrics.avg_parse_time)
    .bind(format_timestamp(metrics.last_run))
    .bind(metrics.last_run_recipes)
    .bind(metrics.next_run.map(format_timestamp))
    .bind(parser_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound(format!("parser id {}", parser_id)));
    }

    Ok(())
}

/// Create the named parser unless it already exists
///
/// New parsers start at 100% accuracy with the next run one interval ahead.
/// Returns the stored record and whether it was created by this call.
pub async fn provision_parser(
    pool: &SqlitePool,
    name: &str,
    version: &str,
    now: DateTime<Utc>,
    next_run_interval: Duration,
) -> Result<(ParserStats, bool)> {
    let result = sqlx::query(
        r#"
        INSERT OR IGNORE INTO parsers (
            name, version, total_recipes, accuracy_score, error_count,
            last_run, next_run, last_run_recipes, avg_parse_time
        ) VALUES (?, ?, 0, 100.0, 0, ?, ?, 0, 0.0)
        "#,
    )
    .bind(name)
    .bind(version)
    .bind(format_timestamp(now))
    .bind(format_timestamp(now + next_run_interval))
    .execute(pool)
    .await?;

    let created = result.rows_affected() > 0;
    if created {
        info!(parser = %name, version = %version, "Parser provisioned");
    }

    let parser = find_by_name(pool, name)
        .await?
        .ok_or_else(|| Error::NotFound(format!("parser '{}'", name)))?;

    Ok((parser, created))
}
