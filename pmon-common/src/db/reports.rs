//! Weekly report persistence
//!
//! Reports are written once and never updated.

use sqlx::{sqlite::SqliteRow, Row, SqliteConnection, SqlitePool};

use crate::db::models::{WeeklyReport, WeeklyReportRecord};
use crate::time::{format_timestamp, parse_timestamp};
use crate::{Error, Result};

/// Insert a report using the caller's connection or transaction
///
/// Takes a connection rather than the pool so the insert can share a
/// transaction with the artifact write.
pub async fn insert_report(conn: &mut SqliteConnection, report: &WeeklyReport) -> Result<i64> {
    let report_data = serde_json::to_string(report)
        .map_err(|e| Error::Internal(format!("Failed to serialize report: {}", e)))?;

    let id = sqlx::query(
        r#"
        INSERT INTO weekly_reports (
            report_date, total_recipes, success_rate, avg_accuracy, error_count, report_data
        ) VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(format_timestamp(report.report_date))
    .bind(report.recipes_added)
    .bind(report.success_rate)
    .bind(report.avg_accuracy)
    .bind(report.error_count)
    .bind(&report_data)
    .execute(conn)
    .await?
    .last_insert_rowid();

    Ok(id)
}

fn report_from_row(row: &SqliteRow) -> Result<WeeklyReportRecord> {
    let report_date: String = row.try_get("report_date")?;

    Ok(WeeklyReportRecord {
        id: row.try_get("id")?,
        report_date: parse_timestamp(&report_date)?,
        total_recipes: row.try_get("total_recipes")?,
        success_rate: row.try_get("success_rate")?,
        avg_accuracy: row.try_get("avg_accuracy")?,
        error_count: row.try_get("error_count")?,
        report_data: row.try_get("report_data")?,
    })
}

/// Most recent report by report date
pub async fn latest_report(pool: &SqlitePool) -> Result<Option<WeeklyReportRecord>> {
    let row = sqlx::query(
        r#"
        SELECT id, report_date, total_recipes, success_rate, avg_accuracy, error_count, report_data
        FROM weekly_reports
        ORDER BY report_date DESC, id DESC
        LIMIT 1
        "#,
    )
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(report_from_row).transpose()
}

/// Number of stored reports
pub async fn count_reports(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM weekly_reports")
        .fetch_one(pool)
        .await?;
    Ok(count)
}
