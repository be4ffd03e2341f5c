//! Parse error queries
//!
//! Rows are append-only. Window queries treat both bounds as inclusive.

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::db::models::{MessageCount, ParseErrorRecord};
use crate::time::{format_timestamp, parse_timestamp};
use crate::{Error, Result};

/// Append a parse error and bump the parser's cumulative error count
pub async fn record_parse_error(
    pool: &SqlitePool,
    parser_id: i64,
    url: Option<&str>,
    error_message: &str,
    timestamp: DateTime<Utc>,
) -> Result<i64> {
    let mut tx = pool.begin().await?;

    let updated = sqlx::query("UPDATE parsers SET error_count = error_count + 1 WHERE id = ?")
        .bind(parser_id)
        .execute(&mut *tx)
        .await?;

    if updated.rows_affected() == 0 {
        return Err(Error::NotFound(format!("parser id {}", parser_id)));
    }

    let id = sqlx::query(
        "INSERT INTO parse_errors (parser_id, url, error_message, timestamp) VALUES (?, ?, ?, ?)",
    )
    .bind(parser_id)
    .bind(url)
    .bind(error_message)
    .bind(format_timestamp(timestamp))
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    tx.commit().await?;

    Ok(id)
}

/// Most recent errors of one parser, newest first
pub async fn recent_errors(
    pool: &SqlitePool,
    parser_id: i64,
    limit: usize,
) -> Result<Vec<ParseErrorRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT id, parser_id, url, error_message, timestamp
        FROM parse_errors
        WHERE parser_id = ?
        ORDER BY timestamp DESC, id DESC
        LIMIT ?
        "#,
    )
    .bind(parser_id)
    .bind(limit as i64)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let timestamp: String = row.try_get("timestamp")?;
            Ok(ParseErrorRecord {
                id: row.try_get("id")?,
                parser_id: row.try_get("parser_id")?,
                url: row.try_get("url")?,
                error_message: row.try_get("error_message")?,
                timestamp: parse_timestamp(&timestamp)?,
            })
        })
        .collect()
}

/// Number of errors of one parser within `[start, end]`
pub async fn count_in_window(
    pool: &SqlitePool,
    parser_id: i64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM parse_errors WHERE parser_id = ? AND timestamp >= ? AND timestamp <= ?",
    )
    .bind(parser_id)
    .bind(format_timestamp(start))
    .bind(format_timestamp(end))
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Most frequent error messages of one parser within `[start, end]`
///
/// Ordered by descending count; equal counts keep the order in which the
/// messages first appeared.
pub async fn top_messages_in_window(
    pool: &SqlitePool,
    parser_id: i64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    limit: usize,
) -> Result<Vec<MessageCount>> {
    let rows = sqlx::query(
        r#"
        SELECT error_message, COUNT(*) AS occurrences
        FROM parse_errors
        WHERE parser_id = ? AND timestamp >= ? AND timestamp <= ?
        GROUP BY error_message
        ORDER BY occurrences DESC, MIN(id) ASC
        LIMIT ?
        "#,
    )
    .bind(parser_id)
    .bind(format_timestamp(start))
    .bind(format_timestamp(end))
    .bind(limit as i64)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(MessageCount {
                message: row.try_get("error_message")?,
                count: row.try_get("occurrences")?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init::init_in_memory_database;
    use crate::db::parsers::{find_by_name, provision_parser};
    use chrono::{Duration, TimeZone};

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, d, 12, 0, 0).unwrap()
    }

    async fn setup() -> (SqlitePool, i64) {
        let pool = init_in_memory_database().await.unwrap();
        let (parser, _) = provision_parser(&pool, "allrecipes", "1.0.0", day(1), Duration::days(7))
            .await
            .unwrap();
        (pool, parser.id)
    }

    #[tokio::test]
    async fn test_record_increments_error_count() {
        let (pool, parser_id) = setup().await;

        record_parse_error(&pool, parser_id, Some("https://a.example/1"), "timeout", day(2))
            .await
            .unwrap();
        record_parse_error(&pool, parser_id, None, "timeout", day(3))
            .await
            .unwrap();

        let parser = find_by_name(&pool, "allrecipes").await.unwrap().unwrap();
        assert_eq!(parser.error_count, 2);
    }

    #[tokio::test]
    async fn test_record_for_unknown_parser_inserts_nothing() {
        let (pool, parser_id) = setup().await;

        let result = record_parse_error(&pool, parser_id + 1, None, "timeout", day(2)).await;
        assert!(matches!(result, Err(Error::NotFound(_))));

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM parse_errors")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_window_bounds_are_inclusive() {
        let (pool, parser_id) = setup().await;

        for d in [1, 2, 8, 9] {
            record_parse_error(&pool, parser_id, None, "boom", day(d)).await.unwrap();
        }

        assert_eq!(count_in_window(&pool, parser_id, day(2), day(8)).await.unwrap(), 2);
        assert_eq!(count_in_window(&pool, parser_id, day(1), day(9)).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_recent_errors_newest_first_limited() {
        let (pool, parser_id) = setup().await;

        for d in [3, 1, 5, 2] {
            let url = format!("https://a.example/{}", d);
            record_parse_error(&pool, parser_id, Some(&url), "boom", day(d))
                .await
                .unwrap();
        }

        let errors = recent_errors(&pool, parser_id, 3).await.unwrap();
        let days: Vec<DateTime<Utc>> = errors.iter().map(|e| e.timestamp).collect();
        assert_eq!(days, vec![day(5), day(3), day(2)]);
        assert_eq!(errors[0].url.as_deref(), Some("https://a.example/5"));
        assert_eq!(errors[0].parser_id, parser_id);
    }

    #[tokio::test]
    async fn test_top_messages_orders_by_count_then_first_seen() {
        let (pool, parser_id) = setup().await;

        let messages = ["b", "a", "a", "c", "b", "a"];
        for (i, message) in messages.iter().enumerate() {
            let ts = day(2) + Duration::minutes(i as i64);
            record_parse_error(&pool, parser_id, None, message, ts).await.unwrap();
        }

        let top = top_messages_in_window(&pool, parser_id, day(1), day(9), 2)
            .await
            .unwrap();
        assert_eq!(
            top,
            vec![
                MessageCount { message: "a".to_string(), count: 3 },
                MessageCount { message: "b".to_string(), count: 2 },
            ]
        );
    }
}
