//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{Error, Result};

/// Health record of one monitored parser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParserStats {
    pub id: i64,
    pub name: String,
    pub version: String,
    /// Recipes ingested by this parser (maintained by ingestion)
    pub total_recipes: i64,
    /// Mean fuzzy similarity of the last completed accuracy run, 0-100
    pub accuracy_score: f64,
    /// Parse errors recorded by ingestion
    pub error_count: i64,
    pub last_run: Option<DateTime<Utc>>,
    /// Advisory only; nothing schedules against it
    pub next_run: Option<DateTime<Utc>>,
    /// Items compared in the last completed accuracy run
    pub last_run_recipes: i64,
    /// Seconds per compared item in the last completed accuracy run
    pub avg_parse_time: f64,
}

/// Metrics written by one completed accuracy run
#[derive(Debug, Clone, PartialEq)]
pub struct AccuracyMetrics {
    pub accuracy_score: f64,
    pub avg_parse_time: f64,
    pub last_run: DateTime<Utc>,
    pub last_run_recipes: i64,
    pub next_run: Option<DateTime<Utc>>,
}

/// A parse failure reported by ingestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseErrorRecord {
    pub id: i64,
    pub parser_id: i64,
    pub url: Option<String>,
    pub error_message: String,
    pub timestamp: DateTime<Utc>,
}

/// Occurrences of one error message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageCount {
    pub message: String,
    pub count: i64,
}

/// Parser below the failing threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailingParser {
    pub name: String,
    pub accuracy: f64,
    pub error_count: i64,
}

/// Per-parser entry of the accuracy breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracyBreakdown {
    pub accuracy: f64,
    pub total_recipes: i64,
    pub errors: i64,
}

/// One frequent error message of one parser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopIssue {
    pub parser: String,
    pub error: String,
    pub count: i64,
}

/// Weekly aggregation result
///
/// Serialized verbatim into `weekly_reports.report_data` and into the
/// dated report artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyReport {
    pub report_date: DateTime<Utc>,
    pub window_start: DateTime<Utc>,
    pub recipes_added: i64,
    pub success_rate: Option<f64>,
    pub avg_accuracy: Option<f64>,
    pub error_count: i64,
    pub failing_parsers: Vec<FailingParser>,
    pub accuracy_breakdown: BTreeMap<String, AccuracyBreakdown>,
    pub top_issues: Vec<TopIssue>,
}

/// Persisted weekly report row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyReportRecord {
    pub id: i64,
    pub report_date: DateTime<Utc>,
    pub total_recipes: i64,
    pub success_rate: Option<f64>,
    pub avg_accuracy: Option<f64>,
    pub error_count: i64,
    pub report_data: String,
}

impl WeeklyReportRecord {
    /// Decode the full report stored in `report_data`
    pub fn report(&self) -> Result<WeeklyReport> {
        serde_json::from_str(&self.report_data)
            .map_err(|e| Error::Internal(format!("Failed to deserialize report_data: {}", e)))
    }
}
