//! Weekly parser health aggregation
//!
//! Summarizes the trailing window (7 days by default): recipes ingested,
//! parsers below the accuracy threshold, a per-parser accuracy breakdown and
//! each parser's most frequent error messages.
//!
//! The report row and the dated JSON artifact are written together: the row
//! is inserted in a transaction, the artifact is written and renamed into
//! place, and only then is the transaction committed. Any failure leaves
//! neither behind, and an earlier artifact for the same day is restored.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use pmon_common::config::ReportConfig;
use pmon_common::db::models::{AccuracyBreakdown, FailingParser, TopIssue, WeeklyReport};
use pmon_common::db::{parse_errors, parsers, reports};
use pmon_common::time::trailing_window;

use crate::services::recipe_source::{RecipeSource, SourceError};

/// Report generation errors
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Store error: {0}")]
    Store(#[from] pmon_common::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Recipe source error: {0}")]
    Source(#[from] SourceError),

    #[error("Artifact error for {path}: {message}")]
    Artifact { path: PathBuf, message: String },
}

/// Artifact name for a report ending on `end`
pub fn artifact_file_name(end: DateTime<Utc>) -> String {
    format!("weekly_report_{}.json", end.format("%Y%m%d"))
}

pub struct WeeklyReporter {
    db: SqlitePool,
    recipes: Arc<dyn RecipeSource>,
    reports_dir: PathBuf,
    settings: ReportConfig,
}

impl WeeklyReporter {
    pub fn new(
        db: SqlitePool,
        recipes: Arc<dyn RecipeSource>,
        reports_dir: impl Into<PathBuf>,
        settings: ReportConfig,
    ) -> Self {
        Self {
            db,
            recipes,
            reports_dir: reports_dir.into(),
            settings,
        }
    }

    pub fn reports_dir(&self) -> &Path {
        &self.reports_dir
    }

    /// Generate the report for the window ending now
    pub async fn generate_weekly_report(&self) -> Option<WeeklyReport> {
        self.generate_at(pmon_common::time::now()).await
    }

    /// Generate the report for the window ending at `end`
    ///
    /// `None` means aggregation did not complete (logged); it never means
    /// "no issues".
    pub async fn generate_at(&self, end: DateTime<Utc>) -> Option<WeeklyReport> {
        let result = match self.build_report(end).await {
            Ok(report) => self.persist(&report).await.map(|path| (report, path)),
            Err(e) => Err(e),
        };

        match result {
            Ok((report, path)) => {
                info!(
                    recipes_added = report.recipes_added,
                    failing = report.failing_parsers.len(),
                    top_issues = report.top_issues.len(),
                    artifact = %path.display(),
                    "Weekly report generated"
                );
                Some(report)
            }
            Err(e) => {
                error!(error = %e, "Error generating report");
                None
            }
        }
    }

    /// Aggregate the window without persisting anything
    pub async fn build_report(&self, end: DateTime<Utc>) -> Result<WeeklyReport, ReportError> {
        let (start, end) = trailing_window(end, self.settings.window_days);

        let recipes_added = self.recipes.count_added_between(start, end).await? as i64;
        let all_parsers = parsers::list_parsers(&self.db).await?;

        let mut failing_parsers = Vec::new();
        let mut accuracy_breakdown = BTreeMap::new();
        let mut top_issues = Vec::new();
        let mut window_errors = 0i64;

        for parser in &all_parsers {
            if parser.accuracy_score < self.settings.failing_threshold {
                failing_parsers.push(FailingParser {
                    name: parser.name.clone(),
                    accuracy: parser.accuracy_score,
                    error_count: parser.error_count,
                });
            }

            accuracy_breakdown.insert(
                parser.name.clone(),
                AccuracyBreakdown {
                    accuracy: parser.accuracy_score,
                    total_recipes: parser.total_recipes,
                    errors: parser.error_count,
                },
            );

            window_errors += parse_errors::count_in_window(&self.db, parser.id, start, end).await?;

            let frequent = parse_errors::top_messages_in_window(
                &self.db,
                parser.id,
                start,
                end,
                self.settings.top_issues_per_parser,
            )
            .await?;

            top_issues.extend(frequent.into_iter().map(|m| TopIssue {
                parser: parser.name.clone(),
                error: m.message,
                count: m.count,
            }));
        }

        let avg_accuracy = if all_parsers.is_empty() {
            None
        } else {
            let sum: f64 = all_parsers.iter().map(|p| p.accuracy_score).sum();
            Some(sum / all_parsers.len() as f64)
        };

        let attempts = recipes_added + window_errors;
        let success_rate = if attempts > 0 {
            Some(100.0 * recipes_added as f64 / attempts as f64)
        } else {
            None
        };

        Ok(WeeklyReport {
            report_date: end,
            window_start: start,
            recipes_added,
            success_rate,
            avg_accuracy,
            error_count: window_errors,
            failing_parsers,
            accuracy_breakdown,
            top_issues,
        })
    }

    /// Store the report row and its artifact; both or neither
    async fn persist(&self, report: &WeeklyReport) -> Result<PathBuf, ReportError> {
        let path = self.reports_dir.join(artifact_file_name(report.report_date));
        let tmp_path = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(report).map_err(|e| artifact_err(&path, e))?;

        tokio::fs::create_dir_all(&self.reports_dir)
            .await
            .map_err(|e| artifact_err(&self.reports_dir, e))?;

        let mut tx = self.db.begin().await?;
        reports::insert_report(&mut tx, report).await?;

        if let Err(e) = tokio::fs::write(&tmp_path, json).await {
            remove_quietly(&tmp_path).await;
            return Err(artifact_err(&tmp_path, e));
        }

        let installed = install_artifact(&tmp_path, &path).await?;

        if let Err(e) = tx.commit().await {
            installed.roll_back().await;
            return Err(e.into());
        }

        installed.keep().await;
        Ok(path)
    }
}

/// An artifact renamed into place, with any earlier artifact at the same
/// path held aside until the report row commits
struct InstalledArtifact {
    path: PathBuf,
    backup: Option<PathBuf>,
}

impl InstalledArtifact {
    /// Drop the held-aside earlier artifact
    async fn keep(self) {
        if let Some(backup) = &self.backup {
            remove_quietly(backup).await;
        }
    }

    /// Remove the new artifact and put the earlier one back
    async fn roll_back(self) {
        remove_quietly(&self.path).await;
        if let Some(backup) = &self.backup {
            restore_backup(backup, &self.path).await;
        }
    }
}

async fn install_artifact(tmp_path: &Path, path: &Path) -> Result<InstalledArtifact, ReportError> {
    let replaces_file = tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false);

    let backup = if replaces_file {
        let backup = path.with_extension("json.bak");
        if let Err(e) = tokio::fs::rename(path, &backup).await {
            remove_quietly(tmp_path).await;
            return Err(artifact_err(path, e));
        }
        Some(backup)
    } else {
        None
    };

    if let Err(e) = tokio::fs::rename(tmp_path, path).await {
        remove_quietly(tmp_path).await;
        if let Some(backup) = &backup {
            restore_backup(backup, path).await;
        }
        return Err(artifact_err(path, e));
    }

    Ok(InstalledArtifact {
        path: path.to_path_buf(),
        backup,
    })
}

async fn restore_backup(backup: &Path, path: &Path) {
    if let Err(e) = tokio::fs::rename(backup, path).await {
        error!(
            backup = %backup.display(),
            path = %path.display(),
            error = %e,
            "Failed to restore earlier report artifact"
        );
    }
}

fn artifact_err(path: &Path, e: impl std::fmt::Display) -> ReportError {
    ReportError::Artifact {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove report artifact");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_artifact_name_uses_end_date() {
        let end = Utc.with_ymd_and_hms(2024, 1, 7, 23, 59, 0).unwrap();
        assert_eq!(artifact_file_name(end), "weekly_report_20240107.json");
    }

    async fn stage(dir: &Path, earlier: Option<&str>) -> (PathBuf, PathBuf) {
        let path = dir.join("weekly_report_20240107.json");
        let tmp_path = path.with_extension("json.tmp");
        if let Some(content) = earlier {
            tokio::fs::write(&path, content).await.unwrap();
        }
        tokio::fs::write(&tmp_path, "new").await.unwrap();
        (path, tmp_path)
    }

    #[tokio::test]
    async fn test_roll_back_restores_earlier_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let (path, tmp_path) = stage(dir.path(), Some("earlier")).await;

        let installed = install_artifact(&tmp_path, &path).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");

        installed.roll_back().await;
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "earlier");
        assert!(!path.with_extension("json.bak").exists());
        assert!(!tmp_path.exists());
    }

    #[tokio::test]
    async fn test_roll_back_without_earlier_artifact_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let (path, tmp_path) = stage(dir.path(), None).await;

        install_artifact(&tmp_path, &path).await.unwrap().roll_back().await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_keep_discards_backup() {
        let dir = tempfile::tempdir().unwrap();
        let (path, tmp_path) = stage(dir.path(), Some("earlier")).await;

        install_artifact(&tmp_path, &path).await.unwrap().keep().await;
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
        assert!(!path.with_extension("json.bak").exists());
    }
}
