//! Accuracy run controller
//!
//! One run: look up the parser's health record, sample recent recipes,
//! re-fetch each sampled page live, score the stored extraction against it,
//! and write the mean score and per-item time back to the record.
//!
//! The record is written once, at the end, in a single statement. A run that
//! compared nothing, or that failed, leaves the previous metrics in place.

use chrono::Duration as ChronoDuration;
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use pmon_common::db::models::AccuracyMetrics;
use pmon_common::db::parsers;

use crate::services::fuzzy_comparator::compare_ingredients;
use crate::services::live_fetcher::IngredientFetcher;
use crate::services::pacing::PacingPolicy;
use crate::services::sampler::Sampler;

/// Result of one accuracy run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AccuracyRunOutcome {
    /// No health record for the parser; nothing was done
    ParserNotFound { parser: String },
    /// The sample was empty
    NothingToCheck { parser: String },
    /// Recipes were sampled but none could be compared; record untouched
    NoComparableItems { parser: String, sampled: usize },
    /// Metrics written
    Updated(AccuracyRunSummary),
    /// Unexpected failure; record untouched
    Failed { parser: String, error: String },
}

/// Metrics of a run that updated the health record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccuracyRunSummary {
    pub parser: String,
    pub sampled: usize,
    pub compared: usize,
    pub accuracy_score: f64,
    pub avg_parse_time: f64,
    pub finished_at: chrono::DateTime<chrono::Utc>,
}

pub struct AccuracyChecker {
    db: SqlitePool,
    sampler: Sampler,
    fetcher: Arc<dyn IngredientFetcher>,
    pacing: PacingPolicy,
    next_run_interval: Option<ChronoDuration>,
}

impl AccuracyChecker {
    pub fn new(db: SqlitePool, sampler: Sampler, fetcher: Arc<dyn IngredientFetcher>) -> Self {
        Self {
            db,
            sampler,
            fetcher,
            pacing: PacingPolicy::default(),
            next_run_interval: Some(ChronoDuration::days(7)),
        }
    }

    pub fn with_pacing(mut self, pacing: PacingPolicy) -> Self {
        self.pacing = pacing;
        self
    }

    /// Advisory cadence written to `next_run`; `None` leaves it unchanged
    pub fn with_next_run_interval(mut self, interval: Option<ChronoDuration>) -> Self {
        self.next_run_interval = interval;
        self
    }

    /// Run one accuracy check for `parser_name`
    ///
    /// Never fails: errors are logged and reported as
    /// [`AccuracyRunOutcome::Failed`].
    pub async fn check_parser_accuracy(&self, parser_name: &str) -> AccuracyRunOutcome {
        match self.run(parser_name).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(parser = %parser_name, error = %e, "Error checking accuracy");
                AccuracyRunOutcome::Failed {
                    parser: parser_name.to_string(),
                    error: e.to_string(),
                }
            }
        }
    }

    async fn run(&self, parser_name: &str) -> pmon_common::Result<AccuracyRunOutcome> {
        let Some(parser) = parsers::find_by_name(&self.db, parser_name).await? else {
            warn!(parser = %parser_name, "Parser not provisioned, skipping accuracy check");
            return Ok(AccuracyRunOutcome::ParserNotFound {
                parser: parser_name.to_string(),
            });
        };

        let sample = self.sampler.sample().await;
        if sample.is_empty() {
            info!(parser = %parser_name, "No recipes found to check accuracy");
            return Ok(AccuracyRunOutcome::NothingToCheck {
                parser: parser_name.to_string(),
            });
        }

        let started = Instant::now();
        let mut total_accuracy = 0.0;
        let mut compared = 0usize;

        for recipe in &sample {
            let Some(url) = recipe.live_url() else {
                debug!(parser = %parser_name, "Skipping sampled recipe without URL");
                continue;
            };

            match self.fetcher.fetch_ingredients(url).await {
                Some(live) if !live.is_empty() => {
                    let parsed = recipe.parsed_lines();
                    if parsed.is_empty() {
                        debug!(url = %url, "Skipping recipe without parsed ingredients");
                    } else {
                        let score = compare_ingredients(&parsed, &live);
                        debug!(url = %url, score, "Compared parsed ingredients with live page");
                        total_accuracy += score;
                        compared += 1;
                    }
                }
                _ => debug!(url = %url, "Skipping recipe, live ingredients unavailable"),
            }

            self.pacing.pause().await;
        }

        if compared == 0 {
            info!(
                parser = %parser_name,
                sampled = sample.len(),
                "No sampled recipe could be compared, keeping previous metrics"
            );
            return Ok(AccuracyRunOutcome::NoComparableItems {
                parser: parser_name.to_string(),
                sampled: sample.len(),
            });
        }

        let finished_at = pmon_common::time::now();
        let metrics = AccuracyMetrics {
            accuracy_score: total_accuracy / compared as f64,
            avg_parse_time: started.elapsed().as_secs_f64() / compared as f64,
            last_run: finished_at,
            last_run_recipes: compared as i64,
            next_run: self.next_run_interval.map(|interval| finished_at + interval),
        };

        parsers::update_accuracy_metrics(&self.db, parser.id, &metrics).await?;

        info!(
            parser = %parser_name,
            sampled = sample.len(),
            compared,
            accuracy = metrics.accuracy_score,
            avg_parse_time = metrics.avg_parse_time,
            "Accuracy check completed"
        );

        Ok(AccuracyRunOutcome::Updated(AccuracyRunSummary {
            parser: parser_name.to_string(),
            sampled: sample.len(),
            compared,
            accuracy_score: metrics.accuracy_score,
            avg_parse_time: metrics.avg_parse_time,
            finished_at,
        }))
    }
}
