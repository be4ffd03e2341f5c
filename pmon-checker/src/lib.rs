//! pmon-checker library interface
//!
//! Accuracy checks and weekly health reports for recipe parsers, plus the
//! HTTP surface that triggers them.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::services::{AccuracyChecker, RunGate, WeeklyReporter};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub checker: Arc<AccuracyChecker>,
    pub reporter: Arc<WeeklyReporter>,
    /// Parser checked when a trigger names none
    pub parser_name: String,
    /// Single-flight guard for triggered runs
    pub runs: RunGate,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        checker: AccuracyChecker,
        reporter: WeeklyReporter,
        parser_name: impl Into<String>,
    ) -> Self {
        Self {
            db,
            checker: Arc::new(checker),
            reporter: Arc::new(reporter),
            parser_name: parser_name.into(),
            runs: RunGate::new(),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::trigger_routes())
        .merge(api::report_routes())
        .merge(api::parser_routes())
        .merge(api::health_routes())
        .with_state(state)
}
