//! Run triggers
//!
//! POST /accuracy/check, POST /reports/weekly
//!
//! Both start the run in the background and answer immediately. A second
//! trigger for a run still in flight gets 409.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::services::WEEKLY_REPORT_KEY;
use crate::AppState;

/// POST /accuracy/check query parameters
#[derive(Debug, Default, Deserialize)]
pub struct CheckParams {
    /// Parser to check; the configured parser when absent
    pub parser: Option<String>,
}

/// 202 response body
#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parser: Option<String>,
}

/// POST /accuracy/check
pub async fn start_accuracy_check(
    State(state): State<AppState>,
    Query(params): Query<CheckParams>,
) -> ApiResult<(StatusCode, Json<TriggerResponse>)> {
    let parser = params
        .parser
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| state.parser_name.clone());

    let guard = state.runs.try_acquire(&parser).ok_or_else(|| {
        ApiError::Conflict(format!("Accuracy check already running for {}", parser))
    })?;

    info!(parser = %parser, "Accuracy check triggered");

    let checker = state.checker.clone();
    let task_parser = parser.clone();
    tokio::spawn(async move {
        let _guard = guard;
        let outcome = checker.check_parser_accuracy(&task_parser).await;
        info!(parser = %task_parser, outcome = ?outcome, "Background accuracy check finished");
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(TriggerResponse {
            message: "Accuracy check started".to_string(),
            parser: Some(parser),
        }),
    ))
}

/// POST /reports/weekly
pub async fn start_weekly_report(
    State(state): State<AppState>,
) -> ApiResult<(StatusCode, Json<TriggerResponse>)> {
    let guard = state
        .runs
        .try_acquire(WEEKLY_REPORT_KEY)
        .ok_or_else(|| ApiError::Conflict("Weekly report already running".to_string()))?;

    info!("Weekly report triggered");

    let reporter = state.reporter.clone();
    tokio::spawn(async move {
        let _guard = guard;
        let generated = reporter.generate_weekly_report().await.is_some();
        info!(generated, "Background weekly report finished");
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(TriggerResponse {
            message: "Report generation started".to_string(),
            parser: None,
        }),
    ))
}

/// Build trigger routes
pub fn trigger_routes() -> Router<AppState> {
    Router::new()
        .route("/accuracy/check", post(start_accuracy_check))
        .route("/reports/weekly", post(start_weekly_report))
}
