//! Weekly report lookup
//!
//! GET /reports/latest

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use pmon_common::db::models::WeeklyReport;
use pmon_common::db::reports;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// GET /reports/latest response
#[derive(Debug, Serialize)]
pub struct LatestReportResponse {
    pub id: i64,
    pub report: WeeklyReport,
}

/// GET /reports/latest
pub async fn get_latest_report(
    State(state): State<AppState>,
) -> ApiResult<Json<LatestReportResponse>> {
    let record = reports::latest_report(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound("No weekly report generated yet".to_string()))?;

    Ok(Json(LatestReportResponse {
        id: record.id,
        report: record.report()?,
    }))
}

/// Build report routes
pub fn report_routes() -> Router<AppState> {
    Router::new().route("/reports/latest", get(get_latest_report))
}
