//! Parser health records
//!
//! GET /parsers, GET /parsers/:name/errors, POST /parsers/:name/errors
//!
//! Ingestion reports its parse failures through the errors endpoint; they
//! feed the weekly report's top issues.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use pmon_common::db::models::{ParseErrorRecord, ParserStats};
use pmon_common::db::{parse_errors, parsers};

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Default and maximum number of errors returned by the listing
const DEFAULT_ERROR_LIMIT: usize = 100;
const MAX_ERROR_LIMIT: usize = 1000;

/// GET /parsers/:name/errors query parameters
#[derive(Debug, Default, Deserialize)]
pub struct ErrorListParams {
    pub limit: Option<usize>,
}

/// GET /parsers/:name/errors response
#[derive(Debug, Serialize)]
pub struct ErrorListResponse {
    pub parser: String,
    pub errors: Vec<ParseErrorRecord>,
}

/// POST /parsers/:name/errors request
#[derive(Debug, Deserialize)]
pub struct RecordErrorRequest {
    #[serde(default)]
    pub url: Option<String>,
    pub error_message: String,
}

/// POST /parsers/:name/errors response
#[derive(Debug, Serialize)]
pub struct RecordErrorResponse {
    pub id: i64,
    pub parser: String,
}

/// GET /parsers
pub async fn list_parsers(State(state): State<AppState>) -> ApiResult<Json<Vec<ParserStats>>> {
    Ok(Json(parsers::list_parsers(&state.db).await?))
}

/// GET /parsers/:name/errors
///
/// Most recent parse errors first.
pub async fn list_errors(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<ErrorListParams>,
) -> ApiResult<Json<ErrorListResponse>> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_ERROR_LIMIT)
        .clamp(1, MAX_ERROR_LIMIT);

    let parser = parsers::find_by_name(&state.db, &name)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Parser not found: {}", name)))?;

    let errors = parse_errors::recent_errors(&state.db, parser.id, limit).await?;

    Ok(Json(ErrorListResponse {
        parser: name,
        errors,
    }))
}

/// POST /parsers/:name/errors
pub async fn record_error(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(request): Json<RecordErrorRequest>,
) -> ApiResult<(StatusCode, Json<RecordErrorResponse>)> {
    if request.error_message.trim().is_empty() {
        return Err(ApiError::BadRequest("error_message must not be empty".to_string()));
    }

    let parser = parsers::find_by_name(&state.db, &name)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Parser not found: {}", name)))?;

    let id = parse_errors::record_parse_error(
        &state.db,
        parser.id,
        request.url.as_deref(),
        &request.error_message,
        pmon_common::time::now(),
    )
    .await?;

    info!(parser = %name, error_id = id, "Parse error recorded");

    Ok((
        StatusCode::CREATED,
        Json(RecordErrorResponse { id, parser: name }),
    ))
}

/// Build parser routes
pub fn parser_routes() -> Router<AppState> {
    Router::new()
        .route("/parsers", get(list_parsers))
        .route("/parsers/:name/errors", get(list_errors).post(record_error))
}
