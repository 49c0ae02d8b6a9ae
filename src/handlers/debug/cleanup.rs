use axum::extract::{RawQuery, State};
use serde::Serialize;

use crate::database::{CleanupResult, UserRepository};
use crate::error::ApiError;
use crate::middleware::secret::{query_param, secret_matches};
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CleanupReport {
    pub message: &'static str,
    pub results: Vec<CleanupResult>,
}

/// POST /api/debug/cleanup-tables?secret=
///
/// Empties the user tracking tables. Each table is attempted even when an
/// earlier one fails; the per-table outcome is in `results`.
pub async fn cleanup_tables(State(state): State<AppState>, RawQuery(query): RawQuery) -> ApiResult<CleanupReport> {
    let provided = query_param(query.as_deref(), "secret");
    if !secret_matches(provided.as_deref(), state.config.security.debug_secret.as_deref()) {
        tracing::warn!(secret_provided = provided.is_some(), "Rejected debug cleanup request");
        return Err(ApiError::unauthorized("Unauthorized"));
    }

    tracing::info!("Starting table cleanup");
    let results = UserRepository::new(state.pool()).cleanup_tracking_tables().await;

    Ok(ApiResponse::success(CleanupReport {
        message: "Cleanup completed",
        results,
    }))
}

/// GET /api/debug/cleanup-tables
pub async fn cleanup_tables_get() -> ApiError {
    ApiError::method_not_allowed("Use POST method")
}
