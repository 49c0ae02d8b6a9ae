use axum::{extract::State, Extension};
use serde_json::{json, Value};

use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::state::AppState;

/// DELETE /api/admin/events - drop every buffered message event
pub async fn clear_events(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult<Value> {
    let cleared = state.events.clear().await;
    tracing::info!(user_id = %user.user_id, cleared, "Cleared message event buffer");
    Ok(ApiResponse::success(json!({ "cleared": cleared })))
}
