use axum::{extract::State, Extension};

use crate::database::models::{Agency, NewAgency};
use crate::database::AgencyRepository;
use crate::error::ApiError;
use crate::middleware::{ApiJson, ApiResponse, ApiResult, AuthUser};
use crate::services::email::looks_like_email;
use crate::state::AppState;

/// GET /api/agencies - ordered by name
pub async fn list_agencies(State(state): State<AppState>) -> ApiResult<Vec<Agency>> {
    let agencies = AgencyRepository::new(state.pool()).list().await?;
    Ok(ApiResponse::success(agencies))
}

/// POST /api/agencies
pub async fn create_agency(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(body): ApiJson<NewAgency>,
) -> ApiResult<Agency> {
    if body.name.trim().is_empty() {
        return Err(ApiError::invalid_field("name", "Agency name is required"));
    }
    if let Some(email) = body.email.as_deref().filter(|e| !e.is_empty()) {
        if !looks_like_email(email) {
            return Err(ApiError::invalid_field("email", "Invalid email address"));
        }
    }

    let agency = AgencyRepository::new(state.pool()).create(&body, user.user_id).await?;
    tracing::info!(agency_id = %agency.id, created_by = %user.user_id, "Created agency");
    Ok(ApiResponse::created(agency))
}
