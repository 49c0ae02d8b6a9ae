use axum::{
    extract::{Path, Query, State},
    Extension,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use super::page_bounds;
use crate::auth::UserRole;
use crate::database::models::{NewTransfer, TransferOwner, TransferPatch, TransferStatus, TransferView};
use crate::database::TransferRepository;
use crate::error::ApiError;
use crate::middleware::{ApiJson, ApiResponse, ApiResult, AuthUser};
use crate::services::email::looks_like_email;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TransferQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub status: Option<String>,
}

fn parse_status(raw: Option<&str>) -> Result<Option<TransferStatus>, ApiError> {
    match raw.filter(|s| !s.is_empty()) {
        Some(raw) => Ok(Some(raw.parse::<TransferStatus>().map_err(|e| ApiError::invalid_field("status", e))?)),
        None => Ok(None),
    }
}

/// Admins, and the `admin` back-office role, manage the transfer board
pub fn can_manage_transfers(user: &AuthUser) -> bool {
    user.is_admin || user.role.as_deref().and_then(|r| r.parse::<UserRole>().ok()) == Some(UserRole::Admin)
}

/// Managers edit any transfer; everyone else only the ones they created or oversee
pub fn can_update_transfer(user: &AuthUser, owner: &TransferOwner) -> bool {
    can_manage_transfers(user)
        || owner.assigned_officer_id == Some(user.user_id)
        || owner.created_by_user_id == Some(user.user_id)
}

pub fn validate_new_transfer(transfer: &NewTransfer) -> Result<(), ApiError> {
    if transfer.title.trim().is_empty() {
        return Err(ApiError::invalid_field("title", "Title is required"));
    }
    if transfer.patient_name.trim().is_empty() {
        return Err(ApiError::invalid_field("patient_name", "Patient name is required"));
    }
    let emails = transfer.notification_emails.as_deref().unwrap_or_default();
    if emails.iter().any(|email| !looks_like_email(email.trim())) {
        return Err(ApiError::invalid_field("notification_emails", "Invalid email address"));
    }
    Ok(())
}

/// Checks the patch and returns the status it moves to, if any
pub fn validate_transfer_patch(patch: &TransferPatch) -> Result<Option<TransferStatus>, ApiError> {
    if matches!(patch.patient_name.as_deref(), Some(name) if name.trim().is_empty()) {
        return Err(ApiError::invalid_field("patient_name", "Patient name cannot be empty"));
    }
    if matches!(patch.title.as_deref(), Some(title) if title.trim().is_empty()) {
        return Err(ApiError::invalid_field("title", "Title cannot be empty"));
    }
    parse_status(patch.status.as_deref())
}

/// Audit rows are best effort; the change itself already landed
async fn record_audit(repo: &TransferRepository<'_>, transfer_id: Uuid, action: &str, details: Value) {
    if let Err(e) = repo.audit(transfer_id, action, details).await {
        tracing::warn!(transfer_id = %transfer_id, action, "Failed to write transfer audit row: {}", e);
    }
}

/// GET /api/transfers - newest first, with remaining-time fields
pub async fn list_transfers(
    State(state): State<AppState>,
    Query(query): Query<TransferQuery>,
) -> ApiResult<Vec<TransferView>> {
    let status = parse_status(query.status.as_deref())?;
    let (limit, offset) = page_bounds(query.limit, query.offset, &state.config.api);

    let now = Utc::now();
    let transfers = TransferRepository::new(state.pool())
        .list(limit, offset, status)
        .await?
        .into_iter()
        .map(|transfer| TransferView::at(transfer, now))
        .collect();

    Ok(ApiResponse::success(transfers))
}

/// POST /api/transfers
pub async fn create_transfer(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(body): ApiJson<NewTransfer>,
) -> ApiResult<TransferView> {
    if !can_manage_transfers(&user) {
        return Err(ApiError::forbidden("Only administrators can create transfers"));
    }
    validate_new_transfer(&body)?;

    let repo = TransferRepository::new(state.pool());
    let transfer = repo.create(&body, user.user_id).await?;
    tracing::info!(transfer_id = %transfer.id, "Created transfer");
    record_audit(
        &repo,
        transfer.id,
        "created",
        json!({ "status": TransferStatus::Pending, "created_by": user.user_id }),
    )
    .await;

    Ok(ApiResponse::created(TransferView::at(transfer, Utc::now())))
}

/// PATCH /api/transfers/:id - absent fields stay as they are
pub async fn update_transfer(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    ApiJson(patch): ApiJson<TransferPatch>,
) -> ApiResult<TransferView> {
    let status = validate_transfer_patch(&patch)?;

    let repo = TransferRepository::new(state.pool());
    let owner = repo.owner(id).await?;
    if !can_update_transfer(&user, &owner) {
        return Err(ApiError::forbidden("You cannot edit this transfer"));
    }

    let now = Utc::now();
    let transfer = repo.update(id, &patch, status, user.user_id, now).await?;

    if let Some(new_status) = status.filter(|s| s.as_str() != owner.status) {
        tracing::info!(transfer_id = %id, from = %owner.status, to = %new_status, "Transfer status changed");
        record_audit(
            &repo,
            id,
            "status_changed",
            json!({
                "old_status": owner.status,
                "new_status": new_status,
                "changed_by": user.user_id,
            }),
        )
        .await;
    }

    Ok(ApiResponse::success(TransferView::at(transfer, now)))
}
