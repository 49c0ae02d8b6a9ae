use axum::{
    extract::{Path, Query, State},
    Extension,
};
use serde_json::{json, Value};
use uuid::Uuid;

use super::page_bounds;
use crate::database::models::lead::{LEAD_PRIORITIES, LEAD_SOURCES};
use crate::database::models::{Lead, LeadFilter, LeadPatch, NewActivity, NewLead};
use crate::database::{ActivityLog, LeadRepository};
use crate::error::ApiError;
use crate::middleware::{ApiJson, ApiResponse, ApiResult, AuthUser};
use crate::services::email::looks_like_email;
use crate::state::AppState;

fn check_choice(field: &str, value: Option<&str>, allowed: &[&str]) -> Result<(), ApiError> {
    match value {
        Some(v) if !allowed.contains(&v) => Err(ApiError::invalid_field(
            field,
            format!("Must be one of: {}", allowed.join(", ")),
        )),
        _ => Ok(()),
    }
}

fn check_email(value: Option<&str>) -> Result<(), ApiError> {
    match value.filter(|e| !e.is_empty()) {
        Some(email) if !looks_like_email(email) => Err(ApiError::invalid_field("contact_email", "Invalid email address")),
        _ => Ok(()),
    }
}

pub fn validate_new_lead(lead: &NewLead) -> Result<(), ApiError> {
    if lead.lead_name.trim().is_empty() {
        return Err(ApiError::invalid_field("lead_name", "Lead name is required"));
    }
    check_email(lead.contact_email.as_deref())?;
    check_choice("source", lead.source.as_deref(), &LEAD_SOURCES)?;
    check_choice("priority", lead.priority.as_deref(), &LEAD_PRIORITIES)
}

pub fn validate_patch(patch: &LeadPatch) -> Result<(), ApiError> {
    if matches!(patch.lead_name.as_deref(), Some(name) if name.trim().is_empty()) {
        return Err(ApiError::invalid_field("lead_name", "Lead name cannot be empty"));
    }
    check_email(patch.contact_email.as_deref())?;
    check_choice("source", patch.source.as_deref(), &LEAD_SOURCES)?;
    check_choice("priority", patch.priority.as_deref(), &LEAD_PRIORITIES)
}

/// GET /api/leads?stage_id&assigned_user_id&search&limit&offset
pub async fn list_leads(State(state): State<AppState>, Query(filter): Query<LeadFilter>) -> ApiResult<Vec<Lead>> {
    let (limit, offset) = page_bounds(filter.limit, filter.offset, &state.config.api);
    let leads = LeadRepository::new(state.pool()).list(&filter, limit, offset).await?;
    Ok(ApiResponse::success(leads))
}

/// POST /api/leads
pub async fn create_lead(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ApiJson(body): ApiJson<NewLead>,
) -> ApiResult<Lead> {
    validate_new_lead(&body)?;

    let lead = LeadRepository::new(state.pool()).create(&body, user.user_id).await?;
    ActivityLog::new(state.pool())
        .record(
            NewActivity::for_lead(lead.id, "lead_created", format!("Lead created: {}", lead.lead_name))
                .by(user.user_id),
        )
        .await;

    Ok(ApiResponse::created(lead))
}

/// GET /api/leads/:id
pub async fn get_lead(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Lead> {
    let lead = LeadRepository::new(state.pool()).get(id).await?;
    Ok(ApiResponse::success(lead))
}

/// PATCH /api/leads/:id - absent fields stay as they are
pub async fn update_lead(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    ApiJson(patch): ApiJson<LeadPatch>,
) -> ApiResult<Lead> {
    validate_patch(&patch)?;

    let lead = LeadRepository::new(state.pool()).update(id, &patch, user.user_id).await?;
    ActivityLog::new(state.pool())
        .record(NewActivity::for_lead(lead.id, "lead_updated", "Lead updated").by(user.user_id))
        .await;

    Ok(ApiResponse::success(lead))
}

/// DELETE /api/leads/:id
pub async fn delete_lead(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Value> {
    LeadRepository::new(state.pool()).delete(id).await?;
    tracing::info!(lead_id = %id, "Deleted lead");
    Ok(ApiResponse::success(json!({ "id": id, "deleted": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_lead(name: &str) -> NewLead {
        NewLead {
            lead_name: name.to_string(),
            contact_email: None,
            contact_phone: Some("05551234567".to_string()),
            pipeline_id: None,
            stage_id: None,
            source: Some("website".to_string()),
            priority: None,
            lead_value: None,
            description: None,
            follow_up_date: None,
            assigned_user_id: None,
        }
    }

    #[test]
    fn accepts_minimal_lead() {
        assert!(validate_new_lead(&new_lead("Mehmet Kaya")).is_ok());
    }

    #[test]
    fn rejects_blank_name_and_unknown_choices() {
        assert!(validate_new_lead(&new_lead("   ")).is_err());

        let mut lead = new_lead("Mehmet Kaya");
        lead.source = Some("billboard".to_string());
        let err = validate_new_lead(&lead).unwrap_err();
        assert_eq!(err.to_json()["field_errors"]["source"].as_str().map(|s| s.starts_with("Must be one of")), Some(true));

        let mut lead = new_lead("Mehmet Kaya");
        lead.priority = Some("critical".to_string());
        assert!(validate_new_lead(&lead).is_err());
    }

    #[test]
    fn patch_checks_only_present_fields() {
        assert!(validate_patch(&LeadPatch::default()).is_ok());
        let patch = LeadPatch {
            contact_email: Some("not-an-email".to_string()),
            ..LeadPatch::default()
        };
        assert!(validate_patch(&patch).is_err());
    }
}
