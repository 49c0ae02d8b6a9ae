use axum::{
    extract::{Path, State},
    Extension,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::UserRole;
use crate::database::models::UserProfile;
use crate::database::UserRepository;
use crate::error::ApiError;
use crate::handlers::protected::messaging::required_text;
use crate::middleware::{ApiJson, ApiResponse, ApiResult, AuthUser};
use crate::services::email::looks_like_email;
use crate::services::supabase_admin::NewAuthUser;
use crate::state::AppState;

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MIN_REASON_LEN: usize = 10;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RoleChangeRequest {
    pub role: Option<String>,
    pub reason: Option<String>,
}

pub fn parse_role(raw: Option<&str>) -> Result<UserRole, ApiError> {
    required_text("role", raw)?
        .parse::<UserRole>()
        .map_err(|e| ApiError::invalid_field("role", e))
}

/// Role changes must say why; the reason goes to the audit table
pub fn validate_reason(raw: Option<&str>) -> Result<&str, ApiError> {
    let reason = raw.map(str::trim).unwrap_or_default();
    if reason.chars().count() < MIN_REASON_LEN {
        return Err(ApiError::invalid_field(
            "reason",
            format!("Reason must be at least {} characters", MIN_REASON_LEN),
        ));
    }
    Ok(reason)
}

/// Undo an auth-user creation whose profile row could not be written
pub(crate) async fn rollback_auth_user(state: &AppState, user_id: Uuid) {
    match state.admin.delete_user(user_id).await {
        Ok(()) => tracing::warn!(user_id = %user_id, "Rolled back auth user after profile failure"),
        Err(e) => tracing::error!(user_id = %user_id, "Failed to roll back auth user: {}", e),
    }
}

/// GET /api/users - user profiles, newest first
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Vec<UserProfile>> {
    let profiles = UserRepository::new(state.pool()).list().await?;
    Ok(ApiResponse::success(profiles))
}

/// POST /api/users - create an auth user with a role and mirror it into user_profiles
pub async fn create_user(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    ApiJson(request): ApiJson<CreateUserRequest>,
) -> ApiResult<UserProfile> {
    let email = required_text("email", request.email.as_deref())?.to_lowercase();
    if !looks_like_email(&email) {
        return Err(ApiError::invalid_field("email", "Invalid email address"));
    }
    let password = required_text("password", request.password.as_deref())?;
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::invalid_field(
            "password",
            format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
        ));
    }
    let role = parse_role(request.role.as_deref())?;
    let full_name = request.full_name.as_deref().map(str::trim).filter(|n| !n.is_empty());

    let created = state
        .admin
        .create_user(&NewAuthUser {
            email: email.clone(),
            password: password.to_string(),
            role: role.as_str().to_string(),
            full_name: full_name.map(str::to_string),
            username: None,
        })
        .await?;

    let profile = match UserRepository::new(state.pool())
        .upsert(created.id, &email, Some(&email), full_name, role.as_str(), None)
        .await
    {
        Ok(profile) => profile,
        Err(e) => {
            rollback_auth_user(&state, created.id).await;
            return Err(e.into());
        }
    };

    tracing::info!(user_id = %created.id, role = %role, created_by = %admin.user_id, "Created user");
    Ok(ApiResponse::created(profile))
}

/// PUT /api/users/:id/role - body `{ "role": "...", "reason": "at least ten chars" }`
pub async fn change_user_role(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    ApiJson(request): ApiJson<RoleChangeRequest>,
) -> ApiResult<UserProfile> {
    let role = parse_role(request.role.as_deref())?;
    let reason = validate_reason(request.reason.as_deref())?;

    let users = UserRepository::new(state.pool());
    let current = users.get(id).await?;

    state.admin.set_role(id, role.as_str()).await?;
    let updated = users.set_role(id, role.as_str()).await?;

    if let Err(e) = users
        .record_role_change(id, current.role.as_deref(), role.as_str(), reason, admin.user_id)
        .await
    {
        tracing::warn!(user_id = %id, "Failed to record role change: {}", e);
    }

    tracing::info!(
        user_id = %id,
        old_role = current.role.as_deref().unwrap_or("-"),
        new_role = %role,
        changed_by = %admin.user_id,
        "Changed user role"
    );
    Ok(ApiResponse::success(updated))
}

/// DELETE /api/users/:id - remove the auth user; the profile row cascades
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> ApiResult<Value> {
    if id == admin.user_id {
        return Err(ApiError::bad_request("You cannot delete your own account"));
    }
    state.admin.delete_user(id).await?;
    tracing::info!(user_id = %id, deleted_by = %admin.user_id, "Deleted user");
    Ok(ApiResponse::success(json!({ "id": id, "deleted": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_must_be_known() {
        assert_eq!(parse_role(Some("agency_admin")).unwrap(), UserRole::AgencyAdmin);
        assert!(parse_role(Some("root")).is_err());
        assert!(parse_role(None).is_err());
    }

    #[test]
    fn reason_needs_ten_characters() {
        assert!(validate_reason(Some("too short")).is_err());
        assert!(validate_reason(Some("   padded   ")).is_err());
        assert_eq!(
            validate_reason(Some(" Promoted to team lead ")).unwrap(),
            "Promoted to team lead"
        );
    }
}
