use std::collections::HashMap;

use axum::{extract::State, Extension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::users::{rollback_auth_user, MIN_PASSWORD_LEN};
use crate::auth::UserRole;
use crate::database::{AgencyRepository, UserRepository};
use crate::error::ApiError;
use crate::middleware::{ApiJson, ApiResponse, ApiResult, AuthUser};
use crate::services::email::looks_like_email;
use crate::services::supabase_admin::NewAuthUser;
use crate::state::AppState;

const AGENCY_MEMBER_ROLE: &str = "agency_admin";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAgencyUserRequest {
    pub email: String,
    pub password: String,
    pub agency_name: String,
    pub username: String,
}

/// Request after normalisation; only built when every field is valid
#[derive(Debug, PartialEq)]
pub struct AgencyUserInput {
    pub email: String,
    pub password: String,
    pub agency_name: String,
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct CreatedAgencyUser {
    pub user_id: Uuid,
    pub email: String,
    pub username: String,
    pub agency_id: Uuid,
    pub agency_name: String,
}

fn valid_username(username: &str) -> bool {
    (3..=50).contains(&username.len()) && username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Collects every field error at once, the way the form shows them
pub fn validate_agency_user(request: CreateAgencyUserRequest) -> Result<AgencyUserInput, ApiError> {
    let email = request.email.trim().to_lowercase();
    let agency_name = request.agency_name.trim().to_string();
    let username = request.username.trim().to_lowercase();

    let mut errors = HashMap::new();
    if !looks_like_email(&email) {
        errors.insert("email".to_string(), "Enter a valid email address".to_string());
    }
    if request.password.chars().count() < MIN_PASSWORD_LEN {
        errors.insert(
            "password".to_string(),
            format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
        );
    }
    if agency_name.chars().count() < 3 {
        errors.insert("agencyName".to_string(), "Agency name must be at least 3 characters".to_string());
    }
    if !valid_username(&username) {
        errors.insert(
            "username".to_string(),
            "Username must be 3-50 characters of letters, digits and underscores".to_string(),
        );
    }

    if !errors.is_empty() {
        return Err(ApiError::validation_error("Invalid input", Some(errors)));
    }
    Ok(AgencyUserInput {
        email,
        password: request.password,
        agency_name,
        username,
    })
}

/// POST /api/agencies/users - create an agency login, its agency and membership
pub async fn create_agency_user(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthUser>,
    ApiJson(request): ApiJson<CreateAgencyUserRequest>,
) -> ApiResult<CreatedAgencyUser> {
    let input = validate_agency_user(request)?;

    let users = UserRepository::new(state.pool());
    if users.username_taken(&input.username).await? {
        return Err(ApiError::conflict(
            "This username is already taken. Please choose another one.",
        ));
    }

    let agency = AgencyRepository::new(state.pool())
        .find_or_create_by_name(&input.agency_name, admin.user_id)
        .await?;

    let created = state
        .admin
        .create_user(&NewAuthUser {
            email: input.email.clone(),
            password: input.password,
            role: UserRole::Agency.as_str().to_string(),
            full_name: None,
            username: Some(input.username.clone()),
        })
        .await?;

    if let Err(e) = AgencyRepository::new(state.pool())
        .add_member(agency.id, created.id, AGENCY_MEMBER_ROLE)
        .await
    {
        tracing::warn!(agency_id = %agency.id, user_id = %created.id, "Failed to link agency user: {}", e);
    }

    // A concurrent signup can still win the username; the unique index reports it as 409
    if let Err(e) = users
        .upsert(
            created.id,
            &input.email,
            Some(&input.username),
            None,
            UserRole::Agency.as_str(),
            Some(agency.id),
        )
        .await
    {
        rollback_auth_user(&state, created.id).await;
        return Err(e.into());
    }

    tracing::info!(
        user_id = %created.id,
        agency_id = %agency.id,
        created_by = %admin.user_id,
        "Created agency user"
    );
    Ok(ApiResponse::created(CreatedAgencyUser {
        user_id: created.id,
        email: input.email,
        username: input.username,
        agency_id: agency.id,
        agency_name: agency.name,
    }))
}
