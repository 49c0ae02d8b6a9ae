use axum::{extract::Request, middleware::Next, response::Response, Extension};

use super::auth::AuthUser;
use crate::error::ApiError;

/// Admin gate; must run after `session_auth_middleware`
pub async fn require_admin_middleware(
    Extension(user): Extension<AuthUser>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !user.is_admin {
        tracing::warn!(
            user_id = %user.user_id,
            email = user.email.as_deref().unwrap_or("-"),
            "Blocked admin access"
        );
        return Err(ApiError::forbidden("You are not authorized to perform this action"));
    }
    Ok(next.run(request).await)
}
