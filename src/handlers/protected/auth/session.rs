use axum::Extension;

use crate::middleware::{ApiResponse, ApiResult, AuthUser};

/// GET /api/auth/whoami - Current session user
///
/// ```json
/// {
///   "success": true,
///   "data": {
///     "user_id": "1b7c…",
///     "email": "ops@example.com",
///     "role": "agency_admin",
///     "is_admin": false
///   }
/// }
/// ```
pub async fn whoami(Extension(user): Extension<AuthUser>) -> ApiResult<AuthUser> {
    Ok(ApiResponse::success(user))
}
