use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
    Extension,
};

use super::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Per-user send budget for the messaging endpoints; runs after session auth
pub async fn messaging_rate_limit_middleware(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if state.messaging_limiter.check_key(&user.user_id).is_err() {
        tracing::warn!(user_id = %user.user_id, "Messaging rate limit exceeded");
        return Err(ApiError::too_many_requests(format!(
            "Too many messages. Limit is {} per minute.",
            state.config.api.messaging_rate_limit_per_minute
        )));
    }
    Ok(next.run(request).await)
}
