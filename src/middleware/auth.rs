use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::{decode_session_token, is_admin, AuthError, Claims};
use crate::error::ApiError;
use crate::state::AppState;

/// Cookie the web client keeps the hosted-auth access token in
pub const SESSION_COOKIE: &str = "sb-access-token";

/// Authenticated user context extracted from the session token
#[derive(Clone, Debug, Serialize)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub role: Option<String>,
    pub is_admin: bool,
}

impl AuthUser {
    pub fn from_claims(claims: &Claims, admin_emails: &[String]) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email.clone(),
            role: claims.app_role().map(str::to_string),
            is_admin: is_admin(claims, admin_emails),
        }
    }
}

/// Session middleware: validates the token and injects `AuthUser`
pub async fn session_auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_session_token(&headers)?;
    let claims = decode_session_token(&token, &state.config.security.jwt_secret)?;

    let auth_user = AuthUser::from_claims(&claims, &state.config.security.admin_emails);
    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}

/// Bearer header first, then the session cookie
pub fn extract_session_token(headers: &HeaderMap) -> Result<String, AuthError> {
    if let Some(value) = headers.get(axum::http::header::AUTHORIZATION) {
        let value = value.to_str().map_err(|_| AuthError::MalformedHeader)?;
        let token = value.strip_prefix("Bearer ").ok_or(AuthError::MalformedHeader)?;
        if token.trim().is_empty() {
            return Err(AuthError::MissingToken);
        }
        return Ok(token.trim().to_string());
    }

    cookie_value(headers, SESSION_COOKIE).ok_or(AuthError::MissingToken)
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(axum::http::header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_header_wins() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer abc.def"));
        headers.insert("cookie", HeaderValue::from_static("sb-access-token=zzz"));
        assert_eq!(extract_session_token(&headers).unwrap(), "abc.def");
    }

    #[test]
    fn falls_back_to_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "cookie",
            HeaderValue::from_static("theme=dark; sb-access-token=tok.en.value; other=1"),
        );
        assert_eq!(extract_session_token(&headers).unwrap(), "tok.en.value");
    }

    #[test]
    fn rejects_non_bearer_schemes() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Basic Zm9vOmJhcg=="));
        assert!(matches!(extract_session_token(&headers), Err(AuthError::MalformedHeader)));
    }

    #[test]
    fn missing_everything() {
        assert!(matches!(
            extract_session_token(&HeaderMap::new()),
            Err(AuthError::MissingToken)
        ));
    }
}
