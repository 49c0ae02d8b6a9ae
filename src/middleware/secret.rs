use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use serde_json::{json, Value};
use subtle::ConstantTimeEq;

use crate::database::ActivityLog;
use crate::error::ApiError;
use crate::state::AppState;

pub const CRON_JOB_NAME: &str = "deadline-checker";

/// Constant-time comparison; an unset expected secret never matches
pub fn secret_matches(provided: Option<&str>, expected: Option<&str>) -> bool {
    match (provided, expected) {
        (Some(provided), Some(expected)) if !expected.is_empty() => {
            provided.as_bytes().ct_eq(expected.as_bytes()).into()
        }
        _ => false,
    }
}

/// Bearer header, else the `token` query parameter
pub fn cron_token(headers: &HeaderMap, query: Option<&str>) -> Option<String> {
    let from_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string());
    from_header.or_else(|| query_param(query, "token"))
}

pub fn query_param(query: Option<&str>, name: &str) -> Option<String> {
    query.and_then(|q| {
        url::form_urlencoded::parse(q.as_bytes())
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    })
}

/// Who kicked off a cron run, from the headers schedulers send
pub fn trigger_source(headers: &HeaderMap, query: Option<&str>) -> (String, Value) {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string);

    if let Some(run_id) = header("x-github-run-id").or_else(|| query_param(query, "github_run_id")) {
        return ("github_actions".to_string(), json!({ "github_run_id": run_id }));
    }
    if let Some(external) = header("x-external-cron") {
        return (
            format!("external_{}", external),
            json!({
                "external_source": external,
                "server": header("x-cron-server"),
                "user_agent": header("user-agent"),
            }),
        );
    }
    (
        "manual".to_string(),
        json!({
            "ip": header("x-forwarded-for").or_else(|| header("x-real-ip")),
            "user_agent": header("user-agent"),
        }),
    )
}

/// Shared-secret gate for the cron endpoints; failed attempts are logged
pub async fn cron_secret_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let query = request.uri().query().map(str::to_string);
    let token = cron_token(&headers, query.as_deref());

    if secret_matches(token.as_deref(), state.config.security.cron_secret.as_deref()) {
        return Ok(next.run(request).await);
    }

    let (triggered_by, source_info) = trigger_source(&headers, query.as_deref());
    tracing::error!(
        triggered_by = %triggered_by,
        token_provided = token.is_some(),
        secret_configured = state.config.security.cron_secret.is_some(),
        "Rejected cron request"
    );

    let metadata = json!({
        "source_info": source_info,
        "auth_failure": true,
        "token_provided": token.is_some(),
        "api_token_configured": state.config.security.cron_secret.is_some(),
    });
    let pool = state.pool().clone();
    tokio::spawn(async move {
        if let Err(e) = ActivityLog::new(&pool)
            .cron_auth_failure(CRON_JOB_NAME, &triggered_by, metadata)
            .await
        {
            tracing::warn!("Failed to log cron auth failure: {}", e);
        }
    });

    Err(ApiError::unauthorized("Unauthorized"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn secret_comparison() {
        assert!(secret_matches(Some("s3cret"), Some("s3cret")));
        assert!(!secret_matches(Some("s3cret"), Some("other")));
        assert!(!secret_matches(None, Some("s3cret")));
        assert!(!secret_matches(Some(""), Some("")));
        assert!(!secret_matches(Some("anything"), None));
    }

    #[test]
    fn token_from_header_or_query() {
        let mut headers = HeaderMap::new();
        assert_eq!(cron_token(&headers, Some("token=abc&x=1")), Some("abc".to_string()));
        headers.insert("authorization", HeaderValue::from_static("Bearer xyz"));
        assert_eq!(cron_token(&headers, Some("token=abc")), Some("xyz".to_string()));
        assert_eq!(cron_token(&HeaderMap::new(), None), None);
    }

    #[test]
    fn trigger_sources() {
        let mut headers = HeaderMap::new();
        assert_eq!(trigger_source(&headers, None).0, "manual");
        assert_eq!(trigger_source(&headers, Some("github_run_id=42")).0, "github_actions");
        headers.insert("x-external-cron", HeaderValue::from_static("plesk"));
        assert_eq!(trigger_source(&headers, None).0, "external_plesk");
    }
}
