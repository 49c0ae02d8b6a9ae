// handlers/protected/mod.rs - Protected handlers (session token required)
//
// Security Level: hosted-auth session token (Bearer header or session cookie)
// Route Prefix: /api/*
// Middleware: session_auth_middleware inserts `AuthUser`; the send endpoints
// add messaging_rate_limit_middleware on top.
pub mod agencies;
pub mod auth;
pub mod dashboard;
pub mod events;
pub mod leads;
pub mod messaging;
pub mod templates;
pub mod transfers;

use crate::config::ApiConfig;

/// Clamp client paging to the configured bounds
pub fn page_bounds(limit: Option<i64>, offset: Option<i64>, api: &ApiConfig) -> (i64, i64) {
    let limit = limit.unwrap_or(api.default_page_size).clamp(1, api.max_page_size.max(1));
    let offset = offset.unwrap_or(0).max(0);
    (limit, offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paging_is_clamped() {
        let api = ApiConfig {
            messaging_rate_limit_per_minute: 10,
            max_request_size_bytes: 1024,
            default_page_size: 50,
            max_page_size: 200,
        };
        assert_eq!(page_bounds(None, None, &api), (50, 0));
        assert_eq!(page_bounds(Some(500), Some(-3), &api), (200, 0));
        assert_eq!(page_bounds(Some(0), Some(20), &api), (1, 20));
    }
}
