use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};

use crate::state::AppState;

pub async fn root() -> Json<Value> {
    let version = env!("CARGO_PKG_VERSION");

    Json(json!({
        "success": true,
        "data": {
            "name": "Happy CRM API",
            "version": version,
            "description": "Patient transfer and lead management backend (Axum)",
            "endpoints": {
                "home": "/ (public)",
                "health": "/health (public)",
                "webhooks": "/api/twilio/webhook, /api/webhooks/deadline-notification (Twilio)",
                "cron": "/api/cron/check-transfer-deadlines, /api/cron/next-deadline (cron secret)",
                "auth": "/api/auth/whoami (protected)",
                "transfers": "/api/transfers (protected)",
                "agencies": "/api/agencies (protected)",
                "leads": "/api/leads[/:id] (protected)",
                "messaging": "/api/messaging/{sms,whatsapp,email}/send, /api/messaging/history, /api/messaging/note/save (protected)",
                "events": "/api/messages/events (protected)",
                "templates": "/api/templates/sync (protected)",
                "dashboard": "/api/dashboard/summary (protected)",
                "admin": "/api/users, /api/agencies/users, /api/admin/events (admin)",
                "debug": "/api/debug/cleanup-tables (debug secret)",
            }
        }
    }))
}

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.db.health_check().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::warn!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "data": {
                        "status": "degraded",
                        "timestamp": now,
                        "database_error": e.to_string()
                    }
                })),
            )
        }
    }
}
