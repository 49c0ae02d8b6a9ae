use axum::extract::{Query, State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::services::MessageEvent;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsQuery {
    pub since: Option<String>,
    /// Kept as text: an id that does not parse filters everything out
    pub lead_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventsPage {
    pub events: Vec<MessageEvent>,
    /// Cursor for the next poll
    pub latest_timestamp: DateTime<Utc>,
    /// Events held in the buffer, not just the ones returned
    pub event_count: usize,
}

/// `since` arrives as RFC 3339 or epoch milliseconds
pub fn parse_since(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    raw.parse::<i64>().ok().and_then(DateTime::from_timestamp_millis)
}

/// GET /api/messages/events?since&leadId - polling feed of message events
pub async fn poll_events(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Result<axum::Json<EventsPage>, ApiError> {
    let since = match query.since.as_deref().filter(|s| !s.is_empty()) {
        Some(raw) => Some(parse_since(raw).ok_or_else(|| ApiError::invalid_field("since", "Invalid timestamp"))?),
        None => None,
    };

    let events = match query.lead_id.as_deref().filter(|id| !id.is_empty()) {
        None => state.events.events_since(since, None).await,
        Some(raw) => match Uuid::parse_str(raw) {
            Ok(lead_id) => state.events.events_since(since, Some(lead_id)).await,
            Err(_) => Vec::new(),
        },
    };
    let latest_timestamp = events.last().map(|e| e.timestamp).unwrap_or_else(Utc::now);

    Ok(axum::Json(EventsPage {
        event_count: state.events.len().await,
        latest_timestamp,
        events,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn since_accepts_rfc3339_and_millis() {
        let rfc = parse_since("2025-03-01T10:00:00Z").unwrap();
        assert_eq!(rfc.timestamp_millis(), 1_740_823_200_000);
        assert_eq!(parse_since("1740823200000"), Some(rfc));
        assert_eq!(parse_since("yesterday"), None);
    }
}
