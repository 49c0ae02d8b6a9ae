use axum::extract::{Query, State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::models::{EmailMessage, LeadNote, Message};
use crate::database::{LeadRepository, MessageRepository, NoteRepository};
use crate::error::ApiError;
use crate::handlers::protected::page_bounds;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub lead_id: Option<Uuid>,
    /// sms, whatsapp, email or note
    pub channel: Option<String>,
    pub limit: Option<i64>,
}

/// One row of the unified conversation timeline
#[derive(Debug, Clone, Serialize)]
pub struct HistoryItem {
    pub id: String,
    pub channel: String,
    pub direction: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub content: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl From<Message> for HistoryItem {
    fn from(message: Message) -> Self {
        Self {
            id: format!("msg_{}", message.id),
            direction: if message.direction == "inbound" { "inbound" } else { "outbound" },
            channel: message.channel,
            subject: None,
            content: message.body,
            status: message.status,
            media_url: message.media_url,
            timestamp: message.created_at,
        }
    }
}

impl From<EmailMessage> for HistoryItem {
    fn from(email: EmailMessage) -> Self {
        Self {
            id: format!("email_{}", email.id),
            channel: "email".to_string(),
            direction: if email.is_incoming { "inbound" } else { "outbound" },
            subject: Some(email.subject),
            content: email.content,
            status: email.status,
            media_url: None,
            timestamp: email.sent_at,
        }
    }
}

impl From<LeadNote> for HistoryItem {
    fn from(note: LeadNote) -> Self {
        Self {
            id: format!("note_{}", note.id),
            channel: "note".to_string(),
            direction: "internal",
            subject: None,
            content: note.content,
            status: note.note_type,
            media_url: None,
            timestamp: note.created_at,
        }
    }
}

/// Newest first across all sources, truncated to `limit`
pub fn merge_timeline(mut items: Vec<HistoryItem>, channel: Option<&str>, limit: usize) -> Vec<HistoryItem> {
    if let Some(channel) = channel.filter(|c| *c != "all") {
        items.retain(|item| item.channel == channel);
    }
    items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    items.truncate(limit);
    items
}

/// GET /api/messaging/history?leadId - messages, e-mails and notes of a lead
pub async fn message_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Vec<HistoryItem>> {
    let lead_id = query
        .lead_id
        .ok_or_else(|| ApiError::invalid_field("leadId", "Lead ID is required"))?;
    let (limit, _) = page_bounds(query.limit, None, &state.config.api);

    LeadRepository::new(state.pool()).contact(lead_id).await?;

    let messages = MessageRepository::new(state.pool());
    let notes = NoteRepository::new(state.pool());
    let (texts, emails, lead_notes) = tokio::try_join!(
        messages.for_lead(lead_id, limit),
        messages.emails_for_lead(lead_id, limit),
        notes.for_lead(lead_id, limit, 0),
    )?;

    let items: Vec<HistoryItem> = texts
        .into_iter()
        .map(HistoryItem::from)
        .chain(emails.into_iter().map(HistoryItem::from))
        .chain(lead_notes.into_iter().map(HistoryItem::from))
        .collect();

    Ok(ApiResponse::success(merge_timeline(
        items,
        query.channel.as_deref(),
        limit as usize,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn item(channel: &str, minutes_ago: i64) -> HistoryItem {
        HistoryItem {
            id: format!("{}_{}", channel, minutes_ago),
            channel: channel.to_string(),
            direction: "outbound",
            subject: None,
            content: "x".to_string(),
            status: "sent".to_string(),
            media_url: None,
            timestamp: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[test]
    fn timeline_is_newest_first_and_limited() {
        let merged = merge_timeline(vec![item("sms", 10), item("email", 1), item("note", 5)], None, 2);
        let ids: Vec<_> = merged.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["email_1", "note_5"]);
    }

    #[test]
    fn channel_filter_keeps_one_source() {
        let merged = merge_timeline(vec![item("sms", 3), item("whatsapp", 2), item("sms", 1)], Some("sms"), 10);
        assert_eq!(merged.len(), 2);
        assert!(merged.iter().all(|i| i.channel == "sms"));
        assert_eq!(merge_timeline(vec![item("sms", 3)], Some("all"), 10).len(), 1);
    }
}
