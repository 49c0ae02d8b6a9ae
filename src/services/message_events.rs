//! Short-lived buffer of messaging events that clients poll for "real-time" updates.
//!
//! Events live for a few minutes and the buffer holds a bounded number of them;
//! nothing here survives a restart.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::EventsConfig;
use crate::database::models::activity::preview;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    NewMessage,
    StatusUpdate,
    Typing,
    ReadReceipt,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub data: Value,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// Payload of an event before the buffer stamps it
#[derive(Debug, Clone)]
pub struct EventDraft {
    pub kind: EventKind,
    pub data: Value,
    pub lead_id: Option<Uuid>,
    pub from: Option<String>,
    pub body: Option<String>,
}

pub struct EventBuffer {
    // Insertion order; the front is the oldest entry
    events: RwLock<VecDeque<MessageEvent>>,
    ttl: Duration,
    max_events: usize,
}

impl EventBuffer {
    pub fn new(ttl: Duration, max_events: usize) -> Self {
        Self {
            events: RwLock::new(VecDeque::new()),
            ttl,
            max_events: max_events.max(1),
        }
    }

    pub fn from_config(config: &EventsConfig) -> Self {
        let ttl_secs = i64::try_from(config.ttl_secs).unwrap_or(i64::MAX / 1000);
        Self::new(Duration::seconds(ttl_secs), config.max_events)
    }

    pub async fn add_event(&self, draft: EventDraft) -> String {
        self.add_event_at(Utc::now(), draft).await
    }

    pub async fn add_event_at(&self, now: DateTime<Utc>, draft: EventDraft) -> String {
        let id = format!("evt_{}_{}", now.timestamp_millis(), Uuid::new_v4());
        let event = MessageEvent {
            id: id.clone(),
            kind: draft.kind,
            data: draft.data,
            timestamp: now,
            lead_id: draft.lead_id,
            from: draft.from,
            body: draft.body,
        };

        let mut events = self.events.write().await;
        self.evict_stale(&mut events, now);
        events.push_back(event);
        while events.len() > self.max_events {
            events.pop_front();
        }

        id
    }

    /// Events newer than `since` (all when absent), oldest first
    pub async fn events_since(&self, since: Option<DateTime<Utc>>, lead_id: Option<Uuid>) -> Vec<MessageEvent> {
        self.events_since_at(Utc::now(), since, lead_id).await
    }

    pub async fn events_since_at(
        &self,
        now: DateTime<Utc>,
        since: Option<DateTime<Utc>>,
        lead_id: Option<Uuid>,
    ) -> Vec<MessageEvent> {
        let events = self.events.read().await;
        let mut matching: Vec<MessageEvent> = events
            .iter()
            .filter(|e| !self.is_stale(e, now))
            .filter(|e| since.map_or(true, |since| e.timestamp > since))
            .filter(|e| lead_id.map_or(true, |lead| e.lead_id == Some(lead)))
            .cloned()
            .collect();
        matching.sort_by_key(|e| e.timestamp);
        matching
    }

    pub async fn lead_events(&self, lead_id: Uuid) -> Vec<MessageEvent> {
        self.events_since(None, Some(lead_id)).await
    }

    /// Drop expired events; returns how many were removed
    pub async fn cleanup(&self) -> usize {
        self.cleanup_at(Utc::now()).await
    }

    pub async fn cleanup_at(&self, now: DateTime<Utc>) -> usize {
        let mut events = self.events.write().await;
        self.evict_stale(&mut events, now)
    }

    pub async fn clear(&self) -> usize {
        let mut events = self.events.write().await;
        let removed = events.len();
        events.clear();
        removed
    }

    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }

    pub async fn new_message(
        &self,
        lead_id: Uuid,
        message_id: Uuid,
        from: &str,
        body: &str,
        channel: &str,
        media_url: Option<&str>,
    ) -> String {
        self.add_event(EventDraft {
            kind: EventKind::NewMessage,
            data: json!({
                "messageId": message_id,
                "channel": channel,
                "mediaUrl": media_url,
            }),
            lead_id: Some(lead_id),
            from: Some(from.to_string()),
            body: Some(preview(body, 100)),
        })
        .await
    }

    pub async fn status_update(
        &self,
        lead_id: Option<Uuid>,
        message_sid: &str,
        status: &str,
        error_code: Option<&str>,
        error_message: Option<&str>,
    ) -> String {
        self.add_event(EventDraft {
            kind: EventKind::StatusUpdate,
            data: json!({
                "messageId": message_sid,
                "status": status,
                "errorCode": error_code,
                "errorMessage": error_message,
            }),
            lead_id,
            from: None,
            body: None,
        })
        .await
    }

    pub async fn typing(&self, lead_id: Uuid, user_id: Uuid, is_typing: bool) -> String {
        self.add_event(EventDraft {
            kind: EventKind::Typing,
            data: json!({ "userId": user_id, "isTyping": is_typing }),
            lead_id: Some(lead_id),
            from: None,
            body: None,
        })
        .await
    }

    pub async fn read_receipt(&self, lead_id: Uuid, message_ids: &[String], read_by: Uuid) -> String {
        self.add_event(EventDraft {
            kind: EventKind::ReadReceipt,
            data: json!({ "messageIds": message_ids, "readBy": read_by }),
            lead_id: Some(lead_id),
            from: None,
            body: None,
        })
        .await
    }

    fn is_stale(&self, event: &MessageEvent, now: DateTime<Utc>) -> bool {
        now - event.timestamp > self.ttl
    }

    fn evict_stale(&self, events: &mut VecDeque<MessageEvent>, now: DateTime<Utc>) -> usize {
        let before = events.len();
        events.retain(|e| !self.is_stale(e, now));
        before - events.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn draft(lead_id: Option<Uuid>) -> EventDraft {
        EventDraft {
            kind: EventKind::NewMessage,
            data: json!({}),
            lead_id,
            from: None,
            body: None,
        }
    }

    fn buffer() -> EventBuffer {
        EventBuffer::new(Duration::minutes(5), 1000)
    }

    #[tokio::test]
    async fn ids_carry_millis_and_uuid() {
        let buffer = buffer();
        let id = buffer.add_event_at(t0(), draft(None)).await;
        let prefix = format!("evt_{}_", t0().timestamp_millis());
        assert!(id.starts_with(&prefix));
        assert!(Uuid::parse_str(&id[prefix.len()..]).is_ok());
    }

    #[tokio::test]
    async fn never_holds_more_than_the_cap() {
        let buffer = EventBuffer::new(Duration::minutes(5), 1000);
        let mut first_id = String::new();
        for i in 0..1005 {
            let id = buffer
                .add_event_at(t0() + Duration::milliseconds(i), draft(None))
                .await;
            if i == 0 {
                first_id = id;
            }
        }
        assert_eq!(buffer.len().await, 1000);

        let events = buffer.events_since_at(t0(), None, None).await;
        assert!(events.iter().all(|e| e.id != first_id));
    }

    #[tokio::test]
    async fn insertion_evicts_expired_events() {
        let buffer = buffer();
        buffer.add_event_at(t0(), draft(None)).await;
        buffer.add_event_at(t0() + Duration::minutes(1), draft(None)).await;
        buffer
            .add_event_at(t0() + Duration::minutes(5) + Duration::seconds(30), draft(None))
            .await;
        // Only the first one is older than five minutes
        assert_eq!(buffer.len().await, 2);
    }

    #[tokio::test]
    async fn expired_events_are_not_returned() {
        let buffer = buffer();
        buffer.add_event_at(t0(), draft(None)).await;
        let later = t0() + Duration::minutes(6);
        assert!(buffer.events_since_at(later, None, None).await.is_empty());
        assert_eq!(buffer.cleanup_at(later).await, 1);
        assert!(buffer.is_empty().await);
    }

    #[tokio::test]
    async fn since_is_strict_and_sorted() {
        let buffer = buffer();
        // Inserted out of timestamp order on purpose
        buffer.add_event_at(t0() + Duration::seconds(3), draft(None)).await;
        buffer.add_event_at(t0() + Duration::seconds(1), draft(None)).await;
        buffer.add_event_at(t0() + Duration::seconds(2), draft(None)).await;

        let now = t0() + Duration::seconds(10);
        let since = t0() + Duration::seconds(1);
        let events = buffer.events_since_at(now, Some(since), None).await;
        let stamps: Vec<_> = events.iter().map(|e| e.timestamp).collect();
        assert_eq!(stamps, vec![t0() + Duration::seconds(2), t0() + Duration::seconds(3)]);

        assert_eq!(buffer.events_since_at(now, None, None).await.len(), 3);
    }

    #[tokio::test]
    async fn filters_by_lead() {
        let buffer = buffer();
        let lead = Uuid::new_v4();
        buffer.add_event_at(t0(), draft(Some(lead))).await;
        buffer.add_event_at(t0(), draft(Some(Uuid::new_v4()))).await;
        buffer.add_event_at(t0(), draft(None)).await;

        let events = buffer.events_since_at(t0(), None, Some(lead)).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].lead_id, Some(lead));
    }

    #[tokio::test]
    async fn convenience_constructors_shape_payloads() {
        let buffer = buffer();
        let lead = Uuid::new_v4();
        let message_id = Uuid::new_v4();
        let long_body = "x".repeat(250);

        buffer
            .new_message(lead, message_id, "905551234567", &long_body, "whatsapp", None)
            .await;
        buffer
            .status_update(Some(lead), "SM123", "failed", Some("30003"), None)
            .await;

        let events = buffer.lead_events(lead).await;
        assert_eq!(events.len(), 2);
        let new_message = events
            .iter()
            .find(|e| e.kind == EventKind::NewMessage)
            .unwrap();
        assert_eq!(new_message.body.as_deref().map(str::len), Some(100));
        assert_eq!(new_message.data["channel"], "whatsapp");

        let rendered = serde_json::to_value(new_message).unwrap();
        assert_eq!(rendered["type"], "new_message");
        assert_eq!(rendered["leadId"], json!(lead));
    }

    #[tokio::test]
    async fn clear_empties_the_buffer() {
        let buffer = buffer();
        buffer.add_event_at(t0(), draft(None)).await;
        buffer.add_event_at(t0(), draft(None)).await;
        assert_eq!(buffer.clear().await, 2);
        assert_eq!(buffer.len().await, 0);
    }
}
