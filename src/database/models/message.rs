use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// SMS / WhatsApp message, inbound or outbound
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: Uuid,
    pub lead_id: Option<Uuid>,
    pub channel: String,
    pub direction: String,
    pub body: String,
    pub media_url: Option<String>,
    pub twilio_message_sid: Option<String>,
    pub status: String,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub sender_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub lead_id: Option<Uuid>,
    pub channel: &'static str,
    pub direction: &'static str,
    pub body: String,
    pub media_url: Option<String>,
    pub twilio_message_sid: Option<String>,
    pub status: String,
    pub sender_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EmailMessage {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub message_id: String,
    pub to_email: String,
    pub subject: String,
    pub content: String,
    pub status: String,
    pub smtp_response: Option<String>,
    pub is_incoming: bool,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MessageTemplate {
    pub id: Uuid,
    pub name: String,
    pub content: String,
    pub content_sid: String,
    pub language: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}
