use sqlx::PgPool;
use uuid::Uuid;

use super::manager::DatabaseError;
use super::models::{EmailMessage, LeadNote, Message, MessageTemplate, NewMessage};

const MESSAGE_COLUMNS: &str = r#"
    id, lead_id, channel, direction, body, media_url, twilio_message_sid,
    status, error_code, error_message, sender_id, created_at
"#;

pub struct MessageRepository<'a> {
    pool: &'a PgPool,
}

/// Fields written to `email_messages` after a successful SMTP send
#[derive(Debug, Clone)]
pub struct SentEmail<'m> {
    pub lead_id: Uuid,
    pub message_id: &'m str,
    pub to_email: &'m str,
    pub subject: &'m str,
    pub content: &'m str,
    pub smtp_response: &'m str,
}

impl<'a> MessageRepository<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, message: &NewMessage) -> Result<Message, DatabaseError> {
        let sql = format!(
            r#"
            INSERT INTO messages
                (lead_id, channel, direction, body, media_url, twilio_message_sid, status, sender_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {MESSAGE_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, Message>(&sql)
            .bind(message.lead_id)
            .bind(message.channel)
            .bind(message.direction)
            .bind(&message.body)
            .bind(&message.media_url)
            .bind(&message.twilio_message_sid)
            .bind(&message.status)
            .bind(message.sender_id)
            .fetch_one(self.pool)
            .await?;
        Ok(row)
    }

    /// Apply a delivery status callback; returns the lead the message belongs to
    pub async fn update_status(
        &self,
        twilio_message_sid: &str,
        status: &str,
        error_code: Option<&str>,
        error_message: Option<&str>,
    ) -> Result<Option<Uuid>, DatabaseError> {
        let lead_id: Option<(Option<Uuid>,)> = sqlx::query_as(
            r#"
            UPDATE messages
            SET status = $2, error_code = $3, error_message = $4, updated_at = now()
            WHERE twilio_message_sid = $1
            RETURNING lead_id
            "#,
        )
        .bind(twilio_message_sid)
        .bind(status)
        .bind(error_code)
        .bind(error_message)
        .fetch_optional(self.pool)
        .await?;
        Ok(lead_id.and_then(|(id,)| id))
    }

    pub async fn for_lead(&self, lead_id: Uuid, limit: i64) -> Result<Vec<Message>, DatabaseError> {
        let sql = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE lead_id = $1 ORDER BY created_at DESC LIMIT $2"
        );
        let rows = sqlx::query_as::<_, Message>(&sql)
            .bind(lead_id)
            .bind(limit)
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn insert_email(&self, email: &SentEmail<'_>) -> Result<EmailMessage, DatabaseError> {
        let row = sqlx::query_as::<_, EmailMessage>(
            r#"
            INSERT INTO email_messages
                (lead_id, message_id, to_email, subject, content, status, smtp_response, is_incoming, sent_at)
            VALUES ($1, $2, $3, $4, $5, 'sent', $6, false, now())
            RETURNING id, lead_id, message_id, to_email, subject, content, status,
                      smtp_response, is_incoming, sent_at
            "#,
        )
        .bind(email.lead_id)
        .bind(email.message_id)
        .bind(email.to_email)
        .bind(email.subject)
        .bind(email.content)
        .bind(email.smtp_response)
        .fetch_one(self.pool)
        .await?;
        Ok(row)
    }

    pub async fn emails_for_lead(&self, lead_id: Uuid, limit: i64) -> Result<Vec<EmailMessage>, DatabaseError> {
        let rows = sqlx::query_as::<_, EmailMessage>(
            r#"
            SELECT id, lead_id, message_id, to_email, subject, content, status,
                   smtp_response, is_incoming, sent_at
            FROM email_messages
            WHERE lead_id = $1
            ORDER BY sent_at DESC
            LIMIT $2
            "#,
        )
        .bind(lead_id)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn insert_template(
        &self,
        name: &str,
        content: &str,
        content_sid: &str,
        language: &str,
    ) -> Result<MessageTemplate, DatabaseError> {
        let row = sqlx::query_as::<_, MessageTemplate>(
            r#"
            INSERT INTO message_templates (name, content, content_sid, language, status)
            VALUES ($1, $2, $3, $4, 'pending')
            RETURNING id, name, content, content_sid, language, status, created_at
            "#,
        )
        .bind(name)
        .bind(content)
        .bind(content_sid)
        .bind(language)
        .fetch_one(self.pool)
        .await?;
        Ok(row)
    }
}

pub struct NoteRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> NoteRepository<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        &self,
        lead_id: Uuid,
        content: &str,
        note_type: &str,
        visibility: &str,
        created_by: Uuid,
    ) -> Result<LeadNote, DatabaseError> {
        let row = sqlx::query_as::<_, LeadNote>(
            r#"
            INSERT INTO lead_notes (lead_id, content, note_type, visibility, created_by)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, lead_id, content, note_type, visibility, created_by, created_at
            "#,
        )
        .bind(lead_id)
        .bind(content)
        .bind(note_type)
        .bind(visibility)
        .bind(created_by)
        .fetch_one(self.pool)
        .await?;
        Ok(row)
    }

    pub async fn for_lead(&self, lead_id: Uuid, limit: i64, offset: i64) -> Result<Vec<LeadNote>, DatabaseError> {
        let rows = sqlx::query_as::<_, LeadNote>(
            r#"
            SELECT id, lead_id, content, note_type, visibility, created_by, created_at
            FROM lead_notes
            WHERE lead_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(lead_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }
}
