use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LeadNote {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub content: String,
    pub note_type: String,
    pub visibility: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}
