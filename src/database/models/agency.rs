use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Agency {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone_numbers: Option<String>,
    pub contact_person_name: Option<String>,
    pub address: Option<String>,
    pub contact_information: Option<serde_json::Value>,
    pub is_active: Option<bool>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAgency {
    pub name: String,
    pub email: Option<String>,
    pub phone_numbers: Option<String>,
    pub contact_person_name: Option<String>,
    pub address: Option<String>,
    pub contact_information: Option<serde_json::Value>,
}
