use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Lead {
    pub id: Uuid,
    pub lead_name: String,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub pipeline_id: Option<Uuid>,
    pub stage_id: Option<Uuid>,
    pub source: Option<String>,
    pub priority: Option<String>,
    pub lead_value: Option<f64>,
    pub description: Option<String>,
    pub follow_up_date: Option<NaiveDate>,
    pub assigned_user_id: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const LEAD_SOURCES: [&str; 6] = ["website", "phone", "email", "social", "referral", "other"];
pub const LEAD_PRIORITIES: [&str; 4] = ["low", "medium", "high", "urgent"];

#[derive(Debug, Clone, Deserialize)]
pub struct NewLead {
    pub lead_name: String,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub pipeline_id: Option<Uuid>,
    pub stage_id: Option<Uuid>,
    pub source: Option<String>,
    pub priority: Option<String>,
    pub lead_value: Option<f64>,
    pub description: Option<String>,
    pub follow_up_date: Option<NaiveDate>,
    pub assigned_user_id: Option<Uuid>,
}

/// Partial update; absent fields are left untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeadPatch {
    pub lead_name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub stage_id: Option<Uuid>,
    pub source: Option<String>,
    pub priority: Option<String>,
    pub lead_value: Option<f64>,
    pub description: Option<String>,
    pub follow_up_date: Option<NaiveDate>,
    pub assigned_user_id: Option<Uuid>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeadFilter {
    pub stage_id: Option<Uuid>,
    pub assigned_user_id: Option<Uuid>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Contact projection used when sending messages to a lead
#[derive(Debug, Clone, FromRow)]
pub struct LeadContact {
    pub id: Uuid,
    pub lead_name: String,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
}
