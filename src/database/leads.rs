use sqlx::PgPool;
use uuid::Uuid;

use super::manager::DatabaseError;
use super::models::{Lead, LeadContact, LeadFilter, LeadPatch, NewLead};

const LEAD_COLUMNS: &str = r#"
    id, lead_name, contact_email, contact_phone, pipeline_id, stage_id, source,
    priority, lead_value::float8 AS lead_value, description, follow_up_date,
    assigned_user_id, created_by, created_at, updated_at
"#;

pub struct LeadRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> LeadRepository<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self, filter: &LeadFilter, limit: i64, offset: i64) -> Result<Vec<Lead>, DatabaseError> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s));

        let sql = format!(
            r#"
            SELECT {LEAD_COLUMNS}
            FROM leads
            WHERE ($1::uuid IS NULL OR stage_id = $1)
              AND ($2::uuid IS NULL OR assigned_user_id = $2)
              AND ($3::text IS NULL OR lead_name ILIKE $3 OR contact_email ILIKE $3 OR contact_phone ILIKE $3)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#
        );

        let rows = sqlx::query_as::<_, Lead>(&sql)
            .bind(filter.stage_id)
            .bind(filter.assigned_user_id)
            .bind(search)
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn get(&self, id: Uuid) -> Result<Lead, DatabaseError> {
        let sql = format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = $1");
        sqlx::query_as::<_, Lead>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DatabaseError::NotFound("Lead not found".to_string()))
    }

    pub async fn contact(&self, id: Uuid) -> Result<LeadContact, DatabaseError> {
        sqlx::query_as::<_, LeadContact>(
            "SELECT id, lead_name, contact_email, contact_phone FROM leads WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DatabaseError::NotFound("Lead not found".to_string()))
    }

    /// Match an inbound sender against any stored spelling of the number
    pub async fn find_by_phone_variants(&self, variants: &[String]) -> Result<Option<LeadContact>, DatabaseError> {
        let row = sqlx::query_as::<_, LeadContact>(
            r#"
            SELECT id, lead_name, contact_email, contact_phone
            FROM leads
            WHERE contact_phone = ANY($1)
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(variants)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// Fallback match on the trailing digits of a stored phone number
    pub async fn find_by_phone_suffix(&self, last_digits: &str) -> Result<Option<LeadContact>, DatabaseError> {
        let row = sqlx::query_as::<_, LeadContact>(
            r#"
            SELECT id, lead_name, contact_email, contact_phone
            FROM leads
            WHERE contact_phone LIKE '%' || $1
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(last_digits)
        .fetch_optional(self.pool)
        .await?;
        Ok(row)
    }

    /// Lead for an inbound message from a number nobody has registered yet
    pub async fn create_unregistered(&self, phone: &str) -> Result<LeadContact, DatabaseError> {
        let row = sqlx::query_as::<_, LeadContact>(
            r#"
            INSERT INTO leads (lead_name, contact_phone, source, priority)
            VALUES ($1, $2, 'other', 'medium')
            RETURNING id, lead_name, contact_email, contact_phone
            "#,
        )
        .bind(format!("New lead ({})", phone))
        .bind(phone)
        .fetch_one(self.pool)
        .await?;
        Ok(row)
    }

    pub async fn create(&self, lead: &NewLead, created_by: Uuid) -> Result<Lead, DatabaseError> {
        let sql = format!(
            r#"
            INSERT INTO leads
                (lead_name, contact_email, contact_phone, pipeline_id, stage_id, source,
                 priority, lead_value, description, follow_up_date, assigned_user_id,
                 created_by, updated_by)
            VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, 'medium'), $8, $9, $10, $11, $12, $12)
            RETURNING {LEAD_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, Lead>(&sql)
            .bind(lead.lead_name.trim())
            .bind(lead.contact_email.as_deref().filter(|s| !s.is_empty()))
            .bind(&lead.contact_phone)
            .bind(lead.pipeline_id)
            .bind(lead.stage_id)
            .bind(&lead.source)
            .bind(&lead.priority)
            .bind(lead.lead_value)
            .bind(&lead.description)
            .bind(lead.follow_up_date)
            .bind(lead.assigned_user_id)
            .bind(created_by)
            .fetch_one(self.pool)
            .await?;
        Ok(row)
    }

    pub async fn update(&self, id: Uuid, patch: &LeadPatch, updated_by: Uuid) -> Result<Lead, DatabaseError> {
        let sql = format!(
            r#"
            UPDATE leads SET
                lead_name = COALESCE($2, lead_name),
                contact_email = COALESCE($3, contact_email),
                contact_phone = COALESCE($4, contact_phone),
                stage_id = COALESCE($5, stage_id),
                source = COALESCE($6, source),
                priority = COALESCE($7, priority),
                lead_value = COALESCE($8, lead_value),
                description = COALESCE($9, description),
                follow_up_date = COALESCE($10, follow_up_date),
                assigned_user_id = COALESCE($11, assigned_user_id),
                updated_by = $12,
                updated_at = now()
            WHERE id = $1
            RETURNING {LEAD_COLUMNS}
            "#
        );

        sqlx::query_as::<_, Lead>(&sql)
            .bind(id)
            .bind(patch.lead_name.as_deref().map(str::trim))
            .bind(&patch.contact_email)
            .bind(&patch.contact_phone)
            .bind(patch.stage_id)
            .bind(&patch.source)
            .bind(&patch.priority)
            .bind(patch.lead_value)
            .bind(&patch.description)
            .bind(patch.follow_up_date)
            .bind(patch.assigned_user_id)
            .bind(updated_by)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DatabaseError::NotFound("Lead not found".to_string()))
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM leads WHERE id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound("Lead not found".to_string()));
        }
        Ok(())
    }

    pub async fn count(&self) -> Result<i64, DatabaseError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM leads")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}
