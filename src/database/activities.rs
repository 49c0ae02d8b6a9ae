use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use super::manager::DatabaseError;
use super::models::NewActivity;

/// Writes to the side tables whose failures never fail the primary operation:
/// the lead activity timeline and the cron job log.
pub struct ActivityLog<'a> {
    pool: &'a PgPool,
}

impl<'a> ActivityLog<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, activity: &NewActivity) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO activities (lead_id, user_id, activity_type, description, details, activity_date)
            VALUES ($1, $2, $3, $4, $5, now())
            "#,
        )
        .bind(activity.lead_id)
        .bind(activity.user_id)
        .bind(activity.activity_type)
        .bind(&activity.description)
        .bind(&activity.details)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Insert and swallow the error; the caller's operation already succeeded
    pub async fn record(&self, activity: NewActivity) {
        if let Err(e) = self.insert(&activity).await {
            tracing::warn!(
                activity_type = activity.activity_type,
                "Failed to record activity: {}",
                e
            );
        }
    }

    pub async fn cron_started(
        &self,
        job_name: &str,
        triggered_by: &str,
        metadata: Value,
    ) -> Result<Uuid, DatabaseError> {
        let (id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO cron_jobs_log (job_name, job_type, status, triggered_by, started_at, metadata)
            VALUES ($1, 'deadline_check', 'running', $2, now(), $3)
            RETURNING id
            "#,
        )
        .bind(job_name)
        .bind(triggered_by)
        .bind(metadata)
        .fetch_one(self.pool)
        .await?;
        Ok(id)
    }

    pub async fn cron_auth_failure(&self, job_name: &str, triggered_by: &str, metadata: Value) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO cron_jobs_log (job_name, job_type, status, triggered_by, started_at, error_message, metadata)
            VALUES ($1, 'deadline_check', 'failed', $2, now(), 'Unauthorized access attempt', $3)
            "#,
        )
        .bind(job_name)
        .bind(triggered_by)
        .bind(metadata)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn cron_finished(
        &self,
        id: Uuid,
        succeeded: bool,
        duration_ms: i64,
        processed: i64,
        successful: i64,
        failed: i64,
        error_message: Option<&str>,
        completed_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            UPDATE cron_jobs_log
            SET status = $2, completed_at = $3, duration_ms = $4,
                items_processed = $5, items_success = $6, items_failed = $7,
                error_message = $8
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(if succeeded { "completed" } else { "failed" })
        .bind(completed_at)
        .bind(duration_ms)
        .bind(processed)
        .bind(successful)
        .bind(failed)
        .bind(error_message)
        .execute(self.pool)
        .await?;
        Ok(())
    }
}
