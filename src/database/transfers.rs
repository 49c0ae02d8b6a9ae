use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use super::manager::DatabaseError;
use super::models::{
    DeadlineRow, NewTransfer, OverdueTransfer, StatusCount, Transfer, TransferContact, TransferOwner, TransferPatch,
    TransferStatus,
};

const TRANSFER_SELECT: &str = r#"
    SELECT t.id, t.created_at, t.title, t.patient_name, t.airport,
           t.deadline_datetime, t.status, t.assigned_agency_id,
           a.name AS agency_name
    FROM transfers t
    LEFT JOIN agencies a ON a.id = t.assigned_agency_id
"#;

pub struct TransferRepository<'a> {
    pool: &'a PgPool,
}

/// Outcome of a DTMF answer to the deadline call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineAnswer {
    /// Digit 1: the patient has been picked up
    PickedUp,
    /// Digit 2: not yet, confirmation noted
    Acknowledged,
    /// Anything else: only stop calling again
    NoAnswer,
}

impl<'a> TransferRepository<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Newest transfers first, with the assigned agency's name
    pub async fn list(
        &self,
        limit: i64,
        offset: i64,
        status: Option<TransferStatus>,
    ) -> Result<Vec<Transfer>, DatabaseError> {
        let sql = format!(
            r#"
            {TRANSFER_SELECT}
            WHERE ($1::text IS NULL OR t.status = $1)
            ORDER BY t.created_at DESC
            LIMIT $2 OFFSET $3
            "#
        );
        let rows = sqlx::query_as::<_, Transfer>(&sql)
            .bind(status.map(|s| s.as_str()))
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn get(&self, id: Uuid) -> Result<Transfer, DatabaseError> {
        let sql = format!("{TRANSFER_SELECT} WHERE t.id = $1");
        sqlx::query_as::<_, Transfer>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or_else(|| DatabaseError::NotFound("Transfer not found".to_string()))
    }

    pub async fn create(&self, transfer: &NewTransfer, created_by: Uuid) -> Result<Transfer, DatabaseError> {
        let (id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO transfers
                (title, patient_name, airport, clinic, notes, transfer_datetime,
                 deadline_datetime, assigned_agency_id, assigned_officer_id,
                 notification_numbers, notification_emails, status, created_by_user_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 'pending', $12)
            RETURNING id
            "#,
        )
        .bind(transfer.title.trim())
        .bind(transfer.patient_name.trim())
        .bind(&transfer.airport)
        .bind(&transfer.clinic)
        .bind(&transfer.notes)
        .bind(transfer.transfer_datetime)
        .bind(transfer.deadline_datetime)
        .bind(transfer.assigned_agency_id)
        .bind(transfer.assigned_officer_id)
        .bind(&transfer.notification_numbers)
        .bind(&transfer.notification_emails)
        .bind(created_by)
        .fetch_one(self.pool)
        .await?;

        self.get(id).await
    }

    pub async fn owner(&self, id: Uuid) -> Result<TransferOwner, DatabaseError> {
        sqlx::query_as::<_, TransferOwner>(
            "SELECT id, status, assigned_officer_id, created_by_user_id FROM transfers WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DatabaseError::NotFound("Transfer not found".to_string()))
    }

    /// Apply a patch; a closing status also stamps who closed it, and a pickup
    /// counts as the deadline confirmation
    pub async fn update(
        &self,
        id: Uuid,
        patch: &TransferPatch,
        status: Option<TransferStatus>,
        updated_by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Transfer, DatabaseError> {
        let closes = status.is_some_and(|s| s.closes_record());
        let picked_up = status == Some(TransferStatus::PatientPickedUp);

        sqlx::query(
            r#"
            UPDATE transfers SET
                title = COALESCE($2, title),
                patient_name = COALESCE($3, patient_name),
                airport = COALESCE($4, airport),
                clinic = COALESCE($5, clinic),
                transfer_datetime = COALESCE($6, transfer_datetime),
                deadline_datetime = COALESCE($7, deadline_datetime),
                assigned_agency_id = COALESCE($8, assigned_agency_id),
                notification_numbers = COALESCE($9, notification_numbers),
                status = COALESCE($10::text, status),
                closed_at = CASE WHEN $11 THEN $14 ELSE closed_at END,
                closed_by_user_id = CASE WHEN $11 THEN $13 ELSE closed_by_user_id END,
                agency_deadline_notified = agency_deadline_notified OR $12,
                deadline_confirmation_received = deadline_confirmation_received OR $12,
                deadline_confirmation_datetime = CASE WHEN $12 THEN $14 ELSE deadline_confirmation_datetime END,
                updated_by_user_id = $13,
                updated_at = $14
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(patch.title.as_deref().map(str::trim))
        .bind(patch.patient_name.as_deref().map(str::trim))
        .bind(&patch.airport)
        .bind(&patch.clinic)
        .bind(patch.transfer_datetime)
        .bind(patch.deadline_datetime)
        .bind(patch.assigned_agency_id)
        .bind(&patch.notification_numbers)
        .bind(status.map(|s| s.as_str()))
        .bind(closes)
        .bind(picked_up)
        .bind(updated_by)
        .bind(now)
        .execute(self.pool)
        .await?;

        self.get(id).await
    }

    /// Active, not-yet-notified transfers whose deadline is still ahead
    pub async fn upcoming_deadlines(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<DeadlineRow>, DatabaseError> {
        let rows = sqlx::query_as::<_, DeadlineRow>(
            r#"
            SELECT id, deadline_datetime, status
            FROM transfers
            WHERE status <> ALL($1)
              AND agency_deadline_notified = false
              AND deadline_datetime > $2
            ORDER BY deadline_datetime ASC
            LIMIT $3
            "#,
        )
        .bind(&TransferStatus::DEADLINE_CLOSED[..])
        .bind(now)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Transfers past their deadline that nobody has been called about yet
    pub async fn overdue(&self, now: DateTime<Utc>) -> Result<Vec<OverdueTransfer>, DatabaseError> {
        let rows = sqlx::query_as::<_, OverdueTransfer>(
            r#"
            SELECT t.id, t.title, t.patient_name, t.deadline_datetime, t.status,
                   t.assigned_agency_id, t.notification_numbers,
                   a.name AS agency_name,
                   a.contact_information AS agency_contact
            FROM transfers t
            LEFT JOIN agencies a ON a.id = t.assigned_agency_id
            WHERE t.deadline_datetime < $1
              AND t.status <> ALL($2)
              AND t.agency_deadline_notified = false
            ORDER BY t.deadline_datetime ASC
            "#,
        )
        .bind(now)
        .bind(&TransferStatus::DEADLINE_CLOSED[..])
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }

    /// Overdue transfers that cannot be escalated because no agency is assigned
    pub async fn count_unassigned_overdue(&self, now: DateTime<Utc>) -> Result<i64, DatabaseError> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM transfers
            WHERE deadline_datetime < $1
              AND status <> ALL($2)
              AND assigned_agency_id IS NULL
            "#,
        )
        .bind(now)
        .bind(&TransferStatus::DEADLINE_CLOSED[..])
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }

    /// Record that the deadline call was attempted, so it is not repeated
    pub async fn mark_deadline_call(
        &self,
        id: Uuid,
        execution_sid: Option<&str>,
        success: bool,
        now: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            UPDATE transfers
            SET agency_deadline_notified = true,
                agency_deadline_notification_sent_at = $2,
                deadline_flow_execution_sid = COALESCE($3, deadline_flow_execution_sid),
                call_notification_success = $4,
                updated_at = $2
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(now)
        .bind(execution_sid)
        .bind(success)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_contact(&self, id: Uuid) -> Result<TransferContact, DatabaseError> {
        sqlx::query_as::<_, TransferContact>(
            "SELECT id, status, patient_name, deadline_datetime FROM transfers WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or_else(|| DatabaseError::NotFound("Transfer not found".to_string()))
    }

    /// Apply the agency's keypad answer to the transfer
    pub async fn apply_deadline_answer(
        &self,
        id: Uuid,
        answer: DeadlineAnswer,
        now: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        let sql = match answer {
            DeadlineAnswer::PickedUp => {
                r#"
                UPDATE transfers
                SET status = 'patient_picked_up',
                    deadline_confirmation_received = true,
                    deadline_confirmation_datetime = $2,
                    closed_at = $2,
                    agency_deadline_notified = true,
                    updated_at = $2
                WHERE id = $1
                "#
            }
            DeadlineAnswer::Acknowledged => {
                r#"
                UPDATE transfers
                SET deadline_confirmation_received = true,
                    deadline_confirmation_datetime = $2,
                    agency_deadline_notified = true,
                    updated_at = $2
                WHERE id = $1
                "#
            }
            DeadlineAnswer::NoAnswer => {
                r#"
                UPDATE transfers
                SET agency_deadline_notified = true,
                    updated_at = $2
                WHERE id = $1
                "#
            }
        };

        sqlx::query(sql).bind(id).bind(now).execute(self.pool).await?;
        Ok(())
    }

    pub async fn log_notification(
        &self,
        transfer_id: Uuid,
        channel: &str,
        status: &str,
        twilio_sid: Option<&str>,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO transfer_notifications
                (transfer_id, notification_type, notification_channel, status, twilio_sid)
            VALUES ($1, 'transfer_deadline', $2, $3, $4)
            "#,
        )
        .bind(transfer_id)
        .bind(channel)
        .bind(status)
        .bind(twilio_sid)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    pub async fn audit(&self, transfer_id: Uuid, action: &str, details: Value) -> Result<(), DatabaseError> {
        sqlx::query("INSERT INTO transfer_audit_log (transfer_id, action, details) VALUES ($1, $2, $3)")
            .bind(transfer_id)
            .bind(action)
            .bind(details)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    pub async fn status_counts(&self) -> Result<Vec<StatusCount>, DatabaseError> {
        let rows = sqlx::query_as::<_, StatusCount>(
            "SELECT status, COUNT(*) AS count FROM transfers GROUP BY status ORDER BY status",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(rows)
    }
}

impl DeadlineAnswer {
    pub fn from_digits(digits: Option<&str>) -> Self {
        match digits.map(str::trim) {
            Some("1") => DeadlineAnswer::PickedUp,
            Some("2") => DeadlineAnswer::Acknowledged,
            _ => DeadlineAnswer::NoAnswer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digits_map_to_answers() {
        assert_eq!(DeadlineAnswer::from_digits(Some("1")), DeadlineAnswer::PickedUp);
        assert_eq!(DeadlineAnswer::from_digits(Some(" 2 ")), DeadlineAnswer::Acknowledged);
        assert_eq!(DeadlineAnswer::from_digits(Some("9")), DeadlineAnswer::NoAnswer);
        assert_eq!(DeadlineAnswer::from_digits(None), DeadlineAnswer::NoAnswer);
    }
}
