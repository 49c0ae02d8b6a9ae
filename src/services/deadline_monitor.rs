//! Escalates overdue transfers by starting the deadline call flow for each one.

use chrono::{DateTime, FixedOffset, Utc};
use futures::future::join_all;
use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;

use super::deadline_advisor::{next_deadline_info, NextDeadlineInfo};
use super::phone::format_phone_number;
use super::twilio::{FlowExecution, Telephony};
use crate::database::models::OverdueTransfer;
use crate::database::TransferRepository;

/// Turkey has stayed on UTC+3 all year since 2016
const LOCAL_OFFSET_SECS: i32 = 3 * 3600;

#[derive(Debug, Clone, Serialize)]
pub struct CheckSummary {
    pub success: bool,
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    /// Overdue transfers with no phone number to call
    pub skipped: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unassigned_overdue: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub schedule: NextDeadlineInfo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    Called { execution_sid: String },
    NoContact,
    Failed { reason: String },
}

/// Build the flow execution for a transfer, if there is anyone to call
pub fn plan_call(transfer: &OverdueTransfer, webhook_base: Option<&str>) -> Option<FlowExecution> {
    let target = transfer.call_target()?;
    let to = if target.starts_with('+') {
        target
    } else {
        format_phone_number(&target)
    };

    let local = FixedOffset::east_opt(LOCAL_OFFSET_SECS)
        .map(|offset| transfer.deadline_datetime.with_timezone(&offset).format("%d.%m.%Y %H:%M:%S").to_string())
        .unwrap_or_else(|| transfer.deadline_datetime.to_rfc3339());

    Some(FlowExecution {
        to,
        parameters: json!({
            "transfer_id": transfer.id,
            "patient_name": transfer.patient_name.as_deref().filter(|n| !n.is_empty()).unwrap_or("Hasta"),
            "agency_name": transfer.agency_name.as_deref().filter(|n| !n.is_empty()).unwrap_or("Ajans"),
            "deadline_time": local,
            "webhook_url": webhook_base.map(|base| format!("{}/api/webhooks/deadline-notification", base)),
        }),
    })
}

/// Count settled call attempts: (successful, failed, skipped)
pub fn tally(outcomes: &[CallOutcome]) -> (usize, usize, usize) {
    outcomes.iter().fold((0, 0, 0), |(ok, failed, skipped), outcome| match outcome {
        CallOutcome::Called { .. } => (ok + 1, failed, skipped),
        CallOutcome::Failed { .. } => (ok, failed + 1, skipped),
        CallOutcome::NoContact => (ok, failed, skipped + 1),
    })
}

async fn escalate(
    pool: &PgPool,
    telephony: &dyn Telephony,
    transfer: &OverdueTransfer,
    webhook_base: Option<&str>,
    now: DateTime<Utc>,
) -> CallOutcome {
    let repo = TransferRepository::new(pool);

    let Some(execution) = plan_call(transfer, webhook_base) else {
        tracing::error!(transfer_id = %transfer.id, "No phone number found for overdue transfer");
        return CallOutcome::NoContact;
    };

    tracing::info!(transfer_id = %transfer.id, to = %execution.to, "Triggering deadline flow");
    match telephony.start_deadline_flow(execution).await {
        Ok(execution_sid) => {
            if let Err(e) = repo.mark_deadline_call(transfer.id, Some(&execution_sid), true, now).await {
                tracing::error!(transfer_id = %transfer.id, "Failed to mark transfer notified: {}", e);
            }
            CallOutcome::Called { execution_sid }
        }
        Err(e) => {
            tracing::error!(transfer_id = %transfer.id, "Deadline flow failed: {}", e);
            // Still marked, so the next run does not call again
            if let Err(mark_err) = repo.mark_deadline_call(transfer.id, None, false, now).await {
                tracing::error!(transfer_id = %transfer.id, "Failed to record failed call: {}", mark_err);
            }
            CallOutcome::Failed { reason: e.to_string() }
        }
    }
}

pub async fn check_transfer_deadlines(
    pool: &PgPool,
    telephony: &dyn Telephony,
    webhook_base: Option<&str>,
    now: DateTime<Utc>,
) -> CheckSummary {
    let schedule = next_deadline_info(pool, now).await;
    let repo = TransferRepository::new(pool);

    let overdue = match repo.overdue(now).await {
        Ok(rows) => rows,
        Err(e) => {
            tracing::error!("Error fetching overdue transfers: {}", e);
            return CheckSummary {
                success: false,
                processed: 0,
                successful: 0,
                failed: 0,
                skipped: 0,
                unassigned_overdue: None,
                error: Some(e.to_string()),
                schedule,
            };
        }
    };

    if overdue.is_empty() {
        let unassigned = repo.count_unassigned_overdue(now).await.unwrap_or_else(|e| {
            tracing::warn!("Failed to count unassigned overdue transfers: {}", e);
            0
        });
        tracing::info!("No overdue transfers found; {} without agency assignment", unassigned);
        return CheckSummary {
            success: true,
            processed: 0,
            successful: 0,
            failed: 0,
            skipped: 0,
            unassigned_overdue: Some(unassigned),
            error: None,
            schedule,
        };
    }

    tracing::info!("Found {} overdue transfers to process", overdue.len());
    let outcomes = join_all(
        overdue
            .iter()
            .map(|transfer| escalate(pool, telephony, transfer, webhook_base, now)),
    )
    .await;

    let (successful, failed, skipped) = tally(&outcomes);
    tracing::info!(
        "Deadline check completed: {} success, {} failures, {} without contact",
        successful,
        failed,
        skipped
    );

    CheckSummary {
        success: true,
        processed: overdue.len(),
        successful,
        failed,
        skipped,
        unassigned_overdue: None,
        error: None,
        schedule,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn overdue(numbers: Option<Vec<&str>>, contact: Option<serde_json::Value>) -> OverdueTransfer {
        OverdueTransfer {
            id: Uuid::new_v4(),
            title: None,
            patient_name: Some("Ayşe Yılmaz".to_string()),
            deadline_datetime: Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap(),
            status: "pending".to_string(),
            assigned_agency_id: Some(Uuid::new_v4()),
            notification_numbers: numbers.map(|n| n.into_iter().map(String::from).collect()),
            agency_name: None,
            agency_contact: contact,
        }
    }

    #[test]
    fn plans_call_to_transfer_number_first() {
        let transfer = overdue(Some(vec!["05551234567"]), Some(json!({ "phone": "+441234" })));
        let plan = plan_call(&transfer, Some("https://crm.example.com")).unwrap();
        assert_eq!(plan.to, "+905551234567");
        assert_eq!(plan.parameters["patient_name"], "Ayşe Yılmaz");
        assert_eq!(plan.parameters["agency_name"], "Ajans");
        assert_eq!(plan.parameters["deadline_time"], "01.05.2024 12:30:00");
        assert_eq!(
            plan.parameters["webhook_url"],
            "https://crm.example.com/api/webhooks/deadline-notification"
        );
    }

    #[test]
    fn falls_back_to_agency_phone() {
        let transfer = overdue(None, Some(json!({ "phone": "+441234567" })));
        assert_eq!(plan_call(&transfer, None).unwrap().to, "+441234567");
    }

    #[test]
    fn no_contact_means_no_call() {
        let transfer = overdue(Some(vec![]), Some(json!({ "email": "x@y.com" })));
        assert!(plan_call(&transfer, None).is_none());
    }

    #[test]
    fn tally_counts_settled_outcomes() {
        let outcomes = vec![
            CallOutcome::Called { execution_sid: "FN1".to_string() },
            CallOutcome::Failed { reason: "busy".to_string() },
            CallOutcome::Called { execution_sid: "FN2".to_string() },
            CallOutcome::NoContact,
        ];
        assert_eq!(tally(&outcomes), (2, 1, 1));
    }
}
