use axum::{
    extract::{RawQuery, State},
    http::HeaderMap,
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::time::Instant;

use crate::database::ActivityLog;
use crate::middleware::secret::{trigger_source, CRON_JOB_NAME};
use crate::services::deadline_advisor::{next_deadline_info, NextDeadlineInfo};
use crate::services::deadline_monitor::{self, CheckSummary};
use crate::state::AppState;

/// Human-readable summary line of a run
pub fn summary_message(summary: &CheckSummary) -> String {
    if summary.success {
        format!(
            "{} transfer işlendi, {} başarılı, {} başarısız",
            summary.processed, summary.successful, summary.failed
        )
    } else {
        summary.error.clone().unwrap_or_else(|| "İşlem başarısız".to_string())
    }
}

/// GET|POST /api/cron/check-transfer-deadlines
///
/// Runs one deadline sweep. A failed sweep still answers 200 with
/// `success: false` so schedulers do not retry into a broken database.
pub async fn check_transfer_deadlines(
    State(state): State<AppState>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Json<Value> {
    let started = Instant::now();
    let (triggered_by, source_info) = trigger_source(&headers, query.as_deref());
    tracing::info!(triggered_by = %triggered_by, "Starting deadline check");

    let log = ActivityLog::new(state.pool());
    let cron_log_id = match log
        .cron_started(CRON_JOB_NAME, &triggered_by, json!({ "source_info": source_info }))
        .await
    {
        Ok(id) => Some(id),
        Err(e) => {
            tracing::warn!("Failed to log cron start: {}", e);
            None
        }
    };

    let summary = deadline_monitor::check_transfer_deadlines(
        state.pool(),
        state.telephony.as_ref(),
        state.config.server.public_app_url.as_deref(),
        Utc::now(),
    )
    .await;
    let duration_ms = started.elapsed().as_millis() as i64;

    if let Some(id) = cron_log_id {
        if let Err(e) = log
            .cron_finished(
                id,
                summary.success,
                duration_ms,
                summary.processed as i64,
                summary.successful as i64,
                summary.failed as i64,
                summary.error.as_deref(),
                Utc::now(),
            )
            .await
        {
            tracing::warn!("Failed to log cron completion: {}", e);
        }
    }

    tracing::info!(
        success = summary.success,
        processed = summary.processed,
        successful = summary.successful,
        failed = summary.failed,
        duration_ms,
        "Deadline check finished"
    );

    Json(json!({
        "success": summary.success,
        "message": summary_message(&summary),
        "timestamp": Utc::now(),
        "duration_ms": duration_ms,
        "cron_log_id": cron_log_id,
        "triggered_by": triggered_by,
        "stats": {
            "processed": summary.processed,
            "successful": summary.successful,
            "failed": summary.failed,
            "skipped": summary.skipped,
            "unassigned_overdue": summary.unassigned_overdue,
        },
        "schedule_info": summary.schedule,
    }))
}

/// GET /api/cron/next-deadline
pub async fn next_deadline(State(state): State<AppState>) -> Json<NextDeadlineInfo> {
    Json(next_deadline_info(state.pool(), Utc::now()).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(success: bool, error: Option<&str>) -> CheckSummary {
        CheckSummary {
            success,
            processed: 3,
            successful: 2,
            failed: 1,
            skipped: 0,
            unassigned_overdue: None,
            error: error.map(str::to_string),
            schedule: NextDeadlineInfo::idle(),
        }
    }

    #[test]
    fn message_reports_counts_or_error() {
        assert_eq!(
            summary_message(&summary(true, None)),
            "3 transfer işlendi, 2 başarılı, 1 başarısız"
        );
        assert_eq!(summary_message(&summary(false, Some("pool timed out"))), "pool timed out");
        assert_eq!(summary_message(&summary(false, None)), "İşlem başarısız");
    }
}
