use axum::extract::State;
use serde::Serialize;

use crate::database::models::StatusCount;
use crate::database::{LeadRepository, TransferRepository};
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct DashboardSummary {
    pub transfer_status_counts: Vec<StatusCount>,
    pub total_transfers: i64,
    pub lead_count: i64,
}

/// GET /api/dashboard/summary - both reads run concurrently
pub async fn dashboard_summary(State(state): State<AppState>) -> ApiResult<DashboardSummary> {
    let transfers = TransferRepository::new(state.pool());
    let leads = LeadRepository::new(state.pool());

    let (transfer_status_counts, lead_count) = tokio::try_join!(transfers.status_counts(), leads.count())?;
    let total_transfers = transfer_status_counts.iter().map(|s| s.count).sum();

    Ok(ApiResponse::success(DashboardSummary {
        transfer_status_counts,
        total_transfers,
        lead_count,
    }))
}
