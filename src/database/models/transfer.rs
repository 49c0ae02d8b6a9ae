use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Lifecycle of a patient transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Pending,
    DriverAssigned,
    PatientPickedUp,
    Completed,
    Delayed,
    Cancelled,
}

impl TransferStatus {
    pub const ALL: [TransferStatus; 6] = [
        TransferStatus::Pending,
        TransferStatus::DriverAssigned,
        TransferStatus::PatientPickedUp,
        TransferStatus::Completed,
        TransferStatus::Delayed,
        TransferStatus::Cancelled,
    ];

    /// Statuses after which a deadline no longer needs watching
    pub const DEADLINE_CLOSED: [&'static str; 3] = ["patient_picked_up", "completed", "cancelled"];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "pending",
            TransferStatus::DriverAssigned => "driver_assigned",
            TransferStatus::PatientPickedUp => "patient_picked_up",
            TransferStatus::Completed => "completed",
            TransferStatus::Delayed => "delayed",
            TransferStatus::Cancelled => "cancelled",
        }
    }

    pub fn closes_deadline(&self) -> bool {
        Self::DEADLINE_CLOSED.contains(&self.as_str())
    }

    /// Statuses that stamp `closed_at` and the closing user
    pub fn closes_record(&self) -> bool {
        matches!(self, TransferStatus::PatientPickedUp | TransferStatus::Completed)
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransferStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown transfer status '{}'", s))
    }
}

/// Row shape returned by the transfer list endpoint
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Transfer {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub title: Option<String>,
    pub patient_name: Option<String>,
    pub airport: Option<String>,
    pub deadline_datetime: Option<DateTime<Utc>>,
    pub status: String,
    pub assigned_agency_id: Option<Uuid>,
    pub agency_name: Option<String>,
}

/// Body of POST /api/transfers; new transfers always start pending
#[derive(Debug, Clone, Deserialize)]
pub struct NewTransfer {
    pub title: String,
    pub patient_name: String,
    pub airport: Option<String>,
    pub clinic: Option<String>,
    pub notes: Option<String>,
    pub transfer_datetime: Option<DateTime<Utc>>,
    pub deadline_datetime: Option<DateTime<Utc>>,
    pub assigned_agency_id: Option<Uuid>,
    pub assigned_officer_id: Option<Uuid>,
    pub notification_numbers: Option<Vec<String>>,
    pub notification_emails: Option<Vec<String>>,
}

/// Partial update; absent fields are left untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransferPatch {
    pub title: Option<String>,
    pub patient_name: Option<String>,
    pub airport: Option<String>,
    pub clinic: Option<String>,
    pub transfer_datetime: Option<DateTime<Utc>>,
    pub deadline_datetime: Option<DateTime<Utc>>,
    /// Raw text so an unknown value becomes a field error, not a body rejection
    pub status: Option<String>,
    pub assigned_agency_id: Option<Uuid>,
    pub notification_numbers: Option<Vec<String>>,
}

/// Who may edit a transfer, and the status it had before the edit
#[derive(Debug, Clone, FromRow)]
pub struct TransferOwner {
    pub id: Uuid,
    pub status: String,
    pub assigned_officer_id: Option<Uuid>,
    pub created_by_user_id: Option<Uuid>,
}

/// Transfer list row plus the remaining-time fields the UI countdown renders
#[derive(Debug, Clone, Serialize)]
pub struct TransferView {
    #[serde(flatten)]
    pub transfer: Transfer,
    pub minutes_remaining: Option<i64>,
    pub is_overdue: bool,
}

impl TransferView {
    pub fn at(transfer: Transfer, now: DateTime<Utc>) -> Self {
        let minutes_remaining = transfer
            .deadline_datetime
            .map(|deadline| (deadline - now).num_seconds().div_euclid(60));
        let closed = transfer
            .status
            .parse::<TransferStatus>()
            .map(|s| s.closes_deadline())
            .unwrap_or(false);
        let is_overdue = !closed && transfer.deadline_datetime.map(|d| d <= now).unwrap_or(false);

        Self {
            transfer,
            minutes_remaining,
            is_overdue,
        }
    }
}

/// Minimal projection used by the deadline advisor
#[derive(Debug, Clone, FromRow)]
pub struct DeadlineRow {
    pub id: Uuid,
    pub deadline_datetime: DateTime<Utc>,
    pub status: String,
}

/// Overdue transfer joined with its assigned agency's contact data
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OverdueTransfer {
    pub id: Uuid,
    pub title: Option<String>,
    pub patient_name: Option<String>,
    pub deadline_datetime: DateTime<Utc>,
    pub status: String,
    pub assigned_agency_id: Option<Uuid>,
    pub notification_numbers: Option<Vec<String>>,
    pub agency_name: Option<String>,
    pub agency_contact: Option<serde_json::Value>,
}

impl OverdueTransfer {
    /// Transfer-level numbers win over the agency's contact phone
    pub fn call_target(&self) -> Option<String> {
        if let Some(number) = self
            .notification_numbers
            .as_ref()
            .and_then(|numbers| numbers.iter().find(|n| !n.trim().is_empty()))
        {
            return Some(number.trim().to_string());
        }
        self.agency_contact
            .as_ref()
            .and_then(|contact| contact.get("phone"))
            .and_then(|phone| phone.as_str())
            .map(|phone| phone.trim().to_string())
            .filter(|phone| !phone.is_empty())
    }
}

/// Fields the deadline-notification webhook needs
#[derive(Debug, Clone, FromRow)]
pub struct TransferContact {
    pub id: Uuid,
    pub status: String,
    pub patient_name: Option<String>,
    pub deadline_datetime: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn transfer(status: &str, deadline: Option<DateTime<Utc>>) -> Transfer {
        Transfer {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            title: Some("Airport pickup".to_string()),
            patient_name: Some("Jane Doe".to_string()),
            airport: Some("IST".to_string()),
            deadline_datetime: deadline,
            status: status.to_string(),
            assigned_agency_id: None,
            agency_name: None,
        }
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in TransferStatus::ALL {
            assert_eq!(status.as_str().parse::<TransferStatus>(), Ok(status));
        }
        assert!("lost".parse::<TransferStatus>().is_err());
    }

    #[test]
    fn closed_statuses() {
        assert!(TransferStatus::PatientPickedUp.closes_deadline());
        assert!(TransferStatus::Cancelled.closes_deadline());
        assert!(!TransferStatus::Delayed.closes_deadline());
        assert!(!TransferStatus::DriverAssigned.closes_deadline());
    }

    #[test]
    fn only_pickup_and_completion_close_the_record() {
        let closing: Vec<_> = TransferStatus::ALL.into_iter().filter(|s| s.closes_record()).collect();
        assert_eq!(closing, vec![TransferStatus::PatientPickedUp, TransferStatus::Completed]);
        assert!(TransferStatus::Cancelled.closes_deadline());
        assert!(!TransferStatus::Cancelled.closes_record());
    }

    #[test]
    fn patch_accepts_partial_body() {
        let patch: TransferPatch = serde_json::from_value(json!({ "status": "delayed" })).unwrap();
        assert_eq!(patch.status.as_deref(), Some("delayed"));
        assert!(patch.title.is_none());
        assert!(patch.deadline_datetime.is_none());
    }

    #[test]
    fn view_reports_remaining_minutes() {
        let now = Utc::now();
        let view = TransferView::at(transfer("pending", Some(now + Duration::seconds(150))), now);
        assert_eq!(view.minutes_remaining, Some(2));
        assert!(!view.is_overdue);
    }

    #[test]
    fn past_deadline_is_overdue_unless_closed() {
        let now = Utc::now();
        let past = Some(now - Duration::seconds(30));

        let open = TransferView::at(transfer("delayed", past), now);
        assert!(open.is_overdue);
        assert_eq!(open.minutes_remaining, Some(-1));

        let done = TransferView::at(transfer("completed", past), now);
        assert!(!done.is_overdue);
    }

    #[test]
    fn call_target_prefers_transfer_numbers() {
        let mut overdue = OverdueTransfer {
            id: Uuid::new_v4(),
            title: None,
            patient_name: None,
            deadline_datetime: Utc::now(),
            status: "pending".to_string(),
            assigned_agency_id: None,
            notification_numbers: Some(vec!["".to_string(), "+905551112233".to_string()]),
            agency_name: Some("Blue Shuttle".to_string()),
            agency_contact: Some(json!({ "phone": "+905559998877" })),
        };
        assert_eq!(overdue.call_target().as_deref(), Some("+905551112233"));

        overdue.notification_numbers = None;
        assert_eq!(overdue.call_target().as_deref(), Some("+905559998877"));

        overdue.agency_contact = Some(json!({ "email": "ops@example.com" }));
        assert_eq!(overdue.call_target(), None);
    }
}
