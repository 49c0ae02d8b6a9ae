//! Polling-interval advice for the external cron that checks transfer deadlines.
//!
//! The cron asks how soon the next unhandled deadline is and reschedules itself
//! accordingly: every minute when something is about to expire, every half hour
//! when nothing is due for hours.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::database::models::DeadlineRow;
use crate::database::TransferRepository;

/// Interval used when there is nothing to watch or the lookup failed
pub const FALLBACK_INTERVAL_MINUTES: i64 = 15;

/// A deadline this close (or closer) counts as urgent
pub const URGENT_WITHIN_MINUTES: i64 = 5;

/// Upper bound on deadlines considered per lookup
pub const DEADLINE_LOOKAHEAD_ROWS: i64 = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextDeadlineInfo {
    pub next_deadline: Option<DateTime<Utc>>,
    pub minutes_until: Option<i64>,
    pub transfer_count: usize,
    pub urgent_count: usize,
    pub recommended_check_interval: i64,
}

impl NextDeadlineInfo {
    pub fn idle() -> Self {
        Self {
            next_deadline: None,
            minutes_until: None,
            transfer_count: 0,
            urgent_count: 0,
            recommended_check_interval: FALLBACK_INTERVAL_MINUTES,
        }
    }
}

/// Whole minutes from `now` until `deadline`, rounded toward negative infinity
pub fn minutes_until(now: DateTime<Utc>, deadline: DateTime<Utc>) -> i64 {
    (deadline - now).num_milliseconds().div_euclid(60_000)
}

pub fn recommend_interval(minutes_until: i64, urgent_count: usize) -> i64 {
    if urgent_count > 0 || minutes_until <= 5 {
        1
    } else if minutes_until <= 15 {
        2
    } else if minutes_until <= 60 {
        5
    } else if minutes_until <= 240 {
        15
    } else {
        30
    }
}

/// Build the advice from deadline rows already sorted ascending
pub fn summarize(now: DateTime<Utc>, deadlines: &[DeadlineRow]) -> NextDeadlineInfo {
    let Some(first) = deadlines.first() else {
        return NextDeadlineInfo::idle();
    };

    let next_minutes = minutes_until(now, first.deadline_datetime);
    let urgent_count = deadlines
        .iter()
        .filter(|row| minutes_until(now, row.deadline_datetime) <= URGENT_WITHIN_MINUTES)
        .count();

    NextDeadlineInfo {
        next_deadline: Some(first.deadline_datetime),
        minutes_until: Some(next_minutes),
        transfer_count: deadlines.len(),
        urgent_count,
        recommended_check_interval: recommend_interval(next_minutes, urgent_count),
    }
}

/// Query upcoming deadlines and summarize them; lookup errors yield the idle advice
pub async fn next_deadline_info(pool: &PgPool, now: DateTime<Utc>) -> NextDeadlineInfo {
    match TransferRepository::new(pool)
        .upcoming_deadlines(now, DEADLINE_LOOKAHEAD_ROWS)
        .await
    {
        Ok(rows) => summarize(now, &rows),
        Err(e) => {
            tracing::error!("Error fetching upcoming deadlines: {}", e);
            NextDeadlineInfo::idle()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn row(deadline: DateTime<Utc>) -> DeadlineRow {
        DeadlineRow {
            id: Uuid::new_v4(),
            deadline_datetime: deadline,
            status: "pending".to_string(),
        }
    }

    #[test]
    fn interval_bands() {
        assert_eq!(recommend_interval(0, 0), 1);
        assert_eq!(recommend_interval(5, 0), 1);
        assert_eq!(recommend_interval(6, 0), 2);
        assert_eq!(recommend_interval(15, 0), 2);
        assert_eq!(recommend_interval(16, 0), 5);
        assert_eq!(recommend_interval(60, 0), 5);
        assert_eq!(recommend_interval(61, 0), 15);
        assert_eq!(recommend_interval(240, 0), 15);
        assert_eq!(recommend_interval(241, 0), 30);
        assert_eq!(recommend_interval(10_000, 0), 30);
    }

    #[test]
    fn urgent_overrides_every_band() {
        for minutes in [6, 15, 60, 240, 10_000] {
            assert_eq!(recommend_interval(minutes, 1), 1);
        }
    }

    #[test]
    fn no_deadlines_means_idle() {
        let info = summarize(now(), &[]);
        assert_eq!(info, NextDeadlineInfo::idle());
        assert_eq!(info.recommended_check_interval, 15);
        assert!(info.next_deadline.is_none());
        assert!(info.minutes_until.is_none());
    }

    #[test]
    fn single_deadline_three_minutes_out_is_urgent() {
        let deadline = now() + Duration::minutes(3);
        let info = summarize(now(), &[row(deadline)]);
        assert_eq!(info.next_deadline, Some(deadline));
        assert_eq!(info.minutes_until, Some(3));
        assert_eq!(info.transfer_count, 1);
        assert_eq!(info.urgent_count, 1);
        assert_eq!(info.recommended_check_interval, 1);
    }

    #[test]
    fn minutes_are_floored() {
        let deadline = now() + Duration::seconds(6 * 60 - 1);
        assert_eq!(minutes_until(now(), deadline), 5);
        assert_eq!(minutes_until(now(), now() - Duration::seconds(1)), -1);
    }

    #[test]
    fn urgent_count_spans_all_rows() {
        let rows = vec![
            row(now() + Duration::minutes(2)),
            row(now() + Duration::minutes(5)),
            row(now() + Duration::minutes(6)),
            row(now() + Duration::hours(3)),
        ];
        let info = summarize(now(), &rows);
        assert_eq!(info.transfer_count, 4);
        assert_eq!(info.urgent_count, 2);
        assert_eq!(info.minutes_until, Some(2));
    }

    #[test]
    fn distant_deadline_polls_slowly() {
        let info = summarize(now(), &[row(now() + Duration::hours(5))]);
        assert_eq!(info.urgent_count, 0);
        assert_eq!(info.recommended_check_interval, 30);
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let value = serde_json::to_value(NextDeadlineInfo::idle()).unwrap();
        assert_eq!(value["recommendedCheckInterval"], 15);
        assert!(value["nextDeadline"].is_null());
        assert_eq!(value["transferCount"], 0);
    }
}
