//! Maintenance work orders and recurring schedules

use chrono::{DateTime, Duration, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::enums::{Frequency, Priority, RequestStatus};

// ---------------------------------------------------------------------------
// MaintenanceRequest
// ---------------------------------------------------------------------------

/// Maintenance work order
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct MaintenanceRequest {
    pub id: i32,
    pub equipment_id: i32,
    pub title: String,
    pub description: Option<String>,
    pub priority: Priority,
    pub status: RequestStatus,
    pub requested_by: Option<i32>,
    pub assigned_to: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// Action moving a request through its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RequestAction {
    Approve,
    Start,
    Complete,
    Cancel,
}

impl RequestStatus {
    /// Status reached by applying `action`, or None when not allowed
    pub fn apply(&self, action: RequestAction) -> Option<RequestStatus> {
        use RequestAction::*;
        use RequestStatus::*;
        match (self, action) {
            (Pending, Approve) => Some(Approved),
            (Approved, Start) => Some(InProgress),
            (InProgress, Complete) => Some(Completed),
            (Pending | Approved | InProgress, Cancel) => Some(Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Completed | RequestStatus::Cancelled)
    }
}

impl MaintenanceRequest {
    /// Hours between start and completion
    pub fn duration_hours(&self) -> Option<f64> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some((end - start).num_minutes() as f64 / 60.0),
            _ => None,
        }
    }
}

/// Request with derived duration
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MaintenanceRequestView {
    #[serde(flatten)]
    pub request: MaintenanceRequest,
    pub duration_hours: Option<f64>,
}

impl From<MaintenanceRequest> for MaintenanceRequestView {
    fn from(request: MaintenanceRequest) -> Self {
        Self {
            duration_hours: request.duration_hours(),
            request,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateMaintenanceRequest {
    pub equipment_id: i32,
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub assigned_to: Option<i32>,
}

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct MaintenanceRequestQuery {
    pub equipment_id: Option<i32>,
    pub status: Option<RequestStatus>,
}

// ---------------------------------------------------------------------------
// MaintenanceSchedule
// ---------------------------------------------------------------------------

/// Recurring maintenance plan for one equipment
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct MaintenanceSchedule {
    pub id: i32,
    pub equipment_id: i32,
    pub title: String,
    pub frequency: Frequency,
    pub custom_interval_days: Option<i32>,
    pub last_performed: Option<NaiveDate>,
    pub next_due: NaiveDate,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Longest accepted custom interval (ten years)
pub const MAX_CUSTOM_INTERVAL_DAYS: i32 = 3650;

impl Frequency {
    /// Next due date after `from`; custom frequencies need a positive interval
    pub fn next_after(&self, from: NaiveDate, custom_days: Option<i32>) -> Option<NaiveDate> {
        match self {
            Frequency::Daily => Some(from + Duration::days(1)),
            Frequency::Weekly => Some(from + Duration::days(7)),
            Frequency::Monthly => from.checked_add_months(Months::new(1)),
            Frequency::Quarterly => from.checked_add_months(Months::new(3)),
            Frequency::Semiannual => from.checked_add_months(Months::new(6)),
            Frequency::Annual => from.checked_add_months(Months::new(12)),
            Frequency::Custom => custom_days
                .filter(|d| *d > 0)
                .and_then(|d| from.checked_add_signed(Duration::days(i64::from(d)))),
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateMaintenanceSchedule {
    pub equipment_id: i32,
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    pub frequency: Frequency,
    #[validate(range(min = 1, max = 3650))]
    pub custom_interval_days: Option<i32>,
    /// First due date; defaults to one period from today
    pub first_due: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_request_lifecycle() {
        use RequestAction::*;
        let s = RequestStatus::Pending;
        let s = s.apply(Approve).unwrap();
        let s = s.apply(Start).unwrap();
        assert_eq!(s, RequestStatus::InProgress);
        let s = s.apply(Complete).unwrap();
        assert!(s.is_terminal());
        assert_eq!(s.apply(Cancel), None);
    }

    #[test]
    fn test_request_cannot_skip_steps() {
        assert_eq!(RequestStatus::Pending.apply(RequestAction::Start), None);
        assert_eq!(RequestStatus::Pending.apply(RequestAction::Complete), None);
        assert_eq!(
            RequestStatus::Approved.apply(RequestAction::Cancel),
            Some(RequestStatus::Cancelled)
        );
        assert_eq!(RequestStatus::Cancelled.apply(RequestAction::Approve), None);
    }

    #[test]
    fn test_frequency_next_due() {
        let from = date(2025, 1, 31);
        assert_eq!(Frequency::Daily.next_after(from, None), Some(date(2025, 2, 1)));
        assert_eq!(Frequency::Weekly.next_after(from, None), Some(date(2025, 2, 7)));
        assert_eq!(Frequency::Monthly.next_after(from, None), Some(date(2025, 2, 28)));
        assert_eq!(Frequency::Quarterly.next_after(from, None), Some(date(2025, 4, 30)));
        assert_eq!(Frequency::Semiannual.next_after(from, None), Some(date(2025, 7, 31)));
        assert_eq!(Frequency::Annual.next_after(from, None), Some(date(2026, 1, 31)));
        assert_eq!(Frequency::Custom.next_after(from, Some(10)), Some(date(2025, 2, 10)));
        assert_eq!(Frequency::Custom.next_after(from, None), None);
        assert_eq!(Frequency::Custom.next_after(from, Some(0)), None);
    }

    #[test]
    fn test_custom_interval_overflow_yields_none() {
        let from = date(2025, 1, 1);
        assert_eq!(Frequency::Custom.next_after(from, Some(i32::MAX)), None);
        assert_eq!(
            Frequency::Custom.next_after(from, Some(MAX_CUSTOM_INTERVAL_DAYS)),
            Some(date(2034, 12, 30))
        );
    }

    #[test]
    fn test_custom_interval_is_bounded() {
        let schedule = |days| CreateMaintenanceSchedule {
            equipment_id: 1,
            title: "Clean filters".to_string(),
            frequency: Frequency::Custom,
            custom_interval_days: Some(days),
            first_due: None,
        };
        assert!(schedule(MAX_CUSTOM_INTERVAL_DAYS).validate().is_ok());
        assert!(schedule(i32::MAX).validate().is_err());
        assert!(schedule(0).validate().is_err());
    }

    #[test]
    fn test_duration_hours() {
        let start = DateTime::<Utc>::from_timestamp(0, 0).unwrap();
        let request = MaintenanceRequest {
            id: 1,
            equipment_id: 1,
            title: "Replace fan".to_string(),
            description: None,
            priority: Priority::Medium,
            status: RequestStatus::Completed,
            requested_by: None,
            assigned_to: None,
            created_at: start,
            approved_at: Some(start),
            started_at: Some(start),
            completed_at: Some(start + Duration::minutes(90)),
            cancelled_at: None,
        };
        assert_eq!(request.duration_hours(), Some(1.5));
    }
}
