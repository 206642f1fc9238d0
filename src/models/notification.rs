//! Notification model

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::enums::{NotificationType, Priority, RuleKey};

/// Alert addressed to one user, optionally about one equipment
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Notification {
    pub id: i32,
    pub user_id: i32,
    pub equipment_id: Option<i32>,
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    pub priority: Priority,
    /// Rule that produced the notification (None for manual notes)
    pub rule_key: Option<RuleKey>,
    pub day_bucket: NaiveDate,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Column width of `notifications.title`, in characters
pub const TITLE_MAX_CHARS: usize = 255;

/// Cut a generated title down to the column width
pub fn fit_title(title: String) -> String {
    match title.char_indices().nth(TITLE_MAX_CHARS) {
        Some((end, _)) => title[..end].to_string(),
        None => title,
    }
}

/// Notification not yet persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationDraft {
    pub user_id: i32,
    pub equipment_id: Option<i32>,
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    pub priority: Priority,
    pub rule_key: Option<RuleKey>,
}

/// Existing rule notification, used for cooldown and title de-duplication
#[derive(Debug, Clone, FromRow)]
pub struct RecentNotification {
    pub user_id: i32,
    pub equipment_id: Option<i32>,
    pub rule_key: Option<RuleKey>,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// Notification list filters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct NotificationQuery {
    /// Only unread notifications
    pub unread: Option<bool>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Manual note or issue report
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateNotification {
    pub user_id: i32,
    pub equipment_id: Option<i32>,
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[validate(length(min = 1))]
    pub message: String,
    pub notification_type: Option<NotificationType>,
    pub priority: Option<Priority>,
}

/// Bulk mark-as-read request; all of the caller's notifications when `ids` is omitted
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct MarkRead {
    pub ids: Option<Vec<i32>>,
}

/// Rows removed by a retention sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct RetentionOutcome {
    pub read_deleted: u64,
    pub unread_deleted: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_title_counts_characters() {
        assert_eq!(fit_title("short".to_string()), "short");

        let exact = "é".repeat(TITLE_MAX_CHARS);
        assert_eq!(fit_title(exact.clone()), exact);

        let long = format!("Warranty expiring: {}", "é".repeat(TITLE_MAX_CHARS));
        let fitted = fit_title(long);
        assert_eq!(fitted.chars().count(), TITLE_MAX_CHARS);
        assert!(fitted.starts_with("Warranty expiring: "));
    }
}
