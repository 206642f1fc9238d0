//! Retention sweep for old notifications

use std::time::Duration;
use tracing::info;

use super::scheduler::Job;
use crate::services::notifications::NotificationsService;

pub struct NotificationRetentionJob {
    notifications: NotificationsService,
    interval: Duration,
}

impl NotificationRetentionJob {
    pub fn new(notifications: NotificationsService, interval: Duration) -> Self {
        Self {
            notifications,
            interval,
        }
    }
}

#[async_trait::async_trait]
impl Job for NotificationRetentionJob {
    fn name(&self) -> &'static str {
        "notification_retention"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn execute(&self) -> Result<(), String> {
        let outcome = self
            .notifications
            .run_retention()
            .await
            .map_err(|e| e.to_string())?;
        info!(
            read_deleted = outcome.read_deleted,
            unread_deleted = outcome.unread_deleted,
            "Notification retention sweep finished"
        );
        Ok(())
    }
}
