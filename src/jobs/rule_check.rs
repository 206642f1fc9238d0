//! Periodic evaluation of one alerting rule

use std::time::Duration;

use super::scheduler::Job;
use crate::{models::enums::RuleKey, services::notifications::NotificationsService};

pub struct RuleCheckJob {
    rule: RuleKey,
    notifications: NotificationsService,
    interval: Duration,
}

impl RuleCheckJob {
    pub fn new(rule: RuleKey, notifications: NotificationsService, interval: Duration) -> Self {
        Self {
            rule,
            notifications,
            interval,
        }
    }
}

#[async_trait::async_trait]
impl Job for RuleCheckJob {
    fn name(&self) -> &'static str {
        match self.rule {
            RuleKey::Warranty => "warranty_check",
            RuleKey::Maintenance => "maintenance_check",
            RuleKey::Aging => "aging_check",
            RuleKey::Expiry => "expiry_check",
            RuleKey::System => "system_check",
        }
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn execute(&self) -> Result<(), String> {
        self.notifications
            .run_rule(self.rule)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}
