//! Background jobs: alerting rule checks and notification retention

pub mod alerts;
mod notification_retention;
mod rule_check;
mod scheduler;

pub use notification_retention::NotificationRetentionJob;
pub use rule_check::RuleCheckJob;
pub use scheduler::{Job, JobScheduler};

use std::time::Duration;

use crate::{config::JobsConfig, services::Services};

/// Scheduler with every periodic job registered
pub fn build_scheduler(services: &Services, config: &JobsConfig) -> JobScheduler {
    let mut scheduler = JobScheduler::new();
    let alert_interval = Duration::from_secs(config.alert_interval_secs.max(1));
    for rule in alerts::ALERT_RULES {
        scheduler.register(RuleCheckJob::new(
            rule,
            services.notifications.clone(),
            alert_interval,
        ));
    }
    scheduler.register(NotificationRetentionJob::new(
        services.notifications.clone(),
        Duration::from_secs(config.retention_interval_secs.max(1)),
    ));
    scheduler
}
