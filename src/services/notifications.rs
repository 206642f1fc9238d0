//! Notification engine and user notification operations

use chrono::{Duration, Utc};
use tracing::{info, warn};
use validator::Validate;

use super::email::EmailService;
use crate::{
    config::NotificationsConfig,
    error::{AppError, AppResult},
    jobs::alerts::{self, Cooldowns},
    models::{
        enums::{NotificationType, Priority, RuleKey},
        notification::{
            CreateNotification, Notification, NotificationDraft, NotificationQuery,
            RetentionOutcome,
        },
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct NotificationsService {
    repository: Repository,
    email: EmailService,
    config: NotificationsConfig,
}

impl NotificationsService {
    pub fn new(repository: Repository, email: EmailService, config: NotificationsConfig) -> Self {
        Self {
            repository,
            email,
            config,
        }
    }

    /// IDs of the IT staff recipients
    pub async fn staff_ids(&self) -> AppResult<Vec<i32>> {
        self.repository
            .users_staff_ids(&self.config.staff_department)
            .await
    }

    /// Evaluate one rule over the equipment in service and persist new alerts.
    ///
    /// Returns the number of notifications created.
    pub async fn run_rule(&self, rule: RuleKey) -> AppResult<usize> {
        let now = Utc::now();
        let today = now.date_naive();

        let equipment = self.repository.equipment_list_active().await?;
        let staff = self.staff_ids().await?;
        let drafts = alerts::evaluate_rule(rule, today, &equipment, &staff);
        if drafts.is_empty() {
            info!(rule = %rule, evaluated = equipment.len(), "No alerts to raise");
            return Ok(0);
        }

        let cooldowns = Cooldowns::from(&self.config);
        let recent = self
            .repository
            .notifications_recent(now - cooldowns.lookback())
            .await?;
        let candidates = drafts.len();
        let drafts = alerts::apply_cooldown(drafts, &recent, now, &cooldowns);
        let created = self
            .repository
            .notifications_create_many(&drafts, today)
            .await?;

        info!(
            rule = %rule,
            evaluated = equipment.len(),
            candidates,
            created = created.len(),
            "Alert rule evaluated"
        );

        self.dispatch_emails(&created).await;
        Ok(created.len())
    }

    /// Email each notification to its recipient, fire-and-forget
    pub async fn dispatch_emails(&self, notifications: &[Notification]) {
        if notifications.is_empty() || !self.email.is_enabled() {
            return;
        }
        let mut user_ids: Vec<i32> = notifications.iter().map(|n| n.user_id).collect();
        user_ids.sort_unstable();
        user_ids.dedup();

        let recipients = match self.repository.users_recipients(&user_ids).await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "Could not load notification recipients");
                return;
            }
        };

        for notification in notifications {
            let address = recipients
                .iter()
                .find(|r| r.id == notification.user_id)
                .and_then(|r| r.email.clone());
            match address {
                Some(to) => self.email.send_notification_detached(to, notification),
                None => warn!(
                    user_id = notification.user_id,
                    notification_id = notification.id,
                    "Recipient has no email address"
                ),
            }
        }
    }

    /// Delete read and unread notifications past their retention windows
    pub async fn run_retention(&self) -> AppResult<RetentionOutcome> {
        let now = Utc::now();
        self.repository
            .notifications_delete_older(
                now - Duration::days(self.config.read_retention_days),
                now - Duration::days(self.config.unread_retention_days),
            )
            .await
    }

    pub async fn list(&self, user_id: i32, query: &NotificationQuery) -> AppResult<(Vec<Notification>, i64)> {
        self.repository.notifications_list(user_id, query).await
    }

    pub async fn unread_count(&self, user_id: i32) -> AppResult<i64> {
        self.repository.notifications_unread_count(user_id).await
    }

    pub async fn unread_by_priority(&self, user_id: i32) -> AppResult<Vec<(Priority, i64)>> {
        self.repository.notifications_unread_by_priority(user_id).await
    }

    pub async fn unread_by_type(&self, user_id: i32) -> AppResult<Vec<(NotificationType, i64)>> {
        self.repository.notifications_unread_by_type(user_id).await
    }

    pub async fn mark_read(&self, user_id: i32, id: i32) -> AppResult<Notification> {
        self.repository.notifications_mark_read(user_id, id).await
    }

    pub async fn mark_read_bulk(&self, user_id: i32, ids: Option<&[i32]>) -> AppResult<u64> {
        self.repository.notifications_mark_read_bulk(user_id, ids).await
    }

    /// Manual note or issue report addressed to a user
    pub async fn create_manual(&self, data: CreateNotification) -> AppResult<Notification> {
        data.validate()?;
        if !self.repository.users_exists(data.user_id).await? {
            return Err(AppError::NotFound(format!("User with id {} not found", data.user_id)));
        }
        if let Some(equipment_id) = data.equipment_id {
            self.repository.equipment_get_by_id(equipment_id).await?;
        }

        let draft = NotificationDraft {
            user_id: data.user_id,
            equipment_id: data.equipment_id,
            title: data.title,
            message: data.message,
            notification_type: data.notification_type.unwrap_or(NotificationType::Info),
            priority: data.priority.unwrap_or(Priority::Medium),
            rule_key: None,
        };
        let notification = self.repository.notifications_create(&draft).await?;
        self.dispatch_emails(std::slice::from_ref(&notification)).await;
        Ok(notification)
    }
}
