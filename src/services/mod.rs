//! Business logic services

pub mod analytics;
pub mod auth;
pub mod email;
pub mod equipment;
pub mod maintenance;
pub mod notifications;
pub mod vault;

use crate::{config::AppConfig, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub auth: auth::AuthService,
    pub equipment: equipment::EquipmentService,
    pub notifications: notifications::NotificationsService,
    pub maintenance: maintenance::MaintenanceService,
    pub vault: vault::VaultService,
    pub analytics: analytics::AnalyticsService,
    pub repository: Repository,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, config: &AppConfig) -> Self {
        let email = email::EmailService::new(config.email.clone());
        let notifications = notifications::NotificationsService::new(
            repository.clone(),
            email,
            config.notifications.clone(),
        );

        Self {
            auth: auth::AuthService::new(repository.clone(), config.auth.clone()),
            equipment: equipment::EquipmentService::new(repository.clone(), notifications.clone()),
            notifications,
            maintenance: maintenance::MaintenanceService::new(repository.clone()),
            vault: vault::VaultService::new(repository.clone(), config.vault.clone()),
            analytics: analytics::AnalyticsService::new(repository.clone()),
            repository,
        }
    }
}
