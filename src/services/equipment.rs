//! Equipment service: telemetry ingestion and lifecycle administration

use chrono::Utc;
use tracing::{info, warn};
use validator::Validate;

use super::notifications::NotificationsService;
use crate::{
    error::{AppError, AppResult},
    models::{
        enums::{EquipmentStatus, NotificationType, Priority, RuleKey},
        equipment::{Equipment, EquipmentQuery, EquipmentView, InstalledSoftware, Peripheral, UpdateEquipment},
        notification::{fit_title, NotificationDraft},
        report::{IngestResult, ReportDocument},
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct EquipmentService {
    repository: Repository,
    notifications: NotificationsService,
}

/// INFO notices telling IT staff about newly registered equipment
pub fn registration_notices(equipment: &Equipment, staff: &[i32]) -> Vec<NotificationDraft> {
    staff
        .iter()
        .map(|user_id| NotificationDraft {
            user_id: *user_id,
            equipment_id: Some(equipment.id),
            title: fit_title(format!("New equipment registered: {}", equipment.name)),
            message: format!(
                "{} ({}, S/N {}) reported in for the first time.",
                equipment.name, equipment.category, equipment.serial_number
            ),
            notification_type: NotificationType::Info,
            priority: Priority::Low,
            rule_key: Some(RuleKey::System),
        })
        .collect()
}

impl EquipmentService {
    pub fn new(repository: Repository, notifications: NotificationsService) -> Self {
        Self {
            repository,
            notifications,
        }
    }

    /// Upsert a telemetry report keyed by serial number
    pub async fn ingest(&self, report: ReportDocument) -> AppResult<IngestResult> {
        report.validate()?;

        let staff = self.notifications.staff_ids().await?;
        let (result, notices) = self
            .repository
            .equipment_ingest(&report, |equipment| registration_notices(equipment, &staff))
            .await?;

        info!(
            equipment_id = result.equipment_id,
            serial_number = %report.serial_number,
            created = result.created,
            software_synced = result.software_synced,
            peripherals_synced = result.peripherals_synced,
            software_removed = result.software_removed,
            peripherals_removed = result.peripherals_removed,
            "Telemetry report ingested"
        );

        self.notifications.dispatch_emails(&notices).await;
        Ok(result)
    }

    pub async fn list(&self, query: &EquipmentQuery) -> AppResult<Vec<EquipmentView>> {
        let today = Utc::now().date_naive();
        let equipment = self.repository.equipment_list(query).await?;
        Ok(equipment.into_iter().map(|e| e.into_view(today)).collect())
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<EquipmentView> {
        let equipment = self.repository.equipment_get_by_id(id).await?;
        Ok(equipment.into_view(Utc::now().date_naive()))
    }

    pub async fn update(&self, id: i32, data: &UpdateEquipment) -> AppResult<EquipmentView> {
        data.validate()?;
        if let Some(price) = data.purchase_price {
            if price.is_sign_negative() {
                return Err(AppError::Validation("purchase_price must not be negative".to_string()));
            }
        }
        let equipment = self.repository.equipment_update(id, data).await?;
        Ok(equipment.into_view(Utc::now().date_naive()))
    }

    /// Move equipment to `status` following the transition table
    pub async fn change_status(&self, id: i32, status: EquipmentStatus) -> AppResult<EquipmentView> {
        let today = Utc::now().date_naive();
        let current = self.repository.equipment_get_by_id(id).await?;
        if current.status == status {
            return Ok(current.into_view(today));
        }
        if !current.status.can_transition_to(status) {
            warn!(equipment_id = id, from = %current.status, to = %status, "Rejected status transition");
            return Err(AppError::BusinessRule(format!(
                "Cannot move equipment from {} to {}",
                current.status, status
            )));
        }
        let updated = self
            .repository
            .equipment_set_status(id, current.status, status)
            .await?;
        info!(equipment_id = id, from = %current.status, to = %status, "Equipment status changed");
        Ok(updated.into_view(today))
    }

    pub async fn delete(&self, id: i32) -> AppResult<()> {
        self.repository.equipment_delete(id).await
    }

    pub async fn software(&self, id: i32) -> AppResult<Vec<InstalledSoftware>> {
        self.repository.equipment_get_by_id(id).await?;
        self.repository.equipment_software(id).await
    }

    pub async fn peripherals(&self, id: i32) -> AppResult<Vec<Peripheral>> {
        self.repository.equipment_get_by_id(id).await?;
        self.repository.equipment_peripherals(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::equipment::tests::equipment;
    use crate::models::notification::TITLE_MAX_CHARS;

    #[test]
    fn test_registration_notices_go_to_each_staff_member() {
        let notices = registration_notices(&equipment(4), &[1, 2]);
        assert_eq!(notices.len(), 2);
        assert!(notices.iter().all(|n| n.rule_key == Some(RuleKey::System)
            && n.notification_type == NotificationType::Info
            && n.equipment_id == Some(4)));
        assert!(notices[0].title.contains("PC-4"));
    }

    #[test]
    fn test_registration_title_fits_column_for_longest_name() {
        let mut e = equipment(5);
        e.name = "x".repeat(255);
        let notices = registration_notices(&e, &[1]);
        assert_eq!(notices[0].title.chars().count(), TITLE_MAX_CHARS);
        assert!(notices[0].title.starts_with("New equipment registered: x"));
    }

    #[test]
    fn test_no_staff_no_notices() {
        assert!(registration_notices(&equipment(1), &[]).is_empty());
    }
}
