//! Maintenance requests and recurring schedules

use chrono::Utc;
use tracing::info;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        enums::Frequency,
        maintenance::{
            CreateMaintenanceRequest, CreateMaintenanceSchedule, MaintenanceRequest,
            MaintenanceRequestQuery, MaintenanceRequestView, MaintenanceSchedule, RequestAction,
        },
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct MaintenanceService {
    repository: Repository,
}

impl MaintenanceService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn list_requests(&self, query: &MaintenanceRequestQuery) -> AppResult<Vec<MaintenanceRequestView>> {
        let requests = self.repository.maintenance_list_requests(query).await?;
        Ok(requests.into_iter().map(MaintenanceRequestView::from).collect())
    }

    pub async fn get_request(&self, id: i32) -> AppResult<MaintenanceRequestView> {
        Ok(self.repository.maintenance_get_request(id).await?.into())
    }

    pub async fn create_request(
        &self,
        data: &CreateMaintenanceRequest,
        requested_by: i32,
    ) -> AppResult<MaintenanceRequestView> {
        data.validate()?;
        self.repository.equipment_get_by_id(data.equipment_id).await?;
        let request = self
            .repository
            .maintenance_create_request(data, requested_by)
            .await?;
        info!(request_id = request.id, equipment_id = request.equipment_id, "Maintenance request created");
        Ok(request.into())
    }

    pub async fn transition(&self, id: i32, action: RequestAction) -> AppResult<MaintenanceRequestView> {
        let request: MaintenanceRequest = self
            .repository
            .maintenance_transition_request(id, action)
            .await?;
        info!(request_id = id, status = %request.status, "Maintenance request updated");
        Ok(request.into())
    }

    pub async fn list_schedules(&self, equipment_id: i32) -> AppResult<Vec<MaintenanceSchedule>> {
        self.repository.equipment_get_by_id(equipment_id).await?;
        self.repository.maintenance_list_schedules(equipment_id).await
    }

    pub async fn create_schedule(&self, data: &CreateMaintenanceSchedule) -> AppResult<MaintenanceSchedule> {
        data.validate()?;
        if data.frequency == Frequency::Custom && data.custom_interval_days.is_none() {
            return Err(AppError::Validation(
                "custom_interval_days is required for a custom frequency".to_string(),
            ));
        }
        self.repository.equipment_get_by_id(data.equipment_id).await?;

        let today = Utc::now().date_naive();
        let next_due = match data.first_due {
            Some(date) => date,
            None => data
                .frequency
                .next_after(today, data.custom_interval_days)
                .ok_or_else(|| AppError::Validation("Cannot compute next due date".to_string()))?,
        };

        self.repository
            .maintenance_create_schedule(
                data.equipment_id,
                &data.title,
                data.frequency,
                data.custom_interval_days,
                next_due,
            )
            .await
    }

    /// Record that the scheduled maintenance was performed today
    pub async fn perform_schedule(&self, id: i32) -> AppResult<MaintenanceSchedule> {
        let schedule = self.repository.maintenance_get_schedule(id).await?;
        if !schedule.is_active {
            return Err(AppError::BusinessRule(format!("Schedule {} is not active", id)));
        }
        let today = Utc::now().date_naive();
        let next_due = schedule
            .frequency
            .next_after(today, schedule.custom_interval_days)
            .ok_or_else(|| AppError::BusinessRule(format!("Schedule {} has no valid interval", id)))?;

        let schedule = self
            .repository
            .maintenance_perform_schedule(id, today, next_due)
            .await?;
        info!(schedule_id = id, next_due = %schedule.next_due, "Scheduled maintenance performed");
        Ok(schedule)
    }
}
