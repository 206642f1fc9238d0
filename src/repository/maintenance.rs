//! Maintenance requests and schedules repository

use chrono::{Duration, NaiveDate, Utc};

use super::Repository;
use crate::{
    error::{AppError, AppResult},
    models::{
        enums::{Frequency, Priority, RequestStatus},
        equipment::MAINTENANCE_INTERVAL_DAYS,
        maintenance::{
            CreateMaintenanceRequest, MaintenanceRequest, MaintenanceRequestQuery,
            MaintenanceSchedule, RequestAction,
        },
    },
};

impl Repository {
    pub async fn maintenance_list_requests(
        &self,
        query: &MaintenanceRequestQuery,
    ) -> AppResult<Vec<MaintenanceRequest>> {
        let rows = sqlx::query_as::<_, MaintenanceRequest>(
            r#"
            SELECT * FROM maintenance_requests
            WHERE ($1::int IS NULL OR equipment_id = $1)
              AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(query.equipment_id)
        .bind(query.status)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn maintenance_get_request(&self, id: i32) -> AppResult<MaintenanceRequest> {
        sqlx::query_as::<_, MaintenanceRequest>("SELECT * FROM maintenance_requests WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Maintenance request {} not found", id)))
    }

    pub async fn maintenance_create_request(
        &self,
        data: &CreateMaintenanceRequest,
        requested_by: i32,
    ) -> AppResult<MaintenanceRequest> {
        let row = sqlx::query_as::<_, MaintenanceRequest>(
            r#"
            INSERT INTO maintenance_requests
                (equipment_id, title, description, priority, status, requested_by, assigned_to)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(data.equipment_id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.priority.unwrap_or(Priority::Medium))
        .bind(RequestStatus::Pending)
        .bind(requested_by)
        .bind(data.assigned_to)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Apply a lifecycle action, stamping the matching timestamp.
    ///
    /// Completion also records the maintenance on the equipment in the same
    /// transaction.
    pub async fn maintenance_transition_request(
        &self,
        id: i32,
        action: RequestAction,
    ) -> AppResult<MaintenanceRequest> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, MaintenanceRequest>(
            "SELECT * FROM maintenance_requests WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Maintenance request {} not found", id)))?;

        let next = current.status.apply(action).ok_or_else(|| {
            AppError::BusinessRule(format!(
                "Cannot {:?} a request in status {}",
                action, current.status
            ))
        })?;

        let column = match action {
            RequestAction::Approve => "approved_at",
            RequestAction::Start => "started_at",
            RequestAction::Complete => "completed_at",
            RequestAction::Cancel => "cancelled_at",
        };
        let sql = format!(
            "UPDATE maintenance_requests SET status = $1, {} = NOW() WHERE id = $2 RETURNING *",
            column
        );
        let updated = sqlx::query_as::<_, MaintenanceRequest>(&sql)
            .bind(next)
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        if next == RequestStatus::Completed {
            let today = Utc::now().date_naive();
            Self::equipment_record_maintenance(
                &mut tx,
                updated.equipment_id,
                today,
                today + Duration::days(MAINTENANCE_INTERVAL_DAYS),
            )
            .await?;
        }

        tx.commit().await?;
        Ok(updated)
    }

    pub async fn maintenance_count_requests_by_status(&self) -> AppResult<Vec<(RequestStatus, i64)>> {
        let rows: Vec<(RequestStatus, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM maintenance_requests GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn maintenance_list_schedules(&self, equipment_id: i32) -> AppResult<Vec<MaintenanceSchedule>> {
        let rows = sqlx::query_as::<_, MaintenanceSchedule>(
            "SELECT * FROM maintenance_schedules WHERE equipment_id = $1 ORDER BY next_due",
        )
        .bind(equipment_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn maintenance_get_schedule(&self, id: i32) -> AppResult<MaintenanceSchedule> {
        sqlx::query_as::<_, MaintenanceSchedule>("SELECT * FROM maintenance_schedules WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Maintenance schedule {} not found", id)))
    }

    pub async fn maintenance_create_schedule(
        &self,
        equipment_id: i32,
        title: &str,
        frequency: Frequency,
        custom_interval_days: Option<i32>,
        next_due: NaiveDate,
    ) -> AppResult<MaintenanceSchedule> {
        let row = sqlx::query_as::<_, MaintenanceSchedule>(
            r#"
            INSERT INTO maintenance_schedules (equipment_id, title, frequency, custom_interval_days, next_due)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(equipment_id)
        .bind(title)
        .bind(frequency)
        .bind(custom_interval_days)
        .bind(next_due)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    /// Record a performed run and move the schedule forward
    pub async fn maintenance_perform_schedule(
        &self,
        id: i32,
        performed_on: NaiveDate,
        next_due: NaiveDate,
    ) -> AppResult<MaintenanceSchedule> {
        let mut tx = self.pool.begin().await?;

        let schedule = sqlx::query_as::<_, MaintenanceSchedule>(
            r#"
            UPDATE maintenance_schedules SET last_performed = $1, next_due = $2
            WHERE id = $3
            RETURNING *
            "#,
        )
        .bind(performed_on)
        .bind(next_due)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Maintenance schedule {} not found", id)))?;

        Self::equipment_record_maintenance(&mut tx, schedule.equipment_id, performed_on, next_due)
            .await?;

        tx.commit().await?;
        Ok(schedule)
    }
}
