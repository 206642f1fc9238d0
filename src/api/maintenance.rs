//! Maintenance request and schedule endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::maintenance::{
        CreateMaintenanceRequest, CreateMaintenanceSchedule, MaintenanceRequestQuery,
        MaintenanceRequestView, MaintenanceSchedule, RequestAction,
    },
    AppState,
};

use super::AuthenticatedUser;

/// List maintenance requests
#[utoipa::path(
    get,
    path = "/maintenance/requests/",
    tag = "maintenance",
    security(("bearer_auth" = [])),
    params(MaintenanceRequestQuery),
    responses(
        (status = 200, description = "Maintenance requests", body = Vec<MaintenanceRequestView>)
    )
)]
pub async fn list_requests(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<MaintenanceRequestQuery>,
) -> AppResult<Json<Vec<MaintenanceRequestView>>> {
    Ok(Json(state.services.maintenance.list_requests(&query).await?))
}

/// Open a maintenance request
#[utoipa::path(
    post,
    path = "/maintenance/requests/",
    tag = "maintenance",
    security(("bearer_auth" = [])),
    request_body = CreateMaintenanceRequest,
    responses(
        (status = 201, description = "Request created", body = MaintenanceRequestView)
    )
)]
pub async fn create_request(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(data): Json<CreateMaintenanceRequest>,
) -> AppResult<(StatusCode, Json<MaintenanceRequestView>)> {
    let request = state
        .services
        .maintenance
        .create_request(&data, claims.user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// Get a maintenance request
#[utoipa::path(
    get,
    path = "/maintenance/requests/{id}",
    tag = "maintenance",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Maintenance request", body = MaintenanceRequestView)
    )
)]
pub async fn get_request(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<MaintenanceRequestView>> {
    Ok(Json(state.services.maintenance.get_request(id).await?))
}

/// Move a request through its lifecycle
#[utoipa::path(
    post,
    path = "/maintenance/requests/{id}/{action}",
    tag = "maintenance",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Request ID"),
        ("action" = RequestAction, Path, description = "approve, start, complete or cancel")
    ),
    responses(
        (status = 200, description = "Request updated", body = MaintenanceRequestView),
        (status = 422, description = "Action not allowed in the current status", body = crate::error::ErrorResponse)
    )
)]
pub async fn transition_request(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path((id, action)): Path<(i32, RequestAction)>,
) -> AppResult<Json<MaintenanceRequestView>> {
    claims.require_staff()?;
    Ok(Json(state.services.maintenance.transition(id, action).await?))
}

/// Schedules of one equipment
#[utoipa::path(
    get,
    path = "/maintenance/equipment/{id}/schedules",
    tag = "maintenance",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Equipment ID")),
    responses(
        (status = 200, description = "Schedules", body = Vec<MaintenanceSchedule>)
    )
)]
pub async fn list_schedules(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<MaintenanceSchedule>>> {
    Ok(Json(state.services.maintenance.list_schedules(id).await?))
}

/// Create a recurring schedule
#[utoipa::path(
    post,
    path = "/maintenance/schedules/",
    tag = "maintenance",
    security(("bearer_auth" = [])),
    request_body = CreateMaintenanceSchedule,
    responses(
        (status = 201, description = "Schedule created", body = MaintenanceSchedule)
    )
)]
pub async fn create_schedule(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(data): Json<CreateMaintenanceSchedule>,
) -> AppResult<(StatusCode, Json<MaintenanceSchedule>)> {
    claims.require_staff()?;
    let schedule = state.services.maintenance.create_schedule(&data).await?;
    Ok((StatusCode::CREATED, Json(schedule)))
}

/// Record a scheduled maintenance as performed today
#[utoipa::path(
    post,
    path = "/maintenance/schedules/{id}/perform",
    tag = "maintenance",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Schedule ID")),
    responses(
        (status = 200, description = "Schedule advanced", body = MaintenanceSchedule)
    )
)]
pub async fn perform_schedule(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<MaintenanceSchedule>> {
    claims.require_staff()?;
    Ok(Json(state.services.maintenance.perform_schedule(id).await?))
}
