//! Equipment API endpoints: telemetry ingestion and lifecycle administration

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::{
        equipment::{ChangeStatus, EquipmentQuery, EquipmentView, InstalledSoftware, Peripheral, UpdateEquipment},
        report::{IngestResult, ReportDocument},
    },
    AppState,
};

use super::AuthenticatedUser;

/// Submit a telemetry report
///
/// Creates the equipment on first sight of its serial number, otherwise
/// updates the agent-owned fields and reconciles software and peripherals.
#[utoipa::path(
    post,
    path = "/equipment/",
    tag = "equipment",
    security(("bearer_auth" = [])),
    request_body = ReportDocument,
    responses(
        (status = 201, description = "Equipment created", body = IngestResult),
        (status = 200, description = "Equipment updated", body = IngestResult),
        (status = 400, description = "Malformed report", body = crate::error::ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = crate::error::ErrorResponse)
    )
)]
pub async fn ingest_report(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    payload: Result<Json<ReportDocument>, JsonRejection>,
) -> AppResult<(StatusCode, Json<IngestResult>)> {
    let Json(report) = payload?;
    tracing::debug!(user_id = claims.user_id, serial_number = %report.serial_number, "Telemetry report received");
    let result = state.services.equipment.ingest(report).await?;
    let status = if result.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(result)))
}

/// List equipment
#[utoipa::path(
    get,
    path = "/equipment/",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(EquipmentQuery),
    responses(
        (status = 200, description = "Equipment list", body = Vec<EquipmentView>)
    )
)]
pub async fn list_equipment(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<EquipmentQuery>,
) -> AppResult<Json<Vec<EquipmentView>>> {
    let equipment = state.services.equipment.list(&query).await?;
    Ok(Json(equipment))
}

/// Get equipment by ID
#[utoipa::path(
    get,
    path = "/equipment/{id}",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Equipment ID")),
    responses(
        (status = 200, description = "Equipment details", body = EquipmentView),
        (status = 404, description = "Equipment not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_equipment(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<EquipmentView>> {
    let equipment = state.services.equipment.get_by_id(id).await?;
    Ok(Json(equipment))
}

/// Update administrator-curated fields
#[utoipa::path(
    put,
    path = "/equipment/{id}",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Equipment ID")),
    request_body = UpdateEquipment,
    responses(
        (status = 200, description = "Equipment updated", body = EquipmentView),
        (status = 403, description = "Staff only", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_equipment(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(data): Json<UpdateEquipment>,
) -> AppResult<Json<EquipmentView>> {
    claims.require_staff()?;
    let equipment = state.services.equipment.update(id, &data).await?;
    Ok(Json(equipment))
}

/// Change equipment status
#[utoipa::path(
    post,
    path = "/equipment/{id}/status",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Equipment ID")),
    request_body = ChangeStatus,
    responses(
        (status = 200, description = "Status changed", body = EquipmentView),
        (status = 422, description = "Transition not allowed", body = crate::error::ErrorResponse)
    )
)]
pub async fn change_status(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(data): Json<ChangeStatus>,
) -> AppResult<Json<EquipmentView>> {
    claims.require_staff()?;
    let equipment = state.services.equipment.change_status(id, data.status).await?;
    Ok(Json(equipment))
}

/// Delete equipment
#[utoipa::path(
    delete,
    path = "/equipment/{id}",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Equipment ID")),
    responses(
        (status = 204, description = "Equipment deleted")
    )
)]
pub async fn delete_equipment(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    claims.require_staff()?;
    state.services.equipment.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Installed software of one equipment
#[utoipa::path(
    get,
    path = "/equipment/{id}/software",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Equipment ID")),
    responses(
        (status = 200, description = "Installed software", body = Vec<InstalledSoftware>)
    )
)]
pub async fn list_software(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<InstalledSoftware>>> {
    Ok(Json(state.services.equipment.software(id).await?))
}

/// Peripherals attached to one equipment
#[utoipa::path(
    get,
    path = "/equipment/{id}/peripherals",
    tag = "equipment",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Equipment ID")),
    responses(
        (status = 200, description = "Peripherals", body = Vec<Peripheral>)
    )
)]
pub async fn list_peripherals(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<Peripheral>>> {
    Ok(Json(state.services.equipment.peripherals(id).await?))
}
