//! Analytics endpoints

use axum::{extract::State, Json};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{error::AppResult, AppState};

use super::AuthenticatedUser;

#[derive(Debug, Serialize, ToSchema)]
pub struct StatEntry {
    pub label: String,
    pub value: i64,
    /// Share of the total, 0 when the total is 0
    pub percentage: f64,
}

/// Inventory totals and breakdowns
#[derive(Debug, Serialize, ToSchema)]
pub struct InventorySummary {
    pub total: i64,
    pub working: i64,
    pub working_percentage: f64,
    pub by_category: Vec<StatEntry>,
    pub by_status: Vec<StatEntry>,
    pub by_manufacturer: Vec<StatEntry>,
    pub by_location: Vec<StatEntry>,
    pub by_purchase_year: Vec<StatEntry>,
}

/// Purchase and depreciated values of equipment in service
#[derive(Debug, Serialize, ToSchema)]
pub struct FinancialSummary {
    pub total_purchase_value: Decimal,
    pub current_value: Decimal,
    pub total_depreciation: Decimal,
    pub average_purchase_price: Decimal,
    /// Equipment with a known purchase price
    pub priced_count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MaintenanceSummary {
    pub needs_maintenance: i64,
    /// More than 30 days past the maintenance date
    pub overdue_over_30_days: i64,
    pub in_repair: i64,
    pub under_warranty: i64,
    pub warranty_expiring_30_days: i64,
    pub requests_by_status: Vec<StatEntry>,
}

/// Unread notifications of the caller
#[derive(Debug, Serialize, ToSchema)]
pub struct NotificationSummary {
    pub unread: i64,
    pub unread_by_priority: Vec<StatEntry>,
    pub unread_by_type: Vec<StatEntry>,
}

/// Inventory summary
#[utoipa::path(
    get,
    path = "/analytics/summary",
    tag = "analytics",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Inventory summary", body = InventorySummary)
    )
)]
pub async fn summary(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<InventorySummary>> {
    Ok(Json(state.services.analytics.summary().await?))
}

/// Financial summary
#[utoipa::path(
    get,
    path = "/analytics/financial",
    tag = "analytics",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Financial summary", body = FinancialSummary)
    )
)]
pub async fn financial(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<FinancialSummary>> {
    Ok(Json(state.services.analytics.financial().await?))
}

/// Maintenance and warranty summary
#[utoipa::path(
    get,
    path = "/analytics/maintenance",
    tag = "analytics",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Maintenance summary", body = MaintenanceSummary)
    )
)]
pub async fn maintenance(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<MaintenanceSummary>> {
    Ok(Json(state.services.analytics.maintenance().await?))
}

/// Notification summary for the caller
#[utoipa::path(
    get,
    path = "/analytics/notifications",
    tag = "analytics",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Notification summary", body = NotificationSummary)
    )
)]
pub async fn notifications(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<NotificationSummary>> {
    Ok(Json(state.services.analytics.notifications(claims.user_id).await?))
}
