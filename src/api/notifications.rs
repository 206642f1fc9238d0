//! Notification endpoints for the current user

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::notification::{CreateNotification, MarkRead, Notification, NotificationQuery},
    AppState,
};

use super::AuthenticatedUser;

#[derive(Serialize, ToSchema)]
pub struct NotificationPage {
    pub items: Vec<Notification>,
    pub total: i64,
}

#[derive(Serialize, ToSchema)]
pub struct UnreadCount {
    pub unread: i64,
}

#[derive(Serialize, ToSchema)]
pub struct MarkedRead {
    pub updated: u64,
}

/// List the caller's notifications
#[utoipa::path(
    get,
    path = "/notifications/",
    tag = "notifications",
    security(("bearer_auth" = [])),
    params(NotificationQuery),
    responses(
        (status = 200, description = "Notifications, newest first", body = NotificationPage)
    )
)]
pub async fn list_notifications(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<NotificationQuery>,
) -> AppResult<Json<NotificationPage>> {
    let (items, total) = state.services.notifications.list(claims.user_id, &query).await?;
    Ok(Json(NotificationPage { items, total }))
}

/// Number of unread notifications
#[utoipa::path(
    get,
    path = "/notifications/unread-count",
    tag = "notifications",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Unread count", body = UnreadCount)
    )
)]
pub async fn unread_count(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<UnreadCount>> {
    let unread = state.services.notifications.unread_count(claims.user_id).await?;
    Ok(Json(UnreadCount { unread }))
}

/// Mark one notification as read
#[utoipa::path(
    post,
    path = "/notifications/{id}/read",
    tag = "notifications",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Notification marked read", body = Notification),
        (status = 404, description = "Not one of the caller's notifications", body = crate::error::ErrorResponse)
    )
)]
pub async fn mark_read(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Notification>> {
    let notification = state.services.notifications.mark_read(claims.user_id, id).await?;
    Ok(Json(notification))
}

/// Mark several (or all) notifications as read
#[utoipa::path(
    post,
    path = "/notifications/read",
    tag = "notifications",
    security(("bearer_auth" = [])),
    request_body = MarkRead,
    responses(
        (status = 200, description = "Notifications marked read", body = MarkedRead)
    )
)]
pub async fn mark_read_bulk(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    body: Option<Json<MarkRead>>,
) -> AppResult<Json<MarkedRead>> {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let updated = state
        .services
        .notifications
        .mark_read_bulk(claims.user_id, request.ids.as_deref())
        .await?;
    Ok(Json(MarkedRead { updated }))
}

/// Create a manual note or issue report
#[utoipa::path(
    post,
    path = "/notifications/",
    tag = "notifications",
    security(("bearer_auth" = [])),
    request_body = CreateNotification,
    responses(
        (status = 201, description = "Notification created", body = Notification)
    )
)]
pub async fn create_notification(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(data): Json<CreateNotification>,
) -> AppResult<(StatusCode, Json<Notification>)> {
    tracing::info!(from = claims.user_id, to = data.user_id, "Manual notification");
    let notification = state.services.notifications.create_manual(data).await?;
    Ok((StatusCode::CREATED, Json(notification)))
}
