//! Password vault endpoints (staff only)

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};

use crate::{
    error::AppResult,
    models::vault::{
        CreateSystem, CreateSystemAccount, PasswordAccessLog, RevealedPassword, System,
        SystemAccountView, UpdatePassword,
    },
    AppState,
};

use super::{client_ip, AuthenticatedUser};

/// List systems
#[utoipa::path(
    get,
    path = "/vault/systems/",
    tag = "vault",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Systems", body = Vec<System>)
    )
)]
pub async fn list_systems(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<Vec<System>>> {
    claims.require_staff()?;
    Ok(Json(state.services.vault.list_systems().await?))
}

/// Register a system
#[utoipa::path(
    post,
    path = "/vault/systems/",
    tag = "vault",
    security(("bearer_auth" = [])),
    request_body = CreateSystem,
    responses(
        (status = 201, description = "System created", body = System),
        (status = 409, description = "Name already used", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_system(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(data): Json<CreateSystem>,
) -> AppResult<(StatusCode, Json<System>)> {
    claims.require_staff()?;
    let system = state.services.vault.create_system(&data).await?;
    Ok((StatusCode::CREATED, Json(system)))
}

/// Accounts of a system (passwords are never listed)
#[utoipa::path(
    get,
    path = "/vault/systems/{id}/accounts",
    tag = "vault",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "System ID")),
    responses(
        (status = 200, description = "Accounts", body = Vec<SystemAccountView>)
    )
)]
pub async fn list_accounts(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<SystemAccountView>>> {
    claims.require_staff()?;
    Ok(Json(state.services.vault.list_accounts(id).await?))
}

/// Store a credential for a system
#[utoipa::path(
    post,
    path = "/vault/systems/{id}/accounts",
    tag = "vault",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "System ID")),
    request_body = CreateSystemAccount,
    responses(
        (status = 201, description = "Account created", body = SystemAccountView)
    )
)]
pub async fn create_account(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<i32>,
    Json(data): Json<CreateSystemAccount>,
) -> AppResult<(StatusCode, Json<SystemAccountView>)> {
    claims.require_staff()?;
    let ip = client_ip(&headers);
    let account = state
        .services
        .vault
        .create_account(id, &data, claims.user_id, ip.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(account)))
}

/// Reveal a password (logged as a view)
#[utoipa::path(
    get,
    path = "/vault/accounts/{id}/password",
    tag = "vault",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Account ID")),
    responses(
        (status = 200, description = "Decrypted password", body = RevealedPassword)
    )
)]
pub async fn reveal_password(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> AppResult<Json<RevealedPassword>> {
    claims.require_staff()?;
    let ip = client_ip(&headers);
    let revealed = state
        .services
        .vault
        .reveal_password(id, claims.user_id, ip.as_deref())
        .await?;
    Ok(Json(revealed))
}

/// Replace a password (logged as an edit)
#[utoipa::path(
    put,
    path = "/vault/accounts/{id}/password",
    tag = "vault",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Account ID")),
    request_body = UpdatePassword,
    responses(
        (status = 200, description = "Password changed", body = SystemAccountView)
    )
)]
pub async fn update_password(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<i32>,
    Json(data): Json<UpdatePassword>,
) -> AppResult<Json<SystemAccountView>> {
    claims.require_staff()?;
    let ip = client_ip(&headers);
    let account = state
        .services
        .vault
        .update_password(id, &data, claims.user_id, ip.as_deref())
        .await?;
    Ok(Json(account))
}

/// Generate and store a new random password
#[utoipa::path(
    post,
    path = "/vault/accounts/{id}/generate",
    tag = "vault",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Account ID")),
    responses(
        (status = 200, description = "Generated password", body = RevealedPassword)
    )
)]
pub async fn generate_password(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    headers: HeaderMap,
    Path(id): Path<i32>,
) -> AppResult<Json<RevealedPassword>> {
    claims.require_staff()?;
    let ip = client_ip(&headers);
    let revealed = state
        .services
        .vault
        .generate_password(id, claims.user_id, ip.as_deref())
        .await?;
    Ok(Json(revealed))
}

/// Access history of an account
#[utoipa::path(
    get,
    path = "/vault/accounts/{id}/logs",
    tag = "vault",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Account ID")),
    responses(
        (status = 200, description = "Access log, newest first", body = Vec<PasswordAccessLog>)
    )
)]
pub async fn access_logs(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Vec<PasswordAccessLog>>> {
    claims.require_staff()?;
    Ok(Json(state.services.vault.access_logs(id).await?))
}
