//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{analytics, auth, equipment, health, maintenance, notifications, vault};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "IT Inventory API",
        version = "1.0.0",
        description = "Equipment inventory, telemetry ingestion, maintenance, alerting and credential vault",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api", description = "API")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::obtain_token,
        auth::refresh_token,
        auth::me,
        // Equipment
        equipment::ingest_report,
        equipment::list_equipment,
        equipment::get_equipment,
        equipment::update_equipment,
        equipment::change_status,
        equipment::delete_equipment,
        equipment::list_software,
        equipment::list_peripherals,
        // Notifications
        notifications::list_notifications,
        notifications::unread_count,
        notifications::mark_read,
        notifications::mark_read_bulk,
        notifications::create_notification,
        // Maintenance
        maintenance::list_requests,
        maintenance::create_request,
        maintenance::get_request,
        maintenance::transition_request,
        maintenance::list_schedules,
        maintenance::create_schedule,
        maintenance::perform_schedule,
        // Vault
        vault::list_systems,
        vault::create_system,
        vault::list_accounts,
        vault::create_account,
        vault::reveal_password,
        vault::update_password,
        vault::generate_password,
        vault::access_logs,
        // Analytics
        analytics::summary,
        analytics::financial,
        analytics::maintenance,
        analytics::notifications,
    ),
    components(
        schemas(
            // Auth
            auth::TokenRequest,
            auth::RefreshRequest,
            auth::AccessToken,
            crate::models::user::TokenPair,
            crate::models::user::User,
            // Equipment
            crate::models::equipment::EquipmentView,
            crate::models::equipment::UpdateEquipment,
            crate::models::equipment::ChangeStatus,
            crate::models::equipment::InstalledSoftware,
            crate::models::equipment::Peripheral,
            crate::models::report::ReportDocument,
            crate::models::report::CpuInfo,
            crate::models::report::MemoryInfo,
            crate::models::report::DiskInfo,
            crate::models::report::GpuInfo,
            crate::models::report::NetworkAdapter,
            crate::models::report::SoftwareEntry,
            crate::models::report::PeripheralEntry,
            crate::models::report::IngestResult,
            crate::models::enums::EquipmentCategory,
            crate::models::enums::EquipmentStatus,
            // Notifications
            crate::models::notification::Notification,
            crate::models::notification::CreateNotification,
            crate::models::notification::MarkRead,
            crate::models::enums::NotificationType,
            crate::models::enums::Priority,
            crate::models::enums::RuleKey,
            notifications::NotificationPage,
            notifications::UnreadCount,
            notifications::MarkedRead,
            // Maintenance
            crate::models::maintenance::MaintenanceRequestView,
            crate::models::maintenance::CreateMaintenanceRequest,
            crate::models::maintenance::MaintenanceSchedule,
            crate::models::maintenance::CreateMaintenanceSchedule,
            crate::models::maintenance::RequestAction,
            crate::models::enums::RequestStatus,
            crate::models::enums::Frequency,
            // Vault
            crate::models::vault::System,
            crate::models::vault::CreateSystem,
            crate::models::vault::SystemAccount,
            crate::models::vault::SystemAccountView,
            crate::models::vault::CreateSystemAccount,
            crate::models::vault::UpdatePassword,
            crate::models::vault::RevealedPassword,
            crate::models::vault::PasswordAccessLog,
            crate::models::enums::AccessAction,
            // Analytics
            analytics::StatEntry,
            analytics::InventorySummary,
            analytics::FinancialSummary,
            analytics::MaintenanceSummary,
            analytics::NotificationSummary,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Token issuance and refresh"),
        (name = "equipment", description = "Telemetry ingestion and equipment lifecycle"),
        (name = "notifications", description = "User notifications"),
        (name = "maintenance", description = "Maintenance requests and schedules"),
        (name = "vault", description = "Credential vault"),
        (name = "analytics", description = "Inventory analytics")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_ingestion_and_bearer_scheme() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/equipment/"));
        assert!(doc.paths.paths.contains_key("/token/refresh/"));
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
