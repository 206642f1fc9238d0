//! Inventory Server
//!
//! REST API server for IT asset inventory and the periodic alerting jobs.

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use inventory_server::{
    api,
    config::{AppConfig, LoggingConfig},
    jobs,
    repository::Repository,
    services::Services,
    AppState,
};

const JOB_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;

    init_tracing(&config.logging);

    tracing::info!("Starting Inventory Server v{}", env!("CARGO_PKG_VERSION"));

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .connect(&config.database.url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!("Connected to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;

    tracing::info!("Database migrations completed");

    let repository = Repository::new(pool);
    let services = Services::new(repository, &config);

    let scheduler = if config.jobs.enabled {
        let mut scheduler = jobs::build_scheduler(&services, &config.jobs);
        scheduler.start();
        Some(scheduler)
    } else {
        tracing::info!("Background jobs disabled");
        None
    };

    let addr = SocketAddr::new(
        config.server.host.parse().context("Invalid host address")?,
        config.server.port,
    );

    let state = AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    };

    let app = create_router(state);

    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(scheduler) = scheduler {
        scheduler.shutdown();
        scheduler.wait_for_shutdown(JOB_SHUTDOWN_TIMEOUT).await;
    }

    tracing::info!("Server stopped");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("inventory_server={},tower_http=debug", logging.level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Create the application router with all routes
fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let routes = Router::new()
        // Health check
        .route("/health", get(api::health::health_check))
        .route("/ready", get(api::health::readiness_check))
        // Authentication
        .route("/token/", post(api::auth::obtain_token))
        .route("/token", post(api::auth::obtain_token))
        .route("/token/refresh/", post(api::auth::refresh_token))
        .route("/token/refresh", post(api::auth::refresh_token))
        .route("/me", get(api::auth::me))
        // Equipment
        .route(
            "/equipment/",
            get(api::equipment::list_equipment).post(api::equipment::ingest_report),
        )
        .route(
            "/equipment",
            get(api::equipment::list_equipment).post(api::equipment::ingest_report),
        )
        .route(
            "/equipment/:id",
            get(api::equipment::get_equipment)
                .put(api::equipment::update_equipment)
                .delete(api::equipment::delete_equipment),
        )
        .route("/equipment/:id/status", post(api::equipment::change_status))
        .route("/equipment/:id/software", get(api::equipment::list_software))
        .route("/equipment/:id/peripherals", get(api::equipment::list_peripherals))
        // Notifications
        .route(
            "/notifications/",
            get(api::notifications::list_notifications).post(api::notifications::create_notification),
        )
        .route(
            "/notifications",
            get(api::notifications::list_notifications).post(api::notifications::create_notification),
        )
        .route("/notifications/unread-count", get(api::notifications::unread_count))
        .route("/notifications/read", post(api::notifications::mark_read_bulk))
        .route("/notifications/:id/read", post(api::notifications::mark_read))
        // Maintenance
        .route(
            "/maintenance/requests/",
            get(api::maintenance::list_requests).post(api::maintenance::create_request),
        )
        .route(
            "/maintenance/requests",
            get(api::maintenance::list_requests).post(api::maintenance::create_request),
        )
        .route("/maintenance/requests/:id", get(api::maintenance::get_request))
        .route(
            "/maintenance/requests/:id/:action",
            post(api::maintenance::transition_request),
        )
        .route(
            "/maintenance/equipment/:id/schedules",
            get(api::maintenance::list_schedules),
        )
        .route("/maintenance/schedules/", post(api::maintenance::create_schedule))
        .route("/maintenance/schedules", post(api::maintenance::create_schedule))
        .route(
            "/maintenance/schedules/:id/perform",
            post(api::maintenance::perform_schedule),
        )
        // Vault
        .route(
            "/vault/systems/",
            get(api::vault::list_systems).post(api::vault::create_system),
        )
        .route(
            "/vault/systems",
            get(api::vault::list_systems).post(api::vault::create_system),
        )
        .route(
            "/vault/systems/:id/accounts",
            get(api::vault::list_accounts).post(api::vault::create_account),
        )
        .route(
            "/vault/accounts/:id/password",
            get(api::vault::reveal_password).put(api::vault::update_password),
        )
        .route("/vault/accounts/:id/generate", post(api::vault::generate_password))
        .route("/vault/accounts/:id/logs", get(api::vault::access_logs))
        // Analytics
        .route("/analytics/summary", get(api::analytics::summary))
        .route("/analytics/financial", get(api::analytics::financial))
        .route("/analytics/maintenance", get(api::analytics::maintenance))
        .route("/analytics/notifications", get(api::analytics::notifications))
        .with_state(state);

    let openapi = api::openapi::create_openapi_router();

    Router::new()
        .nest("/api", routes)
        .merge(openapi)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
