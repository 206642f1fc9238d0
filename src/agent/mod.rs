//! Host telemetry agent
//!
//! Collects a [`ReportDocument`](crate::models::report::ReportDocument) describing
//! the local machine and submits it to the inventory server with a JWT session.

pub mod auth;
pub mod collector;
pub mod config;
pub mod platform;
pub mod transport;

pub use auth::TokenSession;
pub use collector::Collector;
pub use config::AgentConfig;
pub use platform::{Facet, Platform, ProbeError, SysinfoPlatform};
pub use transport::{ApiResponse, ApiTransport, ReqwestTransport};

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

use crate::models::report::IngestResult;

/// Path of the ingestion endpoint
pub const EQUIPMENT_PATH: &str = "/api/equipment/";

/// Agent error taxonomy
#[derive(Error, Debug)]
pub enum AgentError {
    /// Connection failure, timeout or unavailable server; worth retrying
    #[error("Network error: {0}")]
    TransientNetwork(String),

    /// Credentials or tokens rejected
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Server returned {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Collect one report and submit it
pub async fn run_once<T: ApiTransport>(
    collector: &Collector,
    session: &mut TokenSession<T>,
) -> Result<IngestResult, AgentError> {
    let report = collector.collect().await;
    info!(
        serial_number = %report.serial_number,
        software = report.installed_software.len(),
        peripherals = report.peripherals.len(),
        "Report collected"
    );

    let body = serde_json::to_value(&report)
        .map_err(|e| AgentError::Config(format!("Cannot encode report: {}", e)))?;
    let response = session.send_authorized(EQUIPMENT_PATH, &body).await?;

    let result: IngestResult = serde_json::from_value(response).map_err(|e| AgentError::Server {
        status: 200,
        message: format!("Unexpected ingestion response: {}", e),
    })?;

    info!(
        equipment_id = result.equipment_id,
        created = result.created,
        software_synced = result.software_synced,
        peripherals_synced = result.peripherals_synced,
        "Report accepted"
    );
    Ok(result)
}

/// Report every `interval` until `shutdown` resolves. Failures are logged and
/// the next cycle starts from a fresh collection.
pub async fn run<T, S>(
    collector: &Collector,
    session: &mut TokenSession<T>,
    interval: Duration,
    shutdown: S,
) where
    T: ApiTransport,
    S: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    info!(interval = ?interval, "Agent started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = run_once(collector, session).await {
                    error!(error = %e, "Reporting cycle failed");
                }
            }
            _ = &mut shutdown => {
                info!("Agent stopping");
                break;
            }
        }
    }
}
