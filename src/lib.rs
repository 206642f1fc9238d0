//! IT asset inventory
//!
//! REST JSON server receiving host telemetry, tracking equipment lifecycle,
//! maintenance and credentials, and raising scheduled alerts; plus the
//! telemetry agent that reports each host to it.

use std::sync::Arc;

pub mod agent;
pub mod api;
pub mod config;
pub mod error;
pub mod jobs;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
