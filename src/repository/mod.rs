//! Repository layer for database operations

pub mod analytics;
pub mod equipment;
pub mod maintenance;
pub mod notifications;
pub mod users;
pub mod vault;

use sqlx::{Pool, Postgres};

/// Main repository struct holding database connection pool.
///
/// Domain methods are implemented in the submodules as `impl Repository`
/// blocks, prefixed with the domain name (`equipment_*`, `notifications_*`, ...).
#[derive(Clone)]
pub struct Repository {
    pub pool: Pool<Postgres>,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Check database connectivity
    pub async fn ping(&self) -> crate::error::AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
