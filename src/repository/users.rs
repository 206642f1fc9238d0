//! User lookups

use crate::{
    error::{AppError, AppResult},
    models::user::{Recipient, User},
};

use super::Repository;

impl Repository {
    /// Get active user by login (case-insensitive)
    pub async fn users_get_by_login(&self, login: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE LOWER(login) = LOWER($1) AND is_active",
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn users_get_by_id(&self, id: i32) -> AppResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    pub async fn users_exists(&self, id: i32) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    /// IDs of active staff members of `department`
    pub async fn users_staff_ids(&self, department: &str) -> AppResult<Vec<i32>> {
        let ids: Vec<i32> = sqlx::query_scalar(
            r#"
            SELECT id FROM users
            WHERE is_staff AND is_active AND LOWER(department) = LOWER($1)
            ORDER BY id
            "#,
        )
        .bind(department)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// Email addresses for the given users
    pub async fn users_recipients(&self, ids: &[i32]) -> AppResult<Vec<Recipient>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, Recipient>(
            "SELECT id, email FROM users WHERE id = ANY($1) AND is_active",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
