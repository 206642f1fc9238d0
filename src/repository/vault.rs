//! Password vault repository

use chrono::NaiveDate;
use sqlx::PgConnection;

use super::Repository;
use crate::{
    error::{AppError, AppResult},
    models::{
        enums::AccessAction,
        vault::{CreateSystem, PasswordAccessLog, System, SystemAccount},
    },
};

impl Repository {
    pub async fn vault_list_systems(&self) -> AppResult<Vec<System>> {
        let rows = sqlx::query_as::<_, System>("SELECT * FROM systems ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn vault_create_system(&self, data: &CreateSystem) -> AppResult<System> {
        sqlx::query_as::<_, System>(
            r#"
            INSERT INTO systems (name, url, description)
            VALUES ($1, $2, $3)
            ON CONFLICT (name) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(&data.name)
        .bind(&data.url)
        .bind(&data.description)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::Conflict(format!("System '{}' already exists", data.name)))
    }

    pub async fn vault_get_system(&self, id: i32) -> AppResult<System> {
        sqlx::query_as::<_, System>("SELECT * FROM systems WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("System {} not found", id)))
    }

    pub async fn vault_list_accounts(&self, system_id: i32) -> AppResult<Vec<SystemAccount>> {
        let rows = sqlx::query_as::<_, SystemAccount>(
            "SELECT * FROM system_accounts WHERE system_id = $1 ORDER BY username",
        )
        .bind(system_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn vault_get_account(&self, id: i32) -> AppResult<SystemAccount> {
        sqlx::query_as::<_, SystemAccount>("SELECT * FROM system_accounts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Account {} not found", id)))
    }

    /// Store a new account and log its creation in one transaction
    pub async fn vault_create_account(
        &self,
        system_id: i32,
        username: &str,
        ciphertext: &str,
        expires_at: NaiveDate,
        notes: Option<&str>,
        user_id: i32,
        ip_address: Option<&str>,
    ) -> AppResult<SystemAccount> {
        let mut tx = self.pool.begin().await?;

        let account = sqlx::query_as::<_, SystemAccount>(
            r#"
            INSERT INTO system_accounts (system_id, username, password_ciphertext, expires_at, notes)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (system_id, username) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(system_id)
        .bind(username)
        .bind(ciphertext)
        .bind(expires_at)
        .bind(notes)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::Conflict(format!("Account '{}' already exists", username)))?;

        Self::vault_insert_log(&mut tx, account.id, user_id, AccessAction::Edit, ip_address).await?;

        tx.commit().await?;
        Ok(account)
    }

    async fn vault_insert_log(
        conn: &mut PgConnection,
        account_id: i32,
        user_id: i32,
        action: AccessAction,
        ip_address: Option<&str>,
    ) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO password_access_logs (account_id, user_id, action, ip_address) VALUES ($1, $2, $3, $4)",
        )
        .bind(account_id)
        .bind(user_id)
        .bind(action)
        .bind(ip_address)
        .execute(conn)
        .await?;
        Ok(())
    }

    /// Replace the stored ciphertext and log the access in one transaction
    pub async fn vault_set_password(
        &self,
        account_id: i32,
        ciphertext: &str,
        expires_at: NaiveDate,
        action: AccessAction,
        user_id: i32,
        ip_address: Option<&str>,
    ) -> AppResult<SystemAccount> {
        let mut tx = self.pool.begin().await?;

        let account = sqlx::query_as::<_, SystemAccount>(
            r#"
            UPDATE system_accounts
            SET password_ciphertext = $1, expires_at = $2, updated_at = NOW()
            WHERE id = $3
            RETURNING *
            "#,
        )
        .bind(ciphertext)
        .bind(expires_at)
        .bind(account_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Account {} not found", account_id)))?;

        Self::vault_insert_log(&mut tx, account_id, user_id, action, ip_address).await?;

        tx.commit().await?;
        Ok(account)
    }

    pub async fn vault_log_access(
        &self,
        account_id: i32,
        user_id: i32,
        action: AccessAction,
        ip_address: Option<&str>,
    ) -> AppResult<()> {
        let mut conn = self.pool.acquire().await?;
        Self::vault_insert_log(&mut conn, account_id, user_id, action, ip_address).await
    }

    pub async fn vault_access_logs(&self, account_id: i32) -> AppResult<Vec<PasswordAccessLog>> {
        let rows = sqlx::query_as::<_, PasswordAccessLog>(
            "SELECT * FROM password_access_logs WHERE account_id = $1 ORDER BY created_at DESC",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
