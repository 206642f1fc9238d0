//! Password vault models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use super::enums::AccessAction;

/// External system owning credentials
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct System {
    pub id: i32,
    pub name: String,
    pub url: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateSystem {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(url)]
    pub url: Option<String>,
    pub description: Option<String>,
}

/// Stored credential; only the ciphertext is kept
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct SystemAccount {
    pub id: i32,
    pub system_id: i32,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_ciphertext: String,
    pub expires_at: NaiveDate,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SystemAccount {
    /// Expired once `expires_at` has passed; the last day is still valid
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expires_at < today
    }

    pub fn into_view(self, today: NaiveDate) -> SystemAccountView {
        SystemAccountView {
            is_expired: self.is_expired(today),
            account: self,
        }
    }
}

/// Account as returned by the API, flagged when its password is past expiry
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SystemAccountView {
    #[serde(flatten)]
    pub account: SystemAccount,
    pub is_expired: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateSystemAccount {
    #[validate(length(min = 1, max = 255))]
    pub username: String,
    #[validate(length(min = 1))]
    pub password: String,
    pub expires_at: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdatePassword {
    #[validate(length(min = 1))]
    pub password: String,
    pub expires_at: Option<NaiveDate>,
}

/// Decrypted password returned to an authorized caller
#[derive(Debug, Serialize, ToSchema)]
pub struct RevealedPassword {
    pub account_id: i32,
    pub username: String,
    pub password: String,
    pub expires_at: NaiveDate,
    pub is_expired: bool,
}

/// Append-only record of a password access
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct PasswordAccessLog {
    pub id: i32,
    pub account_id: i32,
    pub user_id: Option<i32>,
    pub action: AccessAction,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(expires_at: NaiveDate) -> SystemAccount {
        let now = Utc::now();
        SystemAccount {
            id: 3,
            system_id: 1,
            username: "svc-backup".to_string(),
            password_ciphertext: "c2VjcmV0".to_string(),
            expires_at,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_expiry_day_is_still_valid() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        assert!(!account(today).is_expired(today));
        assert!(account(today.pred_opt().unwrap()).is_expired(today));
    }

    #[test]
    fn test_view_flags_expired_and_hides_ciphertext() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let view = account(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()).into_view(today);
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["is_expired"], true);
        assert_eq!(json["username"], "svc-backup");
        assert!(json.get("password_ciphertext").is_none());
    }
}
