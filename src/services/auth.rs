//! Authentication service: password login and JWT issuance

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::user::{TokenPair, TokenType, User, UserClaims},
    repository::Repository,
};

#[derive(Clone)]
pub struct AuthService {
    repository: Repository,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(repository: Repository, config: AuthConfig) -> Self {
        Self { repository, config }
    }

    /// Authenticate by login and password and issue a token pair
    pub async fn login(&self, login: &str, password: &str) -> AppResult<TokenPair> {
        let user = self
            .repository
            .users_get_by_login(login)
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid login or password".to_string()))?;

        if !verify_password(&user, password)? {
            tracing::warn!(login, "Rejected login");
            return Err(AppError::Authentication("Invalid login or password".to_string()));
        }

        Ok(TokenPair {
            access: self.issue(&user, TokenType::Access)?,
            refresh: self.issue(&user, TokenType::Refresh)?,
        })
    }

    /// Exchange a refresh token for a new access token
    pub async fn refresh(&self, refresh_token: &str) -> AppResult<String> {
        let claims = self.decode(refresh_token)?;
        if claims.token_type != TokenType::Refresh {
            return Err(AppError::Authentication("Not a refresh token".to_string()));
        }

        let user = self.repository.users_get_by_id(claims.user_id).await?;
        if !user.is_active {
            return Err(AppError::Authentication("Account is disabled".to_string()));
        }
        self.issue(&user, TokenType::Access)
    }

    /// Validate an access token presented on an API call
    pub fn authenticate(&self, token: &str) -> AppResult<UserClaims> {
        let claims = self.decode(token)?;
        if claims.token_type != TokenType::Access {
            return Err(AppError::Authentication("Access token required".to_string()));
        }
        Ok(claims)
    }

    pub async fn me(&self, user_id: i32) -> AppResult<User> {
        self.repository.users_get_by_id(user_id).await
    }

    fn decode(&self, token: &str) -> AppResult<UserClaims> {
        UserClaims::from_token(token, &self.config.jwt_secret)
            .map_err(|e| AppError::Authentication(e.to_string()))
    }

    fn issue(&self, user: &User, token_type: TokenType) -> AppResult<String> {
        let now = Utc::now();
        let lifetime = match token_type {
            TokenType::Access => Duration::minutes(self.config.access_token_minutes),
            TokenType::Refresh => Duration::days(self.config.refresh_token_days),
        };
        let claims = UserClaims {
            sub: user.login.clone(),
            user_id: user.id,
            is_staff: user.is_staff,
            token_type,
            exp: (now + lifetime).timestamp(),
            iat: now.timestamp(),
        };
        claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }
}

fn verify_password(user: &User, password: &str) -> AppResult<bool> {
    let Some(ref hash) = user.password else {
        return Ok(false);
    };
    let parsed_hash =
        PasswordHash::new(hash).map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
    Ok(hash.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    fn service() -> AuthService {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://unused@localhost/unused")
            .unwrap();
        AuthService::new(Repository::new(pool), AuthConfig::default())
    }

    fn user(password: Option<String>) -> User {
        User {
            id: 7,
            login: "tech".to_string(),
            password,
            email: None,
            firstname: None,
            lastname: None,
            department: Some("IT".to_string()),
            is_staff: true,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_password_hash_verifies() {
        let hashed = hash_password("s3cret").unwrap();
        let u = user(Some(hashed));
        assert!(verify_password(&u, "s3cret").unwrap());
        assert!(!verify_password(&u, "wrong").unwrap());
        assert!(!verify_password(&user(None), "s3cret").unwrap());
    }

    #[tokio::test]
    async fn test_refresh_token_is_not_an_access_token() {
        let auth = service();
        let u = user(None);
        let refresh = auth.issue(&u, TokenType::Refresh).unwrap();
        let access = auth.issue(&u, TokenType::Access).unwrap();

        assert!(auth.authenticate(&refresh).is_err());
        let claims = auth.authenticate(&access).unwrap();
        assert_eq!(claims.user_id, 7);
        assert!(claims.is_staff);

        // rejected before any database lookup
        assert!(matches!(
            auth.refresh(&access).await,
            Err(AppError::Authentication(_))
        ));
        assert!(auth.refresh("garbage").await.is_err());
    }
}
