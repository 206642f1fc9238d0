//! JWT session held by the agent
//!
//! Tokens only live in memory. A 401 on an authorized call triggers exactly
//! one refresh and one retry before the session is dropped.

use serde_json::{json, Value};
use std::time::Duration;
use tracing::{info, warn};

use crate::api::auth::AccessToken;
use crate::models::user::TokenPair;

use super::config::ApiSettings;
use super::transport::{ApiResponse, ApiTransport};
use super::AgentError;

pub const TOKEN_PATH: &str = "/api/token/";
pub const REFRESH_PATH: &str = "/api/token/refresh/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated { access: String, refresh: String },
}

/// Bounded retry budget for transient failures
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl From<&ApiSettings> for RetryPolicy {
    fn from(settings: &ApiSettings) -> Self {
        Self {
            attempts: settings.retry_attempts.max(1),
            backoff: settings.retry_backoff(),
        }
    }
}

pub struct TokenSession<T> {
    transport: T,
    username: String,
    password: String,
    retry: RetryPolicy,
    state: SessionState,
}

impl<T: ApiTransport> TokenSession<T> {
    pub fn new(transport: T, username: &str, password: &str, retry: RetryPolicy) -> Self {
        Self {
            transport,
            username: username.to_string(),
            password: password.to_string(),
            retry,
            state: SessionState::Unauthenticated,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.state, SessionState::Authenticated { .. })
    }

    /// Obtain a fresh token pair with the configured credentials
    pub async fn authenticate(&mut self) -> Result<(), AgentError> {
        let body = json!({ "username": self.username, "password": self.password });
        let response = self.post_with_retry(TOKEN_PATH, &body, None).await?;

        match response.status {
            200 | 201 => {
                let pair: TokenPair = serde_json::from_value(response.body)
                    .map_err(|e| AgentError::Auth(format!("Malformed token response: {}", e)))?;
                self.state = SessionState::Authenticated {
                    access: pair.access,
                    refresh: pair.refresh,
                };
                info!(username = %self.username, "Agent authenticated");
                Ok(())
            }
            400 | 401 | 403 => {
                self.state = SessionState::Unauthenticated;
                Err(AgentError::Auth(response.message()))
            }
            status => {
                self.state = SessionState::Unauthenticated;
                Err(AgentError::Server {
                    status,
                    message: response.message(),
                })
            }
        }
    }

    /// Exchange the refresh token for a new access token.
    /// Any failure drops the session.
    pub async fn refresh(&mut self) -> Result<(), AgentError> {
        let SessionState::Authenticated { refresh, .. } = &self.state else {
            return Err(AgentError::Auth("No refresh token".to_string()));
        };
        let refresh = refresh.clone();

        let outcome = self
            .post_with_retry(REFRESH_PATH, &json!({ "refresh": refresh }), None)
            .await;
        let response = match outcome {
            Ok(response) => response,
            Err(e) => {
                self.state = SessionState::Unauthenticated;
                return Err(e);
            }
        };

        if !response.is_success() {
            self.state = SessionState::Unauthenticated;
            return Err(AgentError::Auth(response.message()));
        }

        match serde_json::from_value::<AccessToken>(response.body) {
            Ok(token) => {
                self.state = SessionState::Authenticated {
                    access: token.access,
                    refresh,
                };
                info!("Access token refreshed");
                Ok(())
            }
            Err(e) => {
                self.state = SessionState::Unauthenticated;
                Err(AgentError::Auth(format!("Malformed refresh response: {}", e)))
            }
        }
    }

    /// POST with the access token, authenticating first if needed.
    /// Returns the response body of a 2xx answer.
    pub async fn send_authorized(&mut self, path: &str, body: &Value) -> Result<Value, AgentError> {
        if !self.is_authenticated() {
            self.authenticate().await?;
        }

        let response = self.post_with_retry(path, body, self.access_token()).await?;
        let response = if response.status == 401 {
            warn!(path, "Access token rejected, refreshing");
            // refresh() has already dropped the session on failure
            self.refresh().await.map_err(|e| match e {
                AgentError::Auth(message) => AgentError::Auth(message),
                other => AgentError::Auth(format!("Token refresh failed: {}", other)),
            })?;
            let retried = self.post_with_retry(path, body, self.access_token()).await?;
            if retried.status == 401 {
                self.state = SessionState::Unauthenticated;
                return Err(AgentError::Auth(retried.message()));
            }
            retried
        } else {
            response
        };

        if response.is_success() {
            Ok(response.body)
        } else {
            Err(AgentError::Server {
                status: response.status,
                message: response.message(),
            })
        }
    }

    fn access_token(&self) -> Option<String> {
        match &self.state {
            SessionState::Authenticated { access, .. } => Some(access.clone()),
            SessionState::Unauthenticated => None,
        }
    }

    async fn post_with_retry(
        &self,
        path: &str,
        body: &Value,
        bearer: Option<String>,
    ) -> Result<ApiResponse, AgentError> {
        let mut attempt = 1;
        loop {
            let outcome = self
                .transport
                .post_json(path, body.clone(), bearer.clone())
                .await;
            let transient = match &outcome {
                Err(AgentError::TransientNetwork(_)) => true,
                Ok(response) => response.is_unavailable(),
                Err(_) => false,
            };
            if !transient || attempt >= self.retry.attempts {
                return outcome;
            }

            warn!(path, attempt, max_attempts = self.retry.attempts, "Transient failure, retrying");
            tokio::time::sleep(self.retry.backoff).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::transport::MockApiTransport;
    use crate::agent::EQUIPMENT_PATH;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            attempts: 3,
            backoff: Duration::ZERO,
        }
    }

    fn tokens() -> ApiResponse {
        ApiResponse::new(200, json!({ "access": "access-1", "refresh": "refresh-1" }))
    }

    #[tokio::test]
    async fn test_expired_access_token_is_refreshed_once_and_retried() {
        let mut transport = MockApiTransport::new();
        transport
            .expect_post_json()
            .withf(|path, _, _| path == TOKEN_PATH)
            .times(1)
            .returning(|_, _, _| Ok(tokens()));
        transport
            .expect_post_json()
            .withf(|path, body, _| path == REFRESH_PATH && body["refresh"] == "refresh-1")
            .times(1)
            .returning(|_, _, _| Ok(ApiResponse::new(200, json!({ "access": "access-2" }))));
        let mut calls = 0;
        transport
            .expect_post_json()
            .withf(|path, _, _| path == EQUIPMENT_PATH)
            .times(2)
            .returning(move |_, _, bearer| {
                calls += 1;
                if calls == 1 {
                    assert_eq!(bearer.as_deref(), Some("access-1"));
                    Ok(ApiResponse::new(401, json!({ "message": "Token expired" })))
                } else {
                    assert_eq!(bearer.as_deref(), Some("access-2"));
                    Ok(ApiResponse::new(201, json!({ "created": true })))
                }
            });

        let mut session = TokenSession::new(transport, "agent", "secret", policy());
        let body = session.send_authorized(EQUIPMENT_PATH, &json!({})).await.unwrap();

        assert_eq!(body["created"], true);
        assert_eq!(
            session.state(),
            &SessionState::Authenticated {
                access: "access-2".to_string(),
                refresh: "refresh-1".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_second_unauthorized_resets_session() {
        let mut transport = MockApiTransport::new();
        transport
            .expect_post_json()
            .withf(|path, _, _| path == TOKEN_PATH)
            .times(1)
            .returning(|_, _, _| Ok(tokens()));
        transport
            .expect_post_json()
            .withf(|path, _, _| path == REFRESH_PATH)
            .times(1)
            .returning(|_, _, _| Ok(ApiResponse::new(200, json!({ "access": "access-2" }))));
        transport
            .expect_post_json()
            .withf(|path, _, _| path == EQUIPMENT_PATH)
            .times(2)
            .returning(|_, _, _| Ok(ApiResponse::new(401, Value::Null)));

        let mut session = TokenSession::new(transport, "agent", "secret", policy());
        let result = session.send_authorized(EQUIPMENT_PATH, &json!({})).await;

        assert!(matches!(result, Err(AgentError::Auth(_))));
        assert_eq!(session.state(), &SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_authentication_gives_up_after_three_transient_failures() {
        let mut transport = MockApiTransport::new();
        transport
            .expect_post_json()
            .times(3)
            .returning(|_, _, _| Err(AgentError::TransientNetwork("connection refused".into())));

        let mut session = TokenSession::new(transport, "agent", "secret", policy());
        let result = session.authenticate().await;

        assert!(matches!(result, Err(AgentError::TransientNetwork(_))));
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn test_rejected_credentials_are_not_retried() {
        let mut transport = MockApiTransport::new();
        transport
            .expect_post_json()
            .times(1)
            .returning(|_, _, _| Ok(ApiResponse::new(401, json!({ "message": "Invalid credentials" }))));

        let mut session = TokenSession::new(transport, "agent", "wrong", policy());
        let result = session.authenticate().await;

        assert!(matches!(result, Err(AgentError::Auth(message)) if message == "Invalid credentials"));
    }

    #[tokio::test]
    async fn test_failed_refresh_drops_session() {
        let mut transport = MockApiTransport::new();
        transport
            .expect_post_json()
            .withf(|path, _, _| path == TOKEN_PATH)
            .times(1)
            .returning(|_, _, _| Ok(tokens()));
        transport
            .expect_post_json()
            .withf(|path, _, _| path == REFRESH_PATH)
            .times(1)
            .returning(|_, _, _| Ok(ApiResponse::new(401, Value::Null)));

        let mut session = TokenSession::new(transport, "agent", "secret", policy());
        session.authenticate().await.unwrap();
        assert!(session.refresh().await.is_err());
        assert_eq!(session.state(), &SessionState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_refresh_network_failure_ends_as_auth_error() {
        let mut transport = MockApiTransport::new();
        transport
            .expect_post_json()
            .withf(|path, _, _| path == TOKEN_PATH)
            .times(1)
            .returning(|_, _, _| Ok(tokens()));
        transport
            .expect_post_json()
            .withf(|path, _, _| path == EQUIPMENT_PATH)
            .times(1)
            .returning(|_, _, _| Ok(ApiResponse::new(401, Value::Null)));
        transport
            .expect_post_json()
            .withf(|path, _, _| path == REFRESH_PATH)
            .times(3)
            .returning(|_, _, _| Err(AgentError::TransientNetwork("connection reset".into())));

        let mut session = TokenSession::new(transport, "agent", "secret", policy());
        let result = session.send_authorized(EQUIPMENT_PATH, &json!({})).await;

        assert!(matches!(result, Err(AgentError::Auth(_))));
        assert_eq!(session.state(), &SessionState::Unauthenticated);
    }
}
