//! HTTP client for the auth endpoints.
//!
//! [`AuthClient`] talks to a gardi backend; [`AuthApi`] is the seam the
//! session layer consumes, so tests can swap in fakes.

use crate::api::handlers::auth::types::{
    LoginRequest, LogoutRequest, RefreshRequest, TokenResponse,
};
use crate::error::AuthError;
use crate::session::TokenPair;
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::time::Duration;
use tracing::{Instrument, info_span};

/// Bound on a single request; retries and backoff live in the session layer.
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// A user's sign-in input.
pub struct Credentials {
    pub identifier: String,
    pub secret: SecretString,
}

impl Credentials {
    #[must_use]
    pub fn new(identifier: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            secret: SecretString::from(secret.into()),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("secret", &"***")
            .finish()
    }
}

/// The auth operations the session layer depends on.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Exchanges credentials for a token pair.
    async fn login(&self, credentials: &Credentials) -> Result<TokenPair, AuthError>;

    /// Exchanges a refresh token for a rotated pair. A token that was
    /// already used fails with [`AuthError::InvalidRefreshToken`].
    async fn refresh(&self, refresh_token: &str, device_id: &str) -> Result<TokenPair, AuthError>;

    /// Revokes one device's refresh token.
    async fn logout_device(&self, refresh_token: &str) -> Result<(), AuthError>;

    /// Revokes every refresh token of the calling user.
    async fn logout_all(&self, access_token: &str) -> Result<(), AuthError>;
}

pub struct AuthClient {
    base_url: String,
    client: reqwest::Client,
}

impl AuthClient {
    /// Builds a client for the backend at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(transport)?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

#[async_trait]
impl AuthApi for AuthClient {
    async fn login(&self, credentials: &Credentials) -> Result<TokenPair, AuthError> {
        let url = self.endpoint("/auth/login");
        let payload = LoginRequest {
            identifier: credentials.identifier.clone(),
            secret: credentials.secret.expose_secret().to_string(),
        };

        let span = info_span!("auth.login", http.method = "POST", url = %url);
        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .instrument(span)
            .await
            .map_err(transport)?;

        if response.status().is_success() {
            let body: TokenResponse = response.json().await.map_err(transport)?;
            Ok(token_pair_from(body))
        } else {
            Err(map_login_status(response.status()))
        }
    }

    async fn refresh(&self, refresh_token: &str, device_id: &str) -> Result<TokenPair, AuthError> {
        let url = self.endpoint("/auth/refresh");
        let payload = RefreshRequest {
            refresh_token: refresh_token.to_string(),
            device_id: device_id.to_string(),
        };

        let span = info_span!("auth.refresh", http.method = "POST", url = %url);
        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .instrument(span)
            .await
            .map_err(transport)?;

        if response.status().is_success() {
            let body: TokenResponse = response.json().await.map_err(transport)?;
            Ok(token_pair_from(body))
        } else {
            Err(map_refresh_status(response.status()))
        }
    }

    async fn logout_device(&self, refresh_token: &str) -> Result<(), AuthError> {
        let url = self.endpoint("/auth/logout");
        let payload = LogoutRequest {
            refresh_token: refresh_token.to_string(),
        };

        let span = info_span!("auth.logout", http.method = "POST", url = %url);
        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .instrument(span)
            .await
            .map_err(transport)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(AuthError::Transport(format!(
                "unexpected logout status: {}",
                response.status()
            )))
        }
    }

    async fn logout_all(&self, access_token: &str) -> Result<(), AuthError> {
        let url = self.endpoint("/auth/logout/all");

        let span = info_span!("auth.logout_all", http.method = "POST", url = %url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(access_token)
            .send()
            .instrument(span)
            .await
            .map_err(transport)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(map_logout_all_status(response.status()))
        }
    }
}

fn transport(err: reqwest::Error) -> AuthError {
    AuthError::Transport(err.to_string())
}

fn token_pair_from(response: TokenResponse) -> TokenPair {
    TokenPair {
        access_token: response.access_token,
        refresh_token: response.refresh_token,
        access_expiry: Utc::now() + ChronoDuration::seconds(response.expires_in),
    }
}

fn map_login_status(status: StatusCode) -> AuthError {
    match status {
        StatusCode::UNAUTHORIZED => AuthError::InvalidCredentials,
        StatusCode::NOT_FOUND => AuthError::TenantNotFound,
        other => AuthError::Transport(format!("unexpected login status: {other}")),
    }
}

fn map_refresh_status(status: StatusCode) -> AuthError {
    match status {
        StatusCode::UNAUTHORIZED => AuthError::InvalidRefreshToken,
        other => AuthError::Transport(format!("unexpected refresh status: {other}")),
    }
}

fn map_logout_all_status(status: StatusCode) -> AuthError {
    match status {
        StatusCode::UNAUTHORIZED => AuthError::Unauthenticated,
        StatusCode::FORBIDDEN => AuthError::Forbidden,
        other => AuthError::Transport(format!("unexpected logout status: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_debug_hides_the_secret() {
        let credentials = Credentials::new("ana@example.com", "hunter2");
        let rendered = format!("{credentials:?}");
        assert!(rendered.contains("ana@example.com"));
        assert!(rendered.contains("***"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn base_url_is_normalized() {
        let client = AuthClient::new("https://auth.gardi.test/").unwrap();
        assert_eq!(
            client.endpoint("/auth/login"),
            "https://auth.gardi.test/auth/login"
        );
    }

    #[test]
    fn expires_in_becomes_an_absolute_expiry() {
        let pair = token_pair_from(TokenResponse {
            access_token: "a".to_string(),
            token_type: "Bearer".to_string(),
            expires_in: 900,
            refresh_token: "r".to_string(),
        });
        let remaining = pair.access_expiry - Utc::now();
        assert!(remaining.num_seconds() > 890 && remaining.num_seconds() <= 900);
    }

    #[test]
    fn status_codes_map_onto_the_error_taxonomy() {
        assert_eq!(
            map_login_status(StatusCode::UNAUTHORIZED),
            AuthError::InvalidCredentials
        );
        assert_eq!(
            map_login_status(StatusCode::NOT_FOUND),
            AuthError::TenantNotFound
        );
        assert_eq!(
            map_refresh_status(StatusCode::UNAUTHORIZED),
            AuthError::InvalidRefreshToken
        );
        assert_eq!(
            map_logout_all_status(StatusCode::FORBIDDEN),
            AuthError::Forbidden
        );
        assert!(map_login_status(StatusCode::BAD_GATEWAY).is_retryable());
    }
}
