//! Access/refresh token pair issuance.
//!
//! Flow Overview:
//! 1) Assemble claims for the user, tenant and device.
//! 2) Sign the access token with the configured RSA key.
//! 3) Mint a rotating refresh token and persist only its hash.

use chrono::{Duration, Utc};
use thiserror::Error;
use ulid::Ulid;
use uuid::Uuid;

use crate::store::{RefreshTokenRecord, StoreError, UserRecord};
use crate::token::{self, AccessClaims, TOKEN_VERSION};

use super::state::AuthState;
use super::types::TokenResponse;

#[derive(Debug, Error)]
pub(super) enum IssueError {
    #[error(transparent)]
    Token(#[from] token::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Mint a signed access token and a fresh refresh token for one device.
///
/// # Errors
/// Returns an error if signing fails or the refresh token cannot be stored.
pub(super) async fn issue_token_pair(
    state: &AuthState,
    user: &UserRecord,
    tenant_id: Uuid,
    device_id: &str,
) -> Result<TokenResponse, IssueError> {
    let config = state.config();
    let now = Utc::now();
    let iat = now.timestamp();

    let claims = AccessClaims {
        v: TOKEN_VERSION,
        iss: config.issuer().to_string(),
        aud: config.audience().to_string(),
        sub: user.user_id.to_string(),
        tid: tenant_id.to_string(),
        did: device_id.to_string(),
        roles: user.roles.clone(),
        perms: user.permissions.clone(),
        jti: Ulid::new().to_string(),
        iat,
        exp: iat + config.access_ttl_seconds(),
    };
    let access_token = state.sign_access_claims(&claims)?;

    let refresh_token = token::generate_refresh_token()?;
    let record = RefreshTokenRecord {
        id: Uuid::now_v7(),
        user_id: user.user_id,
        device_id: device_id.to_string(),
        token_hash: token::hash_refresh_token(&refresh_token),
        expires_at: now + Duration::seconds(config.refresh_ttl_seconds()),
    };
    state.stores().refresh_tokens().insert(record).await?;

    Ok(TokenResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: config.access_ttl_seconds(),
        refresh_token,
    })
}
