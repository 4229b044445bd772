//! Refresh rotation and logout endpoints.

use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::api::middleware::AuthContext;
use crate::tenant;
use crate::token::hash_refresh_token;

use super::state::AuthState;
use super::tokens::issue_token_pair;
use super::types::{LogoutRequest, RefreshRequest, TokenResponse};

#[utoipa::path(
    post,
    path = "/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Rotated token pair", body = TokenResponse),
        (status = 400, description = "Validation error", body = String),
        (status = 401, description = "Invalid refresh token", body = String),
        (status = 500, description = "Refresh failed", body = String)
    ),
    tag = "auth"
)]
pub async fn refresh(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RefreshRequest>>,
) -> impl IntoResponse {
    let request: RefreshRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    match rotate(&auth_state, &request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err((status, message)) => (status, message).into_response(),
    }
}

async fn rotate(
    state: &AuthState,
    request: &RefreshRequest,
) -> Result<TokenResponse, (StatusCode, String)> {
    // Only the hash is stored; never compare raw tokens against the database.
    let token_hash = hash_refresh_token(&request.refresh_token);

    let consumed = state
        .stores()
        .refresh_tokens()
        .consume(&token_hash, &request.device_id)
        .await;
    let record = match consumed {
        Ok(Some(record)) => record,
        // Unknown, replayed, expired and wrong-device all look the same.
        Ok(None) => return Err(invalid_refresh_token()),
        Err(err) => {
            error!("Refresh token lookup failed: {err}");
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Refresh failed".to_string(),
            ));
        }
    };

    let user = match state.stores().users().find_by_id(record.user_id).await {
        Ok(user) => user,
        Err(err) => {
            error!("User lookup failed: {err}");
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Refresh failed".to_string(),
            ));
        }
    };

    // A deleted or disabled user cannot rotate a leftover token.
    let user = match user {
        Some(user) if user.is_active => user,
        _ => return Err(invalid_refresh_token()),
    };

    let tenant = match tenant::find_by_identifying_email(
        state.stores().tenants().as_ref(),
        &user.identifier,
    )
    .await
    {
        Ok(tenant) => tenant,
        Err(err) => {
            error!("Tenant lookup failed: {err}");
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Refresh failed".to_string(),
            ));
        }
    };

    // Tenant deactivation cuts existing sessions off at the next rotation.
    let tenant = match tenant {
        Some(tenant) if tenant.is_active => tenant,
        _ => return Err(invalid_refresh_token()),
    };

    issue_token_pair(state, &user, tenant.tenant_id, &record.device_id)
        .await
        .map_err(|err| {
            error!("Token issuance failed: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Refresh failed".to_string(),
            )
        })
}

fn invalid_refresh_token() -> (StatusCode, String) {
    (
        StatusCode::UNAUTHORIZED,
        "Invalid refresh token".to_string(),
    )
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    request_body = LogoutRequest,
    responses(
        (status = 204, description = "Device session revoked")
    ),
    tag = "auth"
)]
pub async fn logout(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LogoutRequest>>,
) -> impl IntoResponse {
    // Revocation is best effort; the caller discards its copy either way.
    if let Some(Json(request)) = payload {
        let token_hash = hash_refresh_token(&request.refresh_token);
        if let Err(err) = auth_state.stores().refresh_tokens().revoke(&token_hash).await {
            error!("Failed to revoke refresh token: {err}");
        }
    }

    StatusCode::NO_CONTENT.into_response()
}

#[utoipa::path(
    post,
    path = "/auth/logout/all",
    responses(
        (status = 204, description = "All device sessions revoked"),
        (status = 401, description = "Unauthorized", body = String)
    ),
    tag = "auth"
)]
pub async fn logout_all(
    auth_state: Extension<Arc<AuthState>>,
    context: Extension<AuthContext>,
) -> impl IntoResponse {
    let Ok(user_id) = context.user_id().parse::<Uuid>() else {
        return (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()).into_response();
    };

    match auth_state
        .stores()
        .refresh_tokens()
        .revoke_all_for_user(user_id)
        .await
    {
        Ok(revoked) => {
            info!("Revoked {revoked} refresh tokens");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(err) => {
            error!("Failed to revoke refresh tokens: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
