//! Credential login endpoint.

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::error;
use ulid::Ulid;

use crate::store::UserRecord;
use crate::tenant;

use super::state::AuthState;
use super::tokens::issue_token_pair;
use super::types::{LoginRequest, TokenResponse};

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token pair issued", body = TokenResponse),
        (status = 400, description = "Validation error", body = String),
        (status = 401, description = "Invalid credentials", body = String),
        (status = 404, description = "No active tenant for the user", body = String),
        (status = 500, description = "Login failed", body = String)
    ),
    tag = "auth"
)]
pub async fn login(
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let request: LoginRequest = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    match authenticate(&auth_state, &request).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err((status, message)) => (status, message).into_response(),
    }
}

async fn authenticate(
    state: &AuthState,
    request: &LoginRequest,
) -> Result<TokenResponse, (StatusCode, String)> {
    let identifier = tenant::normalize_email(&request.identifier);

    let user = match state.stores().users().find_by_identifier(&identifier).await {
        Ok(user) => user,
        Err(err) => {
            error!("User lookup failed: {err}");
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Login failed".to_string(),
            ));
        }
    };

    // Unknown, disabled and wrong-password all collapse into one answer.
    let user = match user {
        Some(user) if user.is_active => user,
        _ => return Err(invalid_credentials()),
    };

    if !password_matches(&user, &request.secret) {
        return Err(invalid_credentials());
    }

    let tenant =
        match tenant::find_by_identifying_email(state.stores().tenants().as_ref(), &identifier)
            .await
        {
            Ok(tenant) => tenant,
            Err(err) => {
                error!("Tenant lookup failed: {err}");
                return Err((
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Login failed".to_string(),
                ));
            }
        };

    let tenant = match tenant {
        Some(tenant) if tenant.is_active => tenant,
        _ => return Err((StatusCode::NOT_FOUND, "Tenant not found".to_string())),
    };

    // Each login starts a new device session; the id rides in the claims.
    let device_id = Ulid::new().to_string();
    issue_token_pair(state, &user, tenant.tenant_id, &device_id)
        .await
        .map_err(|err| {
            error!("Token issuance failed: {err}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Login failed".to_string(),
            )
        })
}

fn password_matches(user: &UserRecord, secret: &str) -> bool {
    let parsed = match PasswordHash::new(&user.password_hash) {
        Ok(parsed) => parsed,
        Err(err) => {
            error!("Stored password hash is unreadable: {err}");
            return false;
        }
    };

    Argon2::default()
        .verify_password(secret.as_bytes(), &parsed)
        .is_ok()
}

fn invalid_credentials() -> (StatusCode, String) {
    (
        StatusCode::UNAUTHORIZED,
        "Invalid credentials".to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::password_matches;
    use crate::store::UserRecord;
    use anyhow::Result;
    use argon2::password_hash::{SaltString, rand_core::OsRng};
    use argon2::{Argon2, PasswordHasher};
    use uuid::Uuid;

    fn user_with_password(secret: &str) -> Result<UserRecord> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|err| anyhow::anyhow!("{err}"))?;

        Ok(UserRecord {
            user_id: Uuid::new_v4(),
            identifier: "alice@example.com".to_string(),
            password_hash: hash.to_string(),
            roles: Vec::new(),
            permissions: Vec::new(),
            is_active: true,
        })
    }

    #[test]
    fn password_matches_accepts_the_right_secret() -> Result<()> {
        let user = user_with_password("hunter2")?;
        assert!(password_matches(&user, "hunter2"));
        assert!(!password_matches(&user, "hunter3"));
        Ok(())
    }

    #[test]
    fn unreadable_stored_hash_never_matches() {
        let user = UserRecord {
            user_id: Uuid::new_v4(),
            identifier: "alice@example.com".to_string(),
            password_hash: "not-a-phc-string".to_string(),
            roles: Vec::new(),
            permissions: Vec::new(),
            is_active: true,
        };
        assert!(!password_matches(&user, "hunter2"));
    }
}
