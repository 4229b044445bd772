//! Bearer authentication and route-level authorization.
//!
//! `authenticate` verifies the `Authorization` header and stores the verified
//! claims in request extensions as an [`AuthContext`]. [`RequireAccess`] is a
//! Tower layer applied per route group that checks those claims against an
//! [`AccessRequirement`] before the handler runs. Claims are read from the
//! verified token only, never from request input.

use axum::{
    body::Body,
    extract::Extension,
    http::{HeaderMap, Request, StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::debug;

use crate::authz::{self, AccessRequirement};
use crate::token::AccessClaims;

use super::handlers::auth::AuthState;

/// Verified claims attached to a request after `authenticate` accepts it.
///
/// Built only from a token that passed signature and expiry checks, so
/// handlers and layers downstream can trust every field.
#[derive(Clone, Debug)]
pub struct AuthContext {
    claims: AccessClaims,
}

impl AuthContext {
    pub(crate) fn new(claims: AccessClaims) -> Self {
        Self { claims }
    }

    pub fn user_id(&self) -> &str {
        &self.claims.sub
    }

    pub fn tenant_id(&self) -> &str {
        &self.claims.tid
    }

    pub fn device_id(&self) -> &str {
        &self.claims.did
    }

    pub fn roles(&self) -> &[String] {
        &self.claims.roles
    }

    pub fn permissions(&self) -> &[String] {
        &self.claims.perms
    }
}

/// Rejects requests whose bearer token is missing, malformed, expired, or
/// signed with an unknown key. Accepted requests continue with an
/// [`AuthContext`] in their extensions.
pub async fn authenticate(
    Extension(state): Extension<Arc<AuthState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = extract_bearer_token(request.headers()) else {
        return unauthenticated_response();
    };

    match state.verify_access_token(&token) {
        Ok(claims) => {
            request.extensions_mut().insert(AuthContext::new(claims));
            next.run(request).await
        }
        Err(err) => {
            debug!("Rejected bearer token: {err}");
            unauthenticated_response()
        }
    }
}

pub(crate) fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Route layer enforcing an [`AccessRequirement`].
///
/// Apply inside `authenticate` so the [`AuthContext`] is already present; a
/// request that reaches this layer without one gets `401`, and one whose
/// claims fail the requirement gets `403`.
#[derive(Clone)]
pub struct RequireAccess {
    requirement: Arc<AccessRequirement>,
}

impl RequireAccess {
    #[must_use]
    pub fn new(requirement: AccessRequirement) -> Self {
        Self {
            requirement: Arc::new(requirement),
        }
    }

    /// Requires any one of the given permissions.
    pub fn permissions<I, S>(permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(AccessRequirement::permissions(permissions))
    }

    /// Requires any one of the given roles.
    pub fn roles<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(AccessRequirement::roles(roles))
    }
}

impl<S> Layer<S> for RequireAccess {
    type Service = RequireAccessService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequireAccessService {
            inner,
            requirement: Arc::clone(&self.requirement),
        }
    }
}

/// Service wrapper for [`RequireAccess`].
#[derive(Clone)]
pub struct RequireAccessService<S> {
    inner: S,
    requirement: Arc<AccessRequirement>,
}

impl<S> Service<Request<Body>> for RequireAccessService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let requirement = Arc::clone(&self.requirement);
        // Keep the service that was polled ready; the clone waits for the
        // next poll_ready.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let Some(context) = request.extensions().get::<AuthContext>().cloned() else {
                debug!("Access check failed: no verified claims on request");
                return Ok(unauthenticated_response());
            };

            if authz::satisfies(&requirement, context.roles(), context.permissions()) {
                inner.call(request).await
            } else {
                debug!(
                    user_id = %context.user_id(),
                    "Access check failed: claims do not satisfy route requirement"
                );
                Ok(forbidden_response())
            }
        })
    }
}

fn unauthenticated_response() -> Response {
    (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()).into_response()
}

fn forbidden_response() -> Response {
    (StatusCode::FORBIDDEN, "Forbidden".to_string()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::test_support::test_access_claims;
    use axum::{Router, http::HeaderValue, routing::get};
    use tower::ServiceExt;

    fn context(roles: &[&str], permissions: &[&str]) -> AuthContext {
        let mut claims = test_access_claims(900);
        claims.roles = roles.iter().map(|role| (*role).to_string()).collect();
        claims.perms = permissions
            .iter()
            .map(|permission| (*permission).to_string())
            .collect();
        AuthContext::new(claims)
    }

    async fn handler() -> &'static str {
        "ok"
    }

    #[test]
    fn bearer_extraction_accepts_both_prefixes_and_trims() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(extract_bearer_token(&headers).as_deref(), Some("abc.def.ghi"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("bearer abc.def.ghi"));
        assert_eq!(extract_bearer_token(&headers).as_deref(), Some("abc.def.ghi"));

        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_static("  Bearer   spaced-token  "),
        );
        assert_eq!(extract_bearer_token(&headers).as_deref(), Some("spaced-token"));
    }

    #[test]
    fn bearer_extraction_rejects_empty_and_foreign_schemes() {
        let mut headers = HeaderMap::new();

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(extract_bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwdw=="));
        assert_eq!(extract_bearer_token(&headers), None);
    }

    #[tokio::test]
    async fn layer_rejects_requests_without_verified_claims() {
        let app = Router::new()
            .route("/", get(handler))
            .layer(RequireAccess::permissions(["tenants.read"]));

        let response = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn layer_allows_any_listed_permission() {
        let app = Router::new()
            .route("/", get(handler))
            .layer(RequireAccess::permissions(["tenants.read", "tenants.admin"]));

        let mut request = Request::get("/").body(Body::empty()).unwrap();
        request.extensions_mut().insert(context(&[], &["tenants.read"]));

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn layer_forbids_claims_without_listed_permission() {
        let app = Router::new()
            .route("/", get(handler))
            .layer(RequireAccess::permissions(["tenants.create"]));

        let mut request = Request::get("/").body(Body::empty()).unwrap();
        request.extensions_mut().insert(context(&[], &["tenants.read"]));

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn layer_allows_any_listed_role() {
        let app = Router::new()
            .route("/", get(handler))
            .layer(RequireAccess::roles(["admin", "operator"]));

        let mut request = Request::get("/").body(Body::empty()).unwrap();
        request.extensions_mut().insert(context(&["operator"], &[]));

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn authenticated_requirement_passes_any_verified_caller() {
        let app = Router::new()
            .route("/", get(handler))
            .layer(RequireAccess::new(AccessRequirement::authenticated()));

        let mut request = Request::get("/").body(Body::empty()).unwrap();
        request.extensions_mut().insert(context(&[], &[]));

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
