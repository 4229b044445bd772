//! Scriptable `AuthApi` fake shared by the session and guard tests.

use crate::client::{AuthApi, Credentials};
use crate::error::AuthError;
use crate::session::{SessionClaims, TokenPair};
use crate::token::{AccessClaims, TOKEN_VERSION};
use async_trait::async_trait;
use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

pub(crate) const TEST_USER_ID: &str = "7f1c6ee8-7f39-4e0a-9e44-1f2f0a9b2a11";
pub(crate) const TEST_TENANT_ID: &str = "4a3d8f4e-9b1c-41d8-a0a7-02c5d6f1be42";
pub(crate) const TEST_DEVICE_ID: &str = "01JD2Y4T8G2V8Q8Q4N8T7R9XWZ";

/// Builds a structurally valid, unsigned access token. Good enough for
/// anything that only decodes claims without verifying the signature.
pub(crate) fn fake_access_token(claims: &AccessClaims) -> String {
    let header = serde_json::json!({"alg": "RS256", "typ": "JWT", "kid": "test"});
    let header = serde_json::to_vec(&header).unwrap();
    let body = serde_json::to_vec(claims).unwrap();
    format!(
        "{}.{}.c2ln",
        Base64UrlUnpadded::encode_string(&header),
        Base64UrlUnpadded::encode_string(&body)
    )
}

pub(crate) fn test_access_claims(ttl_secs: i64) -> AccessClaims {
    let now = Utc::now().timestamp();
    AccessClaims {
        v: TOKEN_VERSION,
        iss: "https://auth.gardi.test".to_string(),
        aud: "gardi".to_string(),
        sub: TEST_USER_ID.to_string(),
        tid: TEST_TENANT_ID.to_string(),
        did: TEST_DEVICE_ID.to_string(),
        roles: vec!["admin".to_string()],
        perms: vec!["tenants.read".to_string()],
        jti: "01JD2Y4T8GJT1QZ0B8B3R13MH7".to_string(),
        iat: now,
        exp: now + ttl_secs,
    }
}

pub(crate) fn test_session_claims() -> SessionClaims {
    test_access_claims(900).into()
}

/// A pair whose access token expires `ttl_secs` from now.
pub(crate) fn fresh_pair(ttl_secs: i64) -> TokenPair {
    let claims = test_access_claims(ttl_secs);
    TokenPair {
        access_token: fake_access_token(&claims),
        refresh_token: "refresh-token-1".to_string(),
        access_expiry: Utc::now() + ChronoDuration::seconds(ttl_secs),
    }
}

/// A pair whose access token expired a minute ago but whose refresh token
/// is still usable.
pub(crate) fn expired_pair() -> TokenPair {
    fresh_pair(-60)
}

/// Counts calls per operation and replays scripted results in order. When a
/// script runs dry the operation succeeds with a fresh pair (or unit).
pub(crate) struct CountingAuthApi {
    pub login_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub logout_device_calls: AtomicUsize,
    pub logout_all_calls: AtomicUsize,
    refresh_delay: Duration,
    login_script: Mutex<VecDeque<Result<TokenPair, AuthError>>>,
    refresh_script: Mutex<VecDeque<Result<TokenPair, AuthError>>>,
    logout_device_script: Mutex<VecDeque<Result<(), AuthError>>>,
    logout_all_script: Mutex<VecDeque<Result<(), AuthError>>>,
}

impl CountingAuthApi {
    pub(crate) fn new() -> Self {
        Self {
            login_calls: AtomicUsize::new(0),
            refresh_calls: AtomicUsize::new(0),
            logout_device_calls: AtomicUsize::new(0),
            logout_all_calls: AtomicUsize::new(0),
            refresh_delay: Duration::ZERO,
            login_script: Mutex::new(VecDeque::new()),
            refresh_script: Mutex::new(VecDeque::new()),
            logout_device_script: Mutex::new(VecDeque::new()),
            logout_all_script: Mutex::new(VecDeque::new()),
        }
    }

    /// Makes every refresh exchange take `delay`, so tests can overlap
    /// callers deterministically.
    pub(crate) fn with_refresh_delay(mut self, delay: Duration) -> Self {
        self.refresh_delay = delay;
        self
    }

    pub(crate) async fn script_login(&self, result: Result<TokenPair, AuthError>) {
        self.login_script.lock().await.push_back(result);
    }

    pub(crate) async fn script_refresh(&self, result: Result<TokenPair, AuthError>) {
        self.refresh_script.lock().await.push_back(result);
    }

    pub(crate) async fn script_logout_device(&self, result: Result<(), AuthError>) {
        self.logout_device_script.lock().await.push_back(result);
    }

    pub(crate) async fn script_logout_all(&self, result: Result<(), AuthError>) {
        self.logout_all_script.lock().await.push_back(result);
    }
}

#[async_trait]
impl AuthApi for CountingAuthApi {
    async fn login(&self, _credentials: &Credentials) -> Result<TokenPair, AuthError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        match self.login_script.lock().await.pop_front() {
            Some(result) => result,
            None => Ok(fresh_pair(900)),
        }
    }

    async fn refresh(
        &self,
        _refresh_token: &str,
        _device_id: &str,
    ) -> Result<TokenPair, AuthError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        if !self.refresh_delay.is_zero() {
            tokio::time::sleep(self.refresh_delay).await;
        }
        match self.refresh_script.lock().await.pop_front() {
            Some(result) => result,
            None => Ok(fresh_pair(900)),
        }
    }

    async fn logout_device(&self, _refresh_token: &str) -> Result<(), AuthError> {
        self.logout_device_calls.fetch_add(1, Ordering::SeqCst);
        self.logout_device_script
            .lock()
            .await
            .pop_front()
            .unwrap_or(Ok(()))
    }

    async fn logout_all(&self, _access_token: &str) -> Result<(), AuthError> {
        self.logout_all_calls.fetch_add(1, Ordering::SeqCst);
        self.logout_all_script
            .lock()
            .await
            .pop_front()
            .unwrap_or(Ok(()))
    }
}
