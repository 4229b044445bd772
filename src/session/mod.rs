//! Client-side session state and token lifecycle.
//!
//! [`SessionStore`] holds the current token pair plus the claims decoded from
//! the access token, and answers synchronous questions about it: is anyone
//! signed in, which roles and permissions do they hold. An access token past
//! its expiry reads as absent; nothing here blocks on the network.
//!
//! [`SessionManager`] owns the asynchronous side: signing in, signing out and
//! refreshing an expired access token. Refreshes are single-flight. Callers
//! that find the token expired all funnel through one lock; the first performs
//! the exchange and the rest adopt its result. A `clear_session` that lands
//! while a refresh is in flight wins: the late result is discarded via an
//! epoch check instead of resurrecting the session.

use crate::client::AuthApi;
use crate::error::AuthError;
use crate::token::{self, AccessClaims};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Transport errors on refresh are retried this many times before the
/// session is dropped.
pub const DEFAULT_REFRESH_RETRIES: u32 = 2;

/// Base delay between refresh retries, doubled per attempt.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// An access/refresh token pair as handed out by the backend.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expiry: DateTime<Utc>,
}

// Both tokens are bearer secrets, keep them out of logs.
impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"***")
            .field("refresh_token", &"***")
            .field("access_expiry", &self.access_expiry)
            .finish()
    }
}

/// Claims the client keeps alongside the token pair, decoded (without
/// verification) from the access token it received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionClaims {
    pub user_id: String,
    pub tenant_id: String,
    pub device_id: String,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

impl From<AccessClaims> for SessionClaims {
    fn from(claims: AccessClaims) -> Self {
        Self {
            user_id: claims.sub,
            tenant_id: claims.tid,
            device_id: claims.did,
            roles: claims.roles,
            permissions: claims.perms,
        }
    }
}

#[derive(Clone)]
struct Session {
    pair: TokenPair,
    claims: SessionClaims,
}

struct SessionSlot {
    session: Option<Session>,
    epoch: u64,
}

/// Everything a refresh attempt needs, captured in one lock acquisition so
/// the epoch matches the credentials it was observed with.
struct RefreshState {
    epoch: u64,
    refresh_token: String,
    device_id: String,
}

/// Holds the session for one signed-in principal.
///
/// All reads are synchronous and reflect the slot at the moment of the call.
/// The epoch counter advances on every mutation; a refresh started against an
/// older epoch cannot install its result.
pub struct SessionStore {
    slot: RwLock<SessionSlot>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(SessionSlot {
                session: None,
                epoch: 0,
            }),
        }
    }

    // A panicked writer leaves the slot value coherent, so poisoning is
    // recoverable.
    fn read_slot(&self) -> RwLockReadGuard<'_, SessionSlot> {
        self.slot.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_slot(&self) -> RwLockWriteGuard<'_, SessionSlot> {
        self.slot.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Installs a session, replacing whatever was there.
    pub fn set_session(&self, pair: TokenPair, claims: SessionClaims) {
        let mut slot = self.write_slot();
        slot.epoch += 1;
        slot.session = Some(Session { pair, claims });
    }

    /// Drops the session. Idempotent, and always wins over an in-flight
    /// refresh: the epoch bump makes any later install a no-op.
    pub fn clear_session(&self) {
        let mut slot = self.write_slot();
        slot.epoch += 1;
        slot.session = None;
    }

    fn live(&self) -> Option<Session> {
        let slot = self.read_slot();
        slot.session
            .as_ref()
            .filter(|session| session.pair.access_expiry > Utc::now())
            .cloned()
    }

    /// The current access token, or `None` when signed out or expired.
    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.live().map(|session| session.pair.access_token)
    }

    /// Whether a session with a non-expired access token is present.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.live().is_some()
    }

    /// Claims of the live session, or `None` when signed out or expired.
    #[must_use]
    pub fn claims(&self) -> Option<SessionClaims> {
        self.live().map(|session| session.claims)
    }

    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.claims()
            .is_some_and(|claims| claims.roles.iter().any(|held| held == role))
    }

    /// True when the live session holds at least one of `permissions`.
    #[must_use]
    pub fn has_any_permission(&self, permissions: &[&str]) -> bool {
        self.claims().is_some_and(|claims| {
            permissions
                .iter()
                .any(|wanted| claims.permissions.iter().any(|held| held == wanted))
        })
    }

    /// Refresh credentials of the stored session, expired or not, together
    /// with the epoch they were observed at.
    fn refresh_state(&self) -> Option<RefreshState> {
        let slot = self.read_slot();
        slot.session.as_ref().map(|session| RefreshState {
            epoch: slot.epoch,
            refresh_token: session.pair.refresh_token.clone(),
            device_id: session.claims.device_id.clone(),
        })
    }

    /// Installs a refreshed session only if the slot is unchanged since
    /// `observed_epoch`. Returns `false` when the result must be discarded.
    fn install_refreshed(
        &self,
        observed_epoch: u64,
        pair: TokenPair,
        claims: SessionClaims,
    ) -> bool {
        let mut slot = self.write_slot();
        if slot.epoch != observed_epoch {
            return false;
        }
        slot.epoch += 1;
        slot.session = Some(Session { pair, claims });
        true
    }
}

/// Drives login, logout and refresh against an [`AuthApi`] backend and keeps
/// a [`SessionStore`] up to date.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<SessionStore>,
    api: Arc<dyn AuthApi>,
    refresh_lock: Arc<Mutex<()>>,
    refresh_retries: u32,
    retry_backoff: Duration,
}

impl SessionManager {
    #[must_use]
    pub fn new(store: Arc<SessionStore>, api: Arc<dyn AuthApi>) -> Self {
        Self {
            store,
            api,
            refresh_lock: Arc::new(Mutex::new(())),
            refresh_retries: DEFAULT_REFRESH_RETRIES,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    #[must_use]
    pub fn with_refresh_retries(mut self, retries: u32) -> Self {
        self.refresh_retries = retries;
        self
    }

    #[must_use]
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    #[must_use]
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Exchanges credentials for a token pair and installs the session.
    pub async fn login(&self, credentials: &crate::client::Credentials) -> Result<(), AuthError> {
        let pair = self.api.login(credentials).await?;
        let claims = decode_session_claims(&pair.access_token)?;
        self.store.set_session(pair, claims);
        Ok(())
    }

    /// Signs out locally and best-effort revokes the device's refresh token.
    ///
    /// The local session is gone by the time the revocation request goes out;
    /// a failure to reach the backend never resurrects it.
    pub async fn logout(&self) {
        let state = self.store.refresh_state();
        self.store.clear_session();
        if let Some(state) = state {
            if let Err(err) = self.api.logout_device(&state.refresh_token).await {
                warn!("device logout failed after local sign-out: {err}");
            }
        }
    }

    /// Revokes every refresh token of the signed-in user, then signs out.
    ///
    /// The local session is dropped whether or not the backend call went
    /// through, so a failed revocation still leaves this client signed out.
    pub async fn logout_all(&self) -> Result<(), AuthError> {
        self.ensure_fresh().await?;
        let access_token = self.store.access_token().ok_or(AuthError::Unauthenticated)?;
        let result = self.api.logout_all(&access_token).await;
        self.store.clear_session();
        result
    }

    /// Makes sure the store holds a non-expired access token, refreshing it
    /// if needed.
    ///
    /// Concurrent callers coalesce onto a single backend exchange. Transport
    /// errors are retried with exponential backoff up to the configured
    /// budget; an invalid refresh token is never retried. Either terminal
    /// failure drops the session.
    pub async fn ensure_fresh(&self) -> Result<(), AuthError> {
        if self.store.is_authenticated() {
            return Ok(());
        }
        let _guard = self.refresh_lock.lock().await;
        // A caller that queued behind an in-flight refresh adopts its result.
        if self.store.is_authenticated() {
            return Ok(());
        }
        let Some(state) = self.store.refresh_state() else {
            return Err(AuthError::Unauthenticated);
        };
        self.refresh_session(state).await
    }

    async fn refresh_session(&self, state: RefreshState) -> Result<(), AuthError> {
        let mut attempt: u32 = 0;
        loop {
            match self.api.refresh(&state.refresh_token, &state.device_id).await {
                Ok(pair) => {
                    let claims = match decode_session_claims(&pair.access_token) {
                        Ok(claims) => claims,
                        Err(err) => {
                            self.store.clear_session();
                            return Err(err);
                        }
                    };
                    if self.store.install_refreshed(state.epoch, pair, claims) {
                        return Ok(());
                    }
                    // Cleared while the exchange was in flight; the sign-out
                    // wins and the fresh tokens are dropped.
                    debug!("discarding refresh result, session changed underneath");
                    return Err(AuthError::Unauthenticated);
                }
                Err(err) if err.is_retryable() && attempt < self.refresh_retries => {
                    debug!("token refresh failed, retrying: {err}");
                    let backoff = self
                        .retry_backoff
                        .saturating_mul(2u32.saturating_pow(attempt));
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(err) => {
                    warn!("token refresh failed, dropping session: {err}");
                    self.store.clear_session();
                    return Err(err);
                }
            }
        }
    }
}

fn decode_session_claims(access_token: &str) -> Result<SessionClaims, AuthError> {
    let claims = token::decode_unverified(access_token)
        .map_err(|err| AuthError::Transport(format!("undecodable access token: {err}")))?;
    Ok(claims.into())
}

#[cfg(test)]
pub(crate) mod test_support;

#[cfg(test)]
mod tests {
    use super::test_support::{CountingAuthApi, expired_pair, fresh_pair, test_session_claims};
    use super::*;
    use crate::client::Credentials;
    use std::sync::atomic::Ordering;

    fn store_with(pair: TokenPair) -> SessionStore {
        let store = SessionStore::new();
        store.set_session(pair, test_session_claims());
        store
    }

    fn manager(api: Arc<CountingAuthApi>) -> (Arc<SessionStore>, SessionManager) {
        let store = Arc::new(SessionStore::new());
        let manager = SessionManager::new(store.clone(), api)
            .with_retry_backoff(Duration::from_millis(1));
        (store, manager)
    }

    #[test]
    fn set_and_clear_flip_observability() {
        let store = SessionStore::new();
        assert!(!store.is_authenticated());
        assert!(store.access_token().is_none());
        assert!(store.claims().is_none());

        store.set_session(fresh_pair(900), test_session_claims());
        assert!(store.is_authenticated());
        assert!(store.access_token().is_some());
        assert!(store.has_role("admin"));
        assert!(!store.has_role("auditor"));
        assert!(store.has_any_permission(&["tenants.read"]));
        assert!(store.has_any_permission(&["nothing.here", "tenants.read"]));
        assert!(!store.has_any_permission(&["nothing.here"]));
        assert!(!store.has_any_permission(&[]));

        store.clear_session();
        assert!(!store.is_authenticated());
        assert!(store.access_token().is_none());
        assert!(!store.has_role("admin"));
        assert!(!store.has_any_permission(&["tenants.read"]));
    }

    #[test]
    fn expired_access_token_reads_as_absent() {
        let store = store_with(expired_pair());
        assert!(!store.is_authenticated());
        assert!(store.access_token().is_none());
        assert!(store.claims().is_none());
        // The refresh credentials survive expiry.
        assert!(store.refresh_state().is_some());
    }

    #[test]
    fn token_pair_debug_redacts_tokens() {
        let rendered = format!("{:?}", fresh_pair(900));
        assert!(!rendered.contains("ey"), "tokens leaked: {rendered}");
        assert!(rendered.contains("***"));
    }

    #[tokio::test]
    async fn ensure_fresh_skips_backend_when_token_is_live() {
        let api = Arc::new(CountingAuthApi::new());
        let (store, manager) = manager(api.clone());
        store.set_session(fresh_pair(900), test_session_claims());

        manager.ensure_fresh().await.unwrap();
        assert_eq!(api.refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn ensure_fresh_refreshes_expired_session() {
        let api = Arc::new(CountingAuthApi::new());
        let (store, manager) = manager(api.clone());
        store.set_session(expired_pair(), test_session_claims());

        manager.ensure_fresh().await.unwrap();
        assert!(store.is_authenticated());
        assert!(store.access_token().is_some());
        assert_eq!(api.refresh_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn ensure_fresh_without_session_is_unauthenticated() {
        let api = Arc::new(CountingAuthApi::new());
        let (_store, manager) = manager(api.clone());

        let err = manager.ensure_fresh().await.unwrap_err();
        assert_eq!(err, AuthError::Unauthenticated);
        assert_eq!(api.refresh_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn concurrent_refreshes_coalesce_into_one_exchange() {
        let api = Arc::new(CountingAuthApi::new().with_refresh_delay(Duration::from_millis(50)));
        let (store, manager) = manager(api.clone());
        store.set_session(expired_pair(), test_session_claims());

        let (first, second) = tokio::join!(manager.ensure_fresh(), manager.ensure_fresh());
        first.unwrap();
        second.unwrap();
        assert_eq!(api.refresh_calls.load(Ordering::SeqCst), 1);
        assert!(store.is_authenticated());
    }

    #[tokio::test]
    async fn clear_session_wins_over_inflight_refresh() {
        let api = Arc::new(CountingAuthApi::new().with_refresh_delay(Duration::from_millis(50)));
        let (store, manager) = manager(api.clone());
        store.set_session(expired_pair(), test_session_claims());

        let task = tokio::spawn({
            let manager = manager.clone();
            async move { manager.ensure_fresh().await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        store.clear_session();

        let result = task.await.unwrap();
        assert_eq!(result.unwrap_err(), AuthError::Unauthenticated);
        assert!(!store.is_authenticated(), "late refresh must not resurrect the session");
        assert!(store.refresh_state().is_none());
    }

    #[tokio::test]
    async fn invalid_refresh_token_forces_logout_without_retry() {
        let api = Arc::new(CountingAuthApi::new());
        api.script_refresh(Err(AuthError::InvalidRefreshToken)).await;
        let (store, manager) = manager(api.clone());
        store.set_session(expired_pair(), test_session_claims());

        let err = manager.ensure_fresh().await.unwrap_err();
        assert_eq!(err, AuthError::InvalidRefreshToken);
        assert_eq!(api.refresh_calls.load(Ordering::SeqCst), 1);
        assert!(!store.is_authenticated());
        assert!(store.refresh_state().is_none());
    }

    #[tokio::test]
    async fn transport_errors_are_retried_until_one_succeeds() {
        let api = Arc::new(CountingAuthApi::new());
        api.script_refresh(Err(AuthError::Transport("connection reset".into())))
            .await;
        api.script_refresh(Err(AuthError::Transport("connection reset".into())))
            .await;
        let (store, manager) = manager(api.clone());
        store.set_session(expired_pair(), test_session_claims());

        manager.ensure_fresh().await.unwrap();
        assert_eq!(api.refresh_calls.load(Ordering::SeqCst), 3);
        assert!(store.is_authenticated());
    }

    #[tokio::test]
    async fn transport_exhaustion_drops_the_session() {
        let api = Arc::new(CountingAuthApi::new());
        for _ in 0..3 {
            api.script_refresh(Err(AuthError::Transport("gateway timeout".into())))
                .await;
        }
        let (store, manager) = manager(api.clone());
        store.set_session(expired_pair(), test_session_claims());

        let err = manager.ensure_fresh().await.unwrap_err();
        assert!(err.is_retryable(), "expected a transport error, got {err}");
        assert_eq!(api.refresh_calls.load(Ordering::SeqCst), 3);
        assert!(!store.is_authenticated());
        assert!(store.refresh_state().is_none());
    }

    #[tokio::test]
    async fn login_installs_a_session_with_decoded_claims() {
        let api = Arc::new(CountingAuthApi::new());
        let (store, manager) = manager(api.clone());

        manager
            .login(&Credentials::new("ana@example.com", "hunter2"))
            .await
            .unwrap();
        assert!(store.is_authenticated());
        let claims = store.claims().unwrap();
        assert_eq!(claims.roles, vec!["admin".to_string()]);
        assert_eq!(claims.permissions, vec!["tenants.read".to_string()]);
        assert_eq!(api.login_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_login_leaves_the_store_signed_out() {
        let api = Arc::new(CountingAuthApi::new());
        api.script_login(Err(AuthError::InvalidCredentials)).await;
        let (store, manager) = manager(api.clone());

        let err = manager
            .login(&Credentials::new("ana@example.com", "wrong"))
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::InvalidCredentials);
        assert!(!store.is_authenticated());
    }

    #[tokio::test]
    async fn logout_clears_locally_even_when_revocation_fails() {
        let api = Arc::new(CountingAuthApi::new());
        api.script_logout_device(Err(AuthError::Transport("backend down".into())))
            .await;
        let (store, manager) = manager(api.clone());
        store.set_session(fresh_pair(900), test_session_claims());

        manager.logout().await;
        assert!(!store.is_authenticated());
        assert!(store.refresh_state().is_none());
        assert_eq!(api.logout_device_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn logout_without_session_skips_the_backend() {
        let api = Arc::new(CountingAuthApi::new());
        let (store, manager) = manager(api.clone());

        manager.logout().await;
        assert!(!store.is_authenticated());
        assert_eq!(api.logout_device_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn logout_all_revokes_then_clears() {
        let api = Arc::new(CountingAuthApi::new());
        let (store, manager) = manager(api.clone());
        store.set_session(fresh_pair(900), test_session_claims());

        manager.logout_all().await.unwrap();
        assert_eq!(api.logout_all_calls.load(Ordering::SeqCst), 1);
        assert!(!store.is_authenticated());
    }

    #[tokio::test]
    async fn logout_all_clears_locally_even_on_backend_error() {
        let api = Arc::new(CountingAuthApi::new());
        api.script_logout_all(Err(AuthError::Transport("backend down".into())))
            .await;
        let (store, manager) = manager(api.clone());
        store.set_session(fresh_pair(900), test_session_claims());

        let err = manager.logout_all().await.unwrap_err();
        assert!(err.is_retryable());
        assert!(!store.is_authenticated());
    }
}
