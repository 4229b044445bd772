//! Persistence traits behind the authorization core, with in-memory and
//! Postgres backends.
//!
//! Handlers only see the traits; the in-memory backend keeps the server
//! runnable (and testable) without a database, the Postgres backend is the
//! production path.

use crate::tenant::TenantRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

mod memory;
mod postgres;

pub use memory::{MemoryRefreshTokenStore, MemoryTenantDirectory, MemoryUserDirectory};
pub use postgres::{PgRefreshTokenStore, PgTenantDirectory, PgUserDirectory};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{context}")]
    Database {
        context: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

impl StoreError {
    pub(crate) fn db(context: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| Self::Database { context, source }
    }
}

/// A user as needed for credential checks and claim assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub user_id: Uuid,
    pub identifier: String,
    pub password_hash: String,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    pub is_active: bool,
}

/// One issued refresh token. Only the hash of the raw token is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub device_id: String,
    pub token_hash: Vec<u8>,
    pub expires_at: DateTime<Utc>,
}

/// User lookups. Identifiers are expected pre-normalized (trimmed,
/// lowercased) by the caller.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<UserRecord>, StoreError>;

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<UserRecord>, StoreError>;
}

/// Refresh token issuance, single-use consumption and revocation.
///
/// `consume` is the replay gate: it must atomically mark the token used and
/// return it, so a second consume of the same token observes "already used"
/// on every backend instance. `revoke` is idempotent by contract, revoking a
/// token that is gone is a no-op, not an error.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn insert(&self, record: RefreshTokenRecord) -> Result<(), StoreError>;

    /// Atomically consume an unused, unexpired token bound to `device_id`.
    ///
    /// Returns `None` when the token is unknown, already consumed, expired
    /// or bound to a different device; the caller cannot distinguish these
    /// on purpose.
    async fn consume(
        &self,
        token_hash: &[u8],
        device_id: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError>;

    async fn revoke(&self, token_hash: &[u8]) -> Result<(), StoreError>;

    /// Revoke every token issued to the user, returning how many were live.
    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, StoreError>;
}

/// Tenant listing consumed by the resolver; no filtered queries on purpose,
/// matching happens in [`crate::tenant::find_by_identifying_email`].
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn get_all(&self) -> Result<Vec<TenantRecord>, StoreError>;
}

/// The three stores the API needs, plus the pool when Postgres backs them.
#[derive(Clone)]
pub struct Stores {
    users: Arc<dyn UserDirectory>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    tenants: Arc<dyn TenantDirectory>,
    pool: Option<PgPool>,
}

impl Stores {
    #[must_use]
    pub fn new(
        users: Arc<dyn UserDirectory>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        tenants: Arc<dyn TenantDirectory>,
    ) -> Self {
        Self {
            users,
            refresh_tokens,
            tenants,
            pool: None,
        }
    }

    /// Empty in-memory backend; nothing survives a restart.
    #[must_use]
    pub fn memory() -> Self {
        Self::new(
            Arc::new(MemoryUserDirectory::default()),
            Arc::new(MemoryRefreshTokenStore::default()),
            Arc::new(MemoryTenantDirectory::default()),
        )
    }

    #[must_use]
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            users: Arc::new(PgUserDirectory::new(pool.clone())),
            refresh_tokens: Arc::new(PgRefreshTokenStore::new(pool.clone())),
            tenants: Arc::new(PgTenantDirectory::new(pool.clone())),
            pool: Some(pool),
        }
    }

    #[must_use]
    pub fn users(&self) -> &Arc<dyn UserDirectory> {
        &self.users
    }

    #[must_use]
    pub fn refresh_tokens(&self) -> &Arc<dyn RefreshTokenStore> {
        &self.refresh_tokens
    }

    #[must_use]
    pub fn tenants(&self) -> &Arc<dyn TenantDirectory> {
        &self.tenants
    }

    /// Present only when the Postgres backend is in use; the health check
    /// pings it.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.pool.as_ref()
    }
}
