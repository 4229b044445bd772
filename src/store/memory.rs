//! In-memory store backends: dev profile and tests.

use super::{
    RefreshTokenRecord, RefreshTokenStore, StoreError, TenantDirectory, UserDirectory, UserRecord,
};
use crate::tenant::TenantRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Fixed user set built before the server starts; lookups never mutate.
#[derive(Debug, Default)]
pub struct MemoryUserDirectory {
    users: Vec<UserRecord>,
}

impl MemoryUserDirectory {
    #[must_use]
    pub fn with_user(mut self, user: UserRecord) -> Self {
        self.users.push(user);
        self
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<UserRecord>, StoreError> {
        Ok(self
            .users
            .iter()
            .find(|user| user.identifier == identifier)
            .cloned())
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<UserRecord>, StoreError> {
        Ok(self
            .users
            .iter()
            .find(|user| user.user_id == user_id)
            .cloned())
    }
}

#[derive(Debug, Clone)]
struct StoredRefreshToken {
    record: RefreshTokenRecord,
    consumed_at: Option<DateTime<Utc>>,
}

/// Refresh tokens keyed by token hash. Expired rows are pruned
/// opportunistically on insert.
#[derive(Debug, Default)]
pub struct MemoryRefreshTokenStore {
    tokens: Mutex<HashMap<Vec<u8>, StoredRefreshToken>>,
}

#[async_trait]
impl RefreshTokenStore for MemoryRefreshTokenStore {
    async fn insert(&self, record: RefreshTokenRecord) -> Result<(), StoreError> {
        let now = Utc::now();
        let mut tokens = self.tokens.lock().await;
        tokens.retain(|_, stored| stored.record.expires_at > now);
        tokens.insert(
            record.token_hash.clone(),
            StoredRefreshToken {
                record,
                consumed_at: None,
            },
        );
        Ok(())
    }

    async fn consume(
        &self,
        token_hash: &[u8],
        device_id: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let now = Utc::now();
        let mut tokens = self.tokens.lock().await;
        let Some(stored) = tokens.get_mut(token_hash) else {
            return Ok(None);
        };
        // Same conditions as the SQL backend's UPDATE ... WHERE; a mismatch
        // leaves the row untouched.
        if stored.consumed_at.is_some()
            || stored.record.device_id != device_id
            || stored.record.expires_at <= now
        {
            return Ok(None);
        }
        stored.consumed_at = Some(now);
        Ok(Some(stored.record.clone()))
    }

    async fn revoke(&self, token_hash: &[u8]) -> Result<(), StoreError> {
        let mut tokens = self.tokens.lock().await;
        tokens.remove(token_hash);
        Ok(())
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let mut tokens = self.tokens.lock().await;
        let before = tokens.len();
        tokens.retain(|_, stored| stored.record.user_id != user_id);
        Ok((before - tokens.len()) as u64)
    }
}

/// Fixed tenant set; the resolver does the matching.
#[derive(Debug, Default)]
pub struct MemoryTenantDirectory {
    tenants: Vec<TenantRecord>,
}

impl MemoryTenantDirectory {
    #[must_use]
    pub fn with_tenant(mut self, tenant: TenantRecord) -> Self {
        self.tenants.push(tenant);
        self
    }
}

#[async_trait]
impl TenantDirectory for MemoryTenantDirectory {
    async fn get_all(&self) -> Result<Vec<TenantRecord>, StoreError> {
        Ok(self.tenants.clone())
    }
}
