//! Postgres store backends.
//!
//! Expected tables: `users` (id, identifier, password_hash, roles,
//! permissions, status), `refresh_tokens` (id, user_id, device_id,
//! token_hash, expires_at, consumed_at) and `tenants` (id, display_name,
//! identifying_email, is_active).

use super::{
    RefreshTokenRecord, RefreshTokenStore, StoreError, TenantDirectory, UserDirectory, UserRecord,
};
use crate::tenant::TenantRecord;
use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn user_from_row(row: &sqlx::postgres::PgRow) -> UserRecord {
    UserRecord {
        user_id: row.get("id"),
        identifier: row.get("identifier"),
        password_hash: row.get("password_hash"),
        roles: row.get("roles"),
        permissions: row.get("permissions"),
        is_active: row.get("is_active"),
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<UserRecord>, StoreError> {
        let query = r"
            SELECT id, identifier, password_hash, roles, permissions,
                   status = 'active' AS is_active
            FROM users
            WHERE identifier = $1
            LIMIT 1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(identifier)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(StoreError::db("failed to lookup user by identifier"))?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<UserRecord>, StoreError> {
        let query = r"
            SELECT id, identifier, password_hash, roles, permissions,
                   status = 'active' AS is_active
            FROM users
            WHERE id = $1
            LIMIT 1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(StoreError::db("failed to lookup user by id"))?;

        Ok(row.as_ref().map(user_from_row))
    }
}

pub struct PgRefreshTokenStore {
    pool: PgPool,
}

impl PgRefreshTokenStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefreshTokenStore for PgRefreshTokenStore {
    async fn insert(&self, record: RefreshTokenRecord) -> Result<(), StoreError> {
        let query = r"
            INSERT INTO refresh_tokens (id, user_id, device_id, token_hash, expires_at)
            VALUES ($1, $2, $3, $4, $5)
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(record.id)
            .bind(record.user_id)
            .bind(&record.device_id)
            .bind(&record.token_hash)
            .bind(record.expires_at)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(StoreError::db("failed to insert refresh token"))?;
        Ok(())
    }

    async fn consume(
        &self,
        token_hash: &[u8],
        device_id: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        // Single-use gate: marking and reading happen in one statement, so a
        // replayed token loses the race on every instance.
        let query = r"
            UPDATE refresh_tokens
            SET consumed_at = NOW()
            WHERE token_hash = $1
              AND device_id = $2
              AND consumed_at IS NULL
              AND expires_at > NOW()
            RETURNING id, user_id, device_id, expires_at
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(token_hash)
            .bind(device_id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await
            .map_err(StoreError::db("failed to consume refresh token"))?;

        Ok(row.map(|row| RefreshTokenRecord {
            id: row.get("id"),
            user_id: row.get("user_id"),
            device_id: row.get("device_id"),
            token_hash: token_hash.to_vec(),
            expires_at: row.get("expires_at"),
        }))
    }

    async fn revoke(&self, token_hash: &[u8]) -> Result<(), StoreError> {
        // Revocation is idempotent; it's fine if no rows are deleted.
        let query = "DELETE FROM refresh_tokens WHERE token_hash = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(token_hash)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(StoreError::db("failed to revoke refresh token"))?;
        Ok(())
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<u64, StoreError> {
        let query = "DELETE FROM refresh_tokens WHERE user_id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "DELETE",
            db.statement = query
        );
        let result = sqlx::query(query)
            .bind(user_id)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(StoreError::db("failed to revoke user refresh tokens"))?;
        Ok(result.rows_affected())
    }
}

pub struct PgTenantDirectory {
    pool: PgPool,
}

impl PgTenantDirectory {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantDirectory for PgTenantDirectory {
    async fn get_all(&self) -> Result<Vec<TenantRecord>, StoreError> {
        let query = r"
            SELECT id, display_name, identifying_email, is_active
            FROM tenants
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .instrument(span)
            .await
            .map_err(StoreError::db("failed to list tenants"))?;

        Ok(rows
            .into_iter()
            .map(|row| TenantRecord {
                tenant_id: row.get("id"),
                display_name: row.get("display_name"),
                identifying_email: row.get("identifying_email"),
                is_active: row.get("is_active"),
            })
            .collect())
    }
}
