//! PostgreSQL storage backends.
//!
//! These are the production implementations of the storage traits. Queries
//! use the runtime `sqlx::query_as` API over a shared [`PgPool`]; every call
//! goes to the database, nothing is cached, so administrative changes
//! (client revocation, role updates) are visible to the very next request.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use crate::types::{UserId, abbrev_uuid};

use super::{ClientRecord, ClientRegistry, Result, TokenRecord, TokenStore, UserDirectory, UserRecord};

#[derive(Debug, Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    #[instrument(skip(self, user), fields(username = %user.username), err)]
    async fn create_user(&self, user: &UserRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, username, password_hash, role, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.role)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&self, id: UserId) -> Result<Option<UserRecord>> {
        let user = sqlx::query_as::<_, UserRecord>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    #[instrument(skip(self), err)]
    async fn get_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        let user = sqlx::query_as::<_, UserRecord>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    #[instrument(skip(self, password_hash), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn update_password_hash(&self, id: UserId, password_hash: &str) -> Result<()> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn delete_user(&self, id: UserId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1").bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), err)]
    async fn has_admin(&self) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE role = 'admin')")
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }
}

#[derive(Debug, Clone)]
pub struct PgClientRegistry {
    pool: PgPool,
}

impl PgClientRegistry {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ClientRegistry for PgClientRegistry {
    #[instrument(skip(self, client), fields(client_id = %client.id), err)]
    async fn create_client(&self, client: &ClientRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO oauth_clients (id, secret, domain, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&client.id)
        .bind(&client.secret)
        .bind(&client.domain)
        .bind(client.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&self, id: &str) -> Result<Option<ClientRecord>> {
        let client = sqlx::query_as::<_, ClientRecord>("SELECT * FROM oauth_clients WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(client)
    }

    #[instrument(skip(self), err)]
    async fn list_all(&self) -> Result<Vec<ClientRecord>> {
        let clients = sqlx::query_as::<_, ClientRecord>("SELECT * FROM oauth_clients ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(clients)
    }

    #[instrument(skip(self), err)]
    async fn delete_by_id(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM oauth_clients WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), err)]
    async fn has_any_client(&self) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM oauth_clients)")
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }
}

#[derive(Debug, Clone)]
pub struct PgTokenStore {
    pool: PgPool,
}

impl PgTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    #[instrument(skip(self, record), fields(user_id = %abbrev_uuid(&record.user_id), client_id = %record.client_id), err)]
    async fn insert(&self, record: &TokenRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO oauth_tokens
                (access_token, refresh_token, user_id, client_id, access_expires_at, refresh_expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&record.access_token)
        .bind(&record.refresh_token)
        .bind(record.user_id)
        .bind(&record.client_id)
        .bind(record.access_expires_at)
        .bind(record.refresh_expires_at)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    #[instrument(skip_all, err)]
    async fn get_by_access(&self, access_token: &str) -> Result<Option<TokenRecord>> {
        let record = sqlx::query_as::<_, TokenRecord>("SELECT * FROM oauth_tokens WHERE access_token = $1")
            .bind(access_token)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    // DELETE ... RETURNING is the compare-and-invalidate: the row is gone in
    // the same statement that reads it, so of two concurrent rotations at
    // most one gets the record back, regardless of which process they run in.
    #[instrument(skip_all, err)]
    async fn consume_refresh(&self, refresh_token: &str) -> Result<Option<TokenRecord>> {
        let record = sqlx::query_as::<_, TokenRecord>("DELETE FROM oauth_tokens WHERE refresh_token = $1 RETURNING *")
            .bind(refresh_token)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    #[instrument(skip_all, err)]
    async fn remove_access(&self, access_token: &str) -> Result<()> {
        sqlx::query("DELETE FROM oauth_tokens WHERE access_token = $1")
            .bind(access_token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn purge_expired(&self, now: chrono::DateTime<chrono::Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM oauth_tokens WHERE refresh_expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
