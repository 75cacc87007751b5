//! Storage interfaces consumed by the auth core.
//!
//! The core depends only on the traits in this module; backends are
//! swappable. [`postgres`] holds the production implementations, [`memory`]
//! an in-process implementation used by the test suite and for throwaway
//! development setups.
//!
//! All lookups follow the same convention: a missing record is `Ok(None)`,
//! never an error. Every method is safe for concurrent use from multiple
//! request tasks.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::api::models::users::Role;
use crate::types::UserId;

pub mod errors;
pub mod memory;
pub mod postgres;

pub use errors::{Result, StoreError};

/// A stored user identity. The password hash never leaves the auth core.
#[derive(Debug, Clone, FromRow)]
pub struct UserRecord {
    pub id: UserId,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A registered OAuth2 client application.
///
/// An empty secret marks a public client: the secret check is skipped when
/// it requests tokens.
#[derive(Debug, Clone, FromRow)]
pub struct ClientRecord {
    pub id: String,
    pub secret: String,
    pub domain: String,
    pub created_at: DateTime<Utc>,
}

/// An issued access/refresh token pair, bound to one (user, client).
///
/// The pair is persisted as a single record so issuance is atomic: a
/// cancelled issue can never leave an access token without its refresh
/// counterpart.
#[derive(Debug, Clone, FromRow)]
pub struct TokenRecord {
    pub access_token: String,
    pub refresh_token: String,
    pub user_id: UserId,
    pub client_id: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Persistent store of user identities.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Insert a new user. Fails with [`StoreError::UniqueViolation`] on a
    /// duplicate username.
    async fn create_user(&self, user: &UserRecord) -> Result<()>;

    async fn get_by_id(&self, id: UserId) -> Result<Option<UserRecord>>;

    async fn get_by_username(&self, username: &str) -> Result<Option<UserRecord>>;

    /// Replace a user's password hash.
    async fn update_password_hash(&self, id: UserId, password_hash: &str) -> Result<()>;

    /// Remove a user. Returns whether a record existed.
    async fn delete_user(&self, id: UserId) -> Result<bool>;

    /// Whether at least one admin-role user exists.
    async fn has_admin(&self) -> Result<bool>;
}

/// Persistent store of registered OAuth2 clients.
#[async_trait]
pub trait ClientRegistry: Send + Sync {
    /// Insert a new client. Fails with [`StoreError::UniqueViolation`] on a
    /// duplicate client ID.
    async fn create_client(&self, client: &ClientRecord) -> Result<()>;

    async fn get_by_id(&self, id: &str) -> Result<Option<ClientRecord>>;

    async fn list_all(&self) -> Result<Vec<ClientRecord>>;

    /// Remove a client. Returns whether a record existed.
    async fn delete_by_id(&self, id: &str) -> Result<bool>;

    /// Whether at least one client is registered.
    async fn has_any_client(&self) -> Result<bool>;
}

/// Opaque persistence for issued token pairs.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Persist a freshly issued pair in one atomic write.
    async fn insert(&self, record: &TokenRecord) -> Result<()>;

    async fn get_by_access(&self, access_token: &str) -> Result<Option<TokenRecord>>;

    /// Atomically invalidate the pair holding this refresh token and return
    /// it. Of any number of concurrent calls with the same token, at most
    /// one observes `Some`; the rest observe `None`. This is what makes
    /// refresh rotation single-use under concurrency, and it must hold
    /// across processes, so backends implement it with their own
    /// compare-and-invalidate primitive rather than application locking.
    async fn consume_refresh(&self, refresh_token: &str) -> Result<Option<TokenRecord>>;

    /// Drop the pair holding this access token. Unknown tokens are a no-op.
    async fn remove_access(&self, access_token: &str) -> Result<()>;

    /// Drop every pair whose refresh token expired at or before `now`, and
    /// return how many were removed. Pairs that can still be rotated are
    /// untouched.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}
