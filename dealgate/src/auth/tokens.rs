//! Token pair lifecycle: issuance, validation, rotation, revocation.
//!
//! Tokens are opaque random strings; everything about them (owner, client,
//! expiry) lives in the token store, which is why revocation and rotation
//! are enforceable server-side. Client resolution always goes to the live
//! registry, never a snapshot, so revoking a client blocks the next
//! issuance or refresh without a restart.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use base64::{Engine as _, engine::general_purpose};
use chrono::{Duration, Utc};
use rand::prelude::RngExt;
use rand::rng;
use tracing::instrument;

use crate::errors::{Error, Result};
use crate::store::{ClientRegistry, TokenRecord, TokenStore};
use crate::types::UserId;

/// Generate an opaque credential: 32 bytes (256 bits) of cryptographically
/// secure randomness, base64url without padding.
pub fn generate_token() -> String {
    let mut token_bytes = [0u8; 32];
    rng().fill(&mut token_bytes);
    general_purpose::URL_SAFE_NO_PAD.encode(token_bytes)
}

#[derive(Clone)]
pub struct TokenManager {
    clients: Arc<dyn ClientRegistry>,
    store: Arc<dyn TokenStore>,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenManager {
    /// Lifetimes are fixed at construction from configuration, not computed
    /// per call.
    pub fn new(clients: Arc<dyn ClientRegistry>, store: Arc<dyn TokenStore>, access_ttl: StdDuration, refresh_ttl: StdDuration) -> Self {
        Self {
            clients,
            store,
            access_ttl: Duration::from_std(access_ttl).unwrap_or_else(|_| Duration::hours(1)),
            refresh_ttl: Duration::from_std(refresh_ttl).unwrap_or_else(|_| Duration::days(7)),
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    /// Mint a new access/refresh pair bound to (user, client).
    ///
    /// The client is resolved against the live registry; an unknown or
    /// revoked client fails with [`Error::UnknownClient`]. The pair is
    /// persisted in a single store write.
    #[instrument(skip(self), fields(client_id = %client_id), err(level = "debug"))]
    pub async fn issue(&self, user_id: UserId, client_id: &str) -> Result<TokenRecord> {
        if self.clients.get_by_id(client_id).await?.is_none() {
            return Err(Error::UnknownClient {
                id: client_id.to_string(),
            });
        }

        let now = Utc::now();
        let record = TokenRecord {
            access_token: generate_token(),
            refresh_token: generate_token(),
            user_id,
            client_id: client_id.to_string(),
            access_expires_at: now + self.access_ttl,
            refresh_expires_at: now + self.refresh_ttl,
            created_at: now,
        };
        self.store.insert(&record).await?;
        Ok(record)
    }

    /// Resolve a presented access token to its owning user ID.
    ///
    /// Unknown, revoked, and expired tokens all fail with the same
    /// [`Error::InvalidOrExpiredToken`].
    #[instrument(skip_all, err(level = "debug"))]
    pub async fn resolve_access(&self, access_token: &str) -> Result<UserId> {
        let record = self
            .store
            .get_by_access(access_token)
            .await?
            .ok_or(Error::InvalidOrExpiredToken)?;
        if Utc::now() >= record.access_expires_at {
            return Err(Error::InvalidOrExpiredToken);
        }
        Ok(record.user_id)
    }

    /// Rotate: consume the presented refresh token and mint a fresh pair
    /// for the same (user, client).
    ///
    /// The consume is atomic in the store, so of two concurrent refreshes
    /// with the same token at most one succeeds; the loser and any later
    /// reuse fail with [`Error::InvalidOrExpiredToken`].
    #[instrument(skip_all, err(level = "debug"))]
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenRecord> {
        let record = self
            .store
            .consume_refresh(refresh_token)
            .await?
            .ok_or(Error::InvalidOrExpiredToken)?;
        if Utc::now() >= record.refresh_expires_at {
            return Err(Error::InvalidOrExpiredToken);
        }
        // Re-checks the client registry, so a session whose client was
        // revoked dies at its next rotation
        self.issue(record.user_id, &record.client_id).await
    }

    /// Invalidate an access token (logout). Revoking a token that does not
    /// exist is not an error.
    #[instrument(skip_all, err)]
    pub async fn revoke(&self, access_token: &str) -> Result<()> {
        self.store.remove_access(access_token).await?;
        Ok(())
    }

    /// Remove pairs whose refresh token has expired. Rejected-but-retained
    /// records would otherwise accumulate in the store forever; the server
    /// runs this on a periodic sweep.
    #[instrument(skip_all, err)]
    pub async fn purge_expired(&self) -> Result<u64> {
        let removed = self.store.purge_expired(Utc::now()).await?;
        if removed > 0 {
            tracing::debug!(removed, "purged expired token pairs");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::{MemoryClientRegistry, MemoryTokenStore};
    use crate::store::{ClientRecord, ClientRegistry};
    use uuid::Uuid;

    async fn registry_with_client(id: &str) -> Arc<MemoryClientRegistry> {
        let registry = Arc::new(MemoryClientRegistry::new());
        registry
            .create_client(&ClientRecord {
                id: id.to_string(),
                secret: String::new(),
                domain: String::new(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        registry
    }

    fn manager(clients: Arc<MemoryClientRegistry>, access_ttl: StdDuration) -> TokenManager {
        TokenManager::new(clients, Arc::new(MemoryTokenStore::new()), access_ttl, StdDuration::from_secs(604800))
    }

    #[test]
    fn test_generated_tokens_are_unique_and_urlsafe() {
        let first = generate_token();
        let second = generate_token();

        assert_ne!(first, second);
        // 32 bytes of base64url without padding
        assert_eq!(first.len(), 43);
        assert!(first.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[tokio::test]
    async fn test_issue_and_resolve() {
        let clients = registry_with_client("app1").await;
        let manager = manager(clients, StdDuration::from_secs(3600));
        let user_id = Uuid::new_v4();

        let pair = manager.issue(user_id, "app1").await.unwrap();
        assert_eq!(manager.resolve_access(&pair.access_token).await.unwrap(), user_id);
    }

    #[tokio::test]
    async fn test_issue_unknown_client() {
        let clients = registry_with_client("app1").await;
        let manager = manager(clients, StdDuration::from_secs(3600));

        let err = manager.issue(Uuid::new_v4(), "rogue").await.unwrap_err();
        assert!(matches!(err, Error::UnknownClient { .. }));
    }

    #[tokio::test]
    async fn test_expired_access_token_rejected() {
        let clients = registry_with_client("app1").await;
        let manager = manager(clients, StdDuration::ZERO);

        let pair = manager.issue(Uuid::new_v4(), "app1").await.unwrap();
        let err = manager.resolve_access(&pair.access_token).await.unwrap_err();
        assert!(matches!(err, Error::InvalidOrExpiredToken));
    }

    #[tokio::test]
    async fn test_refresh_rotates_and_consumes() {
        let clients = registry_with_client("app1").await;
        let manager = manager(clients, StdDuration::from_secs(3600));
        let user_id = Uuid::new_v4();

        let original = manager.issue(user_id, "app1").await.unwrap();
        let rotated = manager.refresh(&original.refresh_token).await.unwrap();

        assert_eq!(rotated.user_id, user_id);
        assert_eq!(rotated.client_id, "app1");
        assert_ne!(rotated.refresh_token, original.refresh_token);

        // The original refresh token is spent even immediately afterwards
        let err = manager.refresh(&original.refresh_token).await.unwrap_err();
        assert!(matches!(err, Error::InvalidOrExpiredToken));
    }

    #[tokio::test]
    async fn test_concurrent_refresh_at_most_one_succeeds() {
        let clients = registry_with_client("app1").await;
        let manager = manager(clients, StdDuration::from_secs(3600));
        let pair = manager.issue(Uuid::new_v4(), "app1").await.unwrap();

        let first = {
            let manager = manager.clone();
            let token = pair.refresh_token.clone();
            tokio::spawn(async move { manager.refresh(&token).await })
        };
        let second = {
            let manager = manager.clone();
            let token = pair.refresh_token.clone();
            tokio::spawn(async move { manager.refresh(&token).await })
        };

        let results = [first.await.unwrap(), second.await.unwrap()];
        let successes = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1, "exactly one concurrent refresh may win");
        assert!(
            results
                .iter()
                .any(|r| matches!(r, Err(Error::InvalidOrExpiredToken)))
        );
    }

    #[tokio::test]
    async fn test_purge_expired_clears_dead_pairs_but_not_live_sessions() {
        let clients = registry_with_client("app1").await;
        let store = Arc::new(MemoryTokenStore::new());
        let dead_issuer = TokenManager::new(clients.clone(), store.clone(), StdDuration::ZERO, StdDuration::ZERO);
        let live_issuer = TokenManager::new(clients, store.clone(), StdDuration::from_secs(3600), StdDuration::from_secs(604800));
        let user_id = Uuid::new_v4();

        let mut dead = Vec::new();
        for _ in 0..20 {
            dead.push(dead_issuer.issue(user_id, "app1").await.unwrap());
        }
        let live = live_issuer.issue(user_id, "app1").await.unwrap();

        // Expired pairs are rejected but, without a purge, still stored
        for pair in &dead {
            assert!(dead_issuer.resolve_access(&pair.access_token).await.is_err());
            assert!(store.get_by_access(&pair.access_token).await.unwrap().is_some());
        }

        assert_eq!(live_issuer.purge_expired().await.unwrap(), 20);
        for pair in &dead {
            assert!(store.get_by_access(&pair.access_token).await.unwrap().is_none());
        }
        assert_eq!(live_issuer.resolve_access(&live.access_token).await.unwrap(), user_id);
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent_and_immediate() {
        let clients = registry_with_client("app1").await;
        let manager = manager(clients, StdDuration::from_secs(3600));
        let pair = manager.issue(Uuid::new_v4(), "app1").await.unwrap();

        manager.revoke(&pair.access_token).await.unwrap();
        assert!(matches!(
            manager.resolve_access(&pair.access_token).await.unwrap_err(),
            Error::InvalidOrExpiredToken
        ));

        // Revoking again, or revoking garbage, is fine
        manager.revoke(&pair.access_token).await.unwrap();
        manager.revoke("never-issued").await.unwrap();
    }

    #[tokio::test]
    async fn test_client_revocation_blocks_new_issuance_not_existing_tokens() {
        let clients = registry_with_client("app1").await;
        let manager = manager(clients.clone(), StdDuration::from_secs(3600));
        let user_id = Uuid::new_v4();

        let pair = manager.issue(user_id, "app1").await.unwrap();
        clients.delete_by_id("app1").await.unwrap();

        // Existing access token still resolves until it expires
        assert_eq!(manager.resolve_access(&pair.access_token).await.unwrap(), user_id);
        // But no new pairs can be minted, directly or via rotation
        assert!(matches!(manager.issue(user_id, "app1").await.unwrap_err(), Error::UnknownClient { .. }));
        assert!(matches!(
            manager.refresh(&pair.refresh_token).await.unwrap_err(),
            Error::UnknownClient { .. }
        ));
    }
}
