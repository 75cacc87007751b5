//! In-memory storage backends.
//!
//! Used by the test suite and usable as a throwaway development backend.
//! State lives in process and is lost on restart. The locking discipline is
//! the usual one for async code: a plain mutex held only across the map
//! operation, never across an await point.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::types::UserId;

use super::{ClientRecord, ClientRegistry, Result, StoreError, TokenRecord, TokenStore, UserDirectory, UserRecord};

#[derive(Debug, Default)]
pub struct MemoryUserDirectory {
    users: Mutex<HashMap<UserId, UserRecord>>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn create_user(&self, user: &UserRecord) -> Result<()> {
        let mut users = self.users.lock().unwrap();
        if users.values().any(|u| u.username == user.username) {
            return Err(StoreError::UniqueViolation {
                constraint: Some("users_username_key".to_string()),
                message: format!("username {:?} already exists", user.username),
            });
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: UserId) -> Result<Option<UserRecord>> {
        Ok(self.users.lock().unwrap().get(&id).cloned())
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<UserRecord>> {
        Ok(self.users.lock().unwrap().values().find(|u| u.username == username).cloned())
    }

    async fn update_password_hash(&self, id: UserId, password_hash: &str) -> Result<()> {
        let mut users = self.users.lock().unwrap();
        if let Some(user) = users.get_mut(&id) {
            user.password_hash = password_hash.to_string();
            user.updated_at = chrono::Utc::now();
        }
        Ok(())
    }

    async fn delete_user(&self, id: UserId) -> Result<bool> {
        Ok(self.users.lock().unwrap().remove(&id).is_some())
    }

    async fn has_admin(&self) -> Result<bool> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .values()
            .any(|u| u.role == crate::api::models::users::Role::Admin))
    }
}

#[derive(Debug, Default)]
pub struct MemoryClientRegistry {
    clients: Mutex<HashMap<String, ClientRecord>>,
}

impl MemoryClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClientRegistry for MemoryClientRegistry {
    async fn create_client(&self, client: &ClientRecord) -> Result<()> {
        let mut clients = self.clients.lock().unwrap();
        if clients.contains_key(&client.id) {
            return Err(StoreError::UniqueViolation {
                constraint: Some("oauth_clients_pkey".to_string()),
                message: format!("client {:?} already exists", client.id),
            });
        }
        clients.insert(client.id.clone(), client.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<ClientRecord>> {
        Ok(self.clients.lock().unwrap().get(id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<ClientRecord>> {
        let mut clients: Vec<_> = self.clients.lock().unwrap().values().cloned().collect();
        clients.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(clients)
    }

    async fn delete_by_id(&self, id: &str) -> Result<bool> {
        Ok(self.clients.lock().unwrap().remove(id).is_some())
    }

    async fn has_any_client(&self) -> Result<bool> {
        Ok(!self.clients.lock().unwrap().is_empty())
    }
}

/// Token pairs keyed by access token. `consume_refresh` removes under the
/// same lock it searches under, so two concurrent refreshes of one token
/// cannot both observe the record.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: Mutex<HashMap<String, TokenRecord>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn insert(&self, record: &TokenRecord) -> Result<()> {
        self.tokens.lock().unwrap().insert(record.access_token.clone(), record.clone());
        Ok(())
    }

    async fn get_by_access(&self, access_token: &str) -> Result<Option<TokenRecord>> {
        Ok(self.tokens.lock().unwrap().get(access_token).cloned())
    }

    async fn consume_refresh(&self, refresh_token: &str) -> Result<Option<TokenRecord>> {
        let mut tokens = self.tokens.lock().unwrap();
        let key = tokens
            .iter()
            .find(|(_, record)| record.refresh_token == refresh_token)
            .map(|(key, _)| key.clone());
        Ok(key.and_then(|key| tokens.remove(&key)))
    }

    async fn remove_access(&self, access_token: &str) -> Result<()> {
        self.tokens.lock().unwrap().remove(access_token);
        Ok(())
    }

    async fn purge_expired(&self, now: chrono::DateTime<chrono::Utc>) -> Result<u64> {
        let mut tokens = self.tokens.lock().unwrap();
        let before = tokens.len();
        tokens.retain(|_, record| record.refresh_expires_at > now);
        Ok((before - tokens.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::users::Role;
    use chrono::Utc;
    use uuid::Uuid;

    fn token_record(access: &str, refresh: &str) -> TokenRecord {
        let now = Utc::now();
        TokenRecord {
            access_token: access.to_string(),
            refresh_token: refresh.to_string(),
            user_id: Uuid::new_v4(),
            client_id: "app1".to_string(),
            access_expires_at: now + chrono::Duration::hours(1),
            refresh_expires_at: now + chrono::Duration::days(7),
            created_at: now,
        }
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let store = MemoryUserDirectory::new();
        let now = Utc::now();
        let user = UserRecord {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            password_hash: "x".to_string(),
            role: Role::User,
            created_at: now,
            updated_at: now,
        };
        store.create_user(&user).await.unwrap();

        let duplicate = UserRecord {
            id: Uuid::new_v4(),
            ..user.clone()
        };
        let err = store.create_user(&duplicate).await.unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation { .. }));
    }

    #[tokio::test]
    async fn test_consume_refresh_is_single_use() {
        let store = MemoryTokenStore::new();
        store.insert(&token_record("acc", "ref")).await.unwrap();

        assert!(store.consume_refresh("ref").await.unwrap().is_some());
        assert!(store.consume_refresh("ref").await.unwrap().is_none());
        // Consuming the refresh token kills the access token too
        assert!(store.get_by_access("acc").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_purge_expired_removes_only_stale_pairs() {
        let store = MemoryTokenStore::new();
        let mut stale = token_record("stale-acc", "stale-ref");
        stale.refresh_expires_at = Utc::now() - chrono::Duration::minutes(1);
        store.insert(&stale).await.unwrap();
        store.insert(&token_record("live-acc", "live-ref")).await.unwrap();

        assert_eq!(store.purge_expired(Utc::now()).await.unwrap(), 1);
        assert!(store.get_by_access("stale-acc").await.unwrap().is_none());
        assert!(store.get_by_access("live-acc").await.unwrap().is_some());

        // Nothing left to purge on the second pass
        assert_eq!(store.purge_expired(Utc::now()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_remove_access_is_idempotent() {
        let store = MemoryTokenStore::new();
        store.insert(&token_record("acc", "ref")).await.unwrap();

        store.remove_access("acc").await.unwrap();
        store.remove_access("acc").await.unwrap();
        store.remove_access("never-existed").await.unwrap();
        assert!(store.get_by_access("acc").await.unwrap().is_none());
    }
}
