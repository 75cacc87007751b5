//! Account management business rules: admin bootstrap, registration, login,
//! password reset.
//!
//! The service owns no storage of its own; it drives a [`UserDirectory`]
//! handle and the password [`Hasher`]. All operations are safe for
//! concurrent invocation - racing registrations of the same username are
//! serialized by the directory's uniqueness constraint, not by locking here.

use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

use crate::api::models::users::Role;
use crate::auth::password::Hasher;
use crate::errors::{Error, Result};
use crate::store::{StoreError, UserDirectory, UserRecord};

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserDirectory>,
    hasher: Hasher,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserDirectory>, hasher: Hasher) -> Self {
        Self { users, hasher }
    }

    /// Create the initial admin account. One-time: fails with
    /// [`Error::AdminAlreadyExists`] once any admin-role user exists.
    #[instrument(skip(self, password), err)]
    pub async fn bootstrap_admin(&self, username: &str, password: &str) -> Result<UserRecord> {
        if self.users.has_admin().await? {
            return Err(Error::AdminAlreadyExists);
        }
        self.create_user(username, password, Role::Admin).await
    }

    /// Create a new regular user account. Open registration, immediately active.
    #[instrument(skip(self, password), err)]
    pub async fn register(&self, username: &str, password: &str) -> Result<UserRecord> {
        if self.users.get_by_username(username).await?.is_some() {
            return Err(Error::UsernameTaken {
                username: username.to_string(),
            });
        }
        self.create_user(username, password, Role::User).await
    }

    /// Verify credentials and return the matching user.
    ///
    /// Fails with the same [`Error::InvalidCredential`] whether the username
    /// is unknown or the password is wrong; for the unknown-username case a
    /// hash is still computed so the two paths cost roughly the same.
    #[instrument(skip(self, password), err(level = "debug"))]
    pub async fn login(&self, username: &str, password: &str) -> Result<UserRecord> {
        let user = self.users.get_by_username(username).await?;

        let hasher = self.hasher;
        let password = password.to_string();
        match user {
            Some(user) => {
                let digest = user.password_hash.clone();
                let matches = tokio::task::spawn_blocking(move || hasher.verify(&password, &digest))
                    .await
                    .map_err(|e| Error::Internal {
                        operation: format!("join password verification task: {e}"),
                    })??;
                if matches { Ok(user) } else { Err(Error::InvalidCredential) }
            }
            None => {
                let _ = tokio::task::spawn_blocking(move || hasher.hash(&password)).await;
                Err(Error::InvalidCredential)
            }
        }
    }

    /// Change a user's password by username. Used by the admin CLI.
    #[instrument(skip(self, new_password), err)]
    pub async fn reset_password(&self, username: &str, new_password: &str) -> Result<()> {
        let user = self.users.get_by_username(username).await?.ok_or_else(|| Error::UserNotFound {
            username: username.to_string(),
        })?;
        let hash = self.hash_blocking(new_password).await?;
        self.users.update_password_hash(user.id, &hash).await?;
        Ok(())
    }

    /// Whether an admin account exists. Checked once at serve startup.
    pub async fn has_admin(&self) -> Result<bool> {
        Ok(self.users.has_admin().await?)
    }

    async fn create_user(&self, username: &str, password: &str, role: Role) -> Result<UserRecord> {
        let hash = self.hash_blocking(password).await?;
        let now = Utc::now();
        let user = UserRecord {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash: hash,
            role,
            created_at: now,
            updated_at: now,
        };
        // The uniqueness constraint catches registrations that raced past
        // the existence check above
        self.users.create_user(&user).await.map_err(|e| match e {
            StoreError::UniqueViolation { .. } => Error::UsernameTaken {
                username: username.to_string(),
            },
            other => Error::Store(other),
        })?;
        Ok(user)
    }

    /// Run the CPU-bound hash on a blocking thread so it doesn't stall the
    /// async runtime.
    async fn hash_blocking(&self, password: &str) -> Result<String> {
        let hasher = self.hasher;
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| Error::Internal {
                operation: format!("join password hashing task: {e}"),
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::fast_hasher;
    use crate::store::memory::MemoryUserDirectory;

    fn service() -> AuthService {
        AuthService::new(Arc::new(MemoryUserDirectory::new()), fast_hasher())
    }

    #[tokio::test]
    async fn test_bootstrap_admin_succeeds_exactly_once() {
        let svc = service();

        let admin = svc.bootstrap_admin("root", "correct horse").await.unwrap();
        assert_eq!(admin.role, Role::Admin);

        // A second bootstrap fails regardless of credentials
        let err = svc.bootstrap_admin("other", "battery staple").await.unwrap_err();
        assert!(matches!(err, Error::AdminAlreadyExists));
        assert!(svc.has_admin().await.unwrap());
    }

    #[tokio::test]
    async fn test_register_then_login_roundtrip() {
        let svc = service();

        let created = svc.register("alice", "password123").await.unwrap();
        assert_eq!(created.role, Role::User);

        let logged_in = svc.login("alice", "password123").await.unwrap();
        assert_eq!(logged_in.id, created.id);
    }

    #[tokio::test]
    async fn test_register_duplicate_username_rejected() {
        let svc = service();
        svc.register("alice", "password123").await.unwrap();

        let err = svc.register("alice", "different").await.unwrap_err();
        assert!(matches!(err, Error::UsernameTaken { .. }));
    }

    #[tokio::test]
    async fn test_login_failure_is_uniform() {
        let svc = service();
        svc.register("alice", "password123").await.unwrap();

        // Wrong password and unknown username produce the same error kind
        let wrong_password = svc.login("alice", "nope").await.unwrap_err();
        let unknown_user = svc.login("nobody", "password123").await.unwrap_err();
        assert!(matches!(wrong_password, Error::InvalidCredential));
        assert!(matches!(unknown_user, Error::InvalidCredential));
    }

    #[tokio::test]
    async fn test_reset_password_invalidates_old_credential() {
        let svc = service();
        svc.register("alice", "old-password").await.unwrap();

        svc.reset_password("alice", "new-password").await.unwrap();

        assert!(matches!(svc.login("alice", "old-password").await.unwrap_err(), Error::InvalidCredential));
        svc.login("alice", "new-password").await.unwrap();
    }

    #[tokio::test]
    async fn test_reset_password_unknown_user() {
        let svc = service();
        let err = svc.reset_password("ghost", "whatever").await.unwrap_err();
        assert!(matches!(err, Error::UserNotFound { .. }));
    }
}
