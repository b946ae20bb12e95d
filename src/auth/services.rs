use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::{
    password::{hash_password_blocking, verify_password_blocking, PasswordError},
    repo::{RepoError, UserRepository},
    repo_types::{User, UserFilter},
};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Password(#[from] PasswordError),
    #[error(transparent)]
    Repository(#[from] RepoError),
    #[error("username is already registered")]
    UsernameTaken,
}

/// Registration, login and identity lookup over a user store.
#[async_trait]
pub trait AuthService: Send + Sync {
    async fn register(&self, name: &str, username: &str, password: &str)
        -> Result<User, AuthError>;

    /// `Ok(None)` both for an unknown username and for a wrong password.
    async fn login(&self, username: &str, password: &str) -> Result<Option<User>, AuthError>;

    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError>;
}

pub struct UserAuthService {
    users: Arc<dyn UserRepository>,
    unique_usernames: bool,
    /// Verified against when a username has no candidates, so that an
    /// unknown username costs one Argon2 run like a wrong password does.
    dummy_hash: OnceCell<String>,
}

impl UserAuthService {
    pub fn new(users: Arc<dyn UserRepository>) -> Self {
        Self {
            users,
            unique_usernames: false,
            dummy_hash: OnceCell::new(),
        }
    }

    /// Reject a registration whose username is already stored.
    ///
    /// The check and the insert are separate store calls, so two concurrent
    /// registrations of one username can still both succeed.
    pub fn with_unique_usernames(mut self, enabled: bool) -> Self {
        self.unique_usernames = enabled;
        self
    }
}

#[async_trait]
impl AuthService for UserAuthService {
    #[instrument(skip(self, password))]
    async fn register(
        &self,
        name: &str,
        username: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        if self.unique_usernames {
            let existing = self.users.get_all(&UserFilter::by_username(username)).await?;
            if !existing.is_empty() {
                warn!(%username, "username already registered");
                return Err(AuthError::UsernameTaken);
            }
        }

        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
            username: username.to_string(),
            hashed_password: hash_password_blocking(password.to_string()).await?,
        };
        let user = self.users.add_one(user).await?;

        info!(user_id = %user.id, username = %user.username, "user registered");
        Ok(user)
    }

    #[instrument(skip(self, password))]
    async fn login(&self, username: &str, password: &str) -> Result<Option<User>, AuthError> {
        let candidates = self.users.get_all(&UserFilter::by_username(username)).await?;
        if candidates.is_empty() {
            let dummy = self
                .dummy_hash
                .get_or_try_init(|| hash_password_blocking("dummy-password".into()))
                .await?;
            verify_password_blocking(password.to_string(), dummy.clone()).await?;
        }
        for user in candidates {
            if verify_password_blocking(password.to_string(), user.hashed_password.clone()).await? {
                info!(user_id = %user.id, "user logged in");
                return Ok(Some(user));
            }
        }
        warn!(%username, "login failed");
        Ok(None)
    }

    #[instrument(skip(self))]
    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError> {
        Ok(self.users.get_one(id).await?)
    }
}
