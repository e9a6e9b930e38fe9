//! Endpoint logic of the identity service.
//!
//! Handlers resolve the caller with `UserContext::user_id` and delegate
//! here. Access to another user's record is limited to that user and admins.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use crate::auth::gate::AuthError;
use crate::auth::token::{TokenCodec, TokenError};
use crate::auth::user::User;
use crate::auth::user_store::{StoreError, UserRepository};
use crate::types::AccessToken;

/// Service-level errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    Auth(AuthError),
    /// The target user does not exist.
    NotFound(i64),
    Store(StoreError),
    Token(TokenError),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auth(e) => write!(f, "{}", e),
            Self::NotFound(id) => write!(f, "user {} not found", id),
            Self::Store(e) => write!(f, "{}", e),
            Self::Token(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        Self::Auth(err)
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl From<TokenError> for ServiceError {
    fn from(err: TokenError) -> Self {
        Self::Token(err)
    }
}

/// User operations over a repository and the token codec.
#[derive(Clone)]
pub struct UserService {
    repository: Arc<dyn UserRepository>,
    codec: Arc<TokenCodec>,
}

impl UserService {
    pub fn new(repository: Arc<dyn UserRepository>, codec: Arc<TokenCodec>) -> Self {
        Self { repository, codec }
    }

    pub fn repository(&self) -> &Arc<dyn UserRepository> {
        &self.repository
    }

    /// The caller's own record (zero record if it no longer exists).
    pub async fn me(&self, caller_id: i64) -> Result<User, ServiceError> {
        Ok(self.repository.get(caller_id).await?)
    }

    /// A user's record, for that user or an admin.
    pub async fn user(&self, caller_id: i64, user_id: i64) -> Result<User, ServiceError> {
        self.authorize(caller_id, user_id).await?;
        self.existing(user_id).await
    }

    /// Issue a fresh token for a user, for that user or an admin.
    pub async fn token(&self, caller_id: i64, user_id: i64) -> Result<AccessToken, ServiceError> {
        self.authorize(caller_id, user_id).await?;
        self.existing(user_id).await?;
        Ok(self.codec.encode(&user_id.to_string())?)
    }

    /// Record that `user_id` owns `paper_id`, granting read and write.
    pub async fn create_paper(
        &self,
        caller_id: i64,
        user_id: i64,
        paper_id: i64,
    ) -> Result<User, ServiceError> {
        self.authorize(caller_id, user_id).await?;
        let mut user = self.existing(user_id).await?;

        user.grant_ownership(paper_id);
        self.repository.upsert(&mut user).await?;

        info!(user_id, paper_id, "Registered paper ownership");
        Ok(user)
    }

    /// Add or remove a bookmark on the caller's record.
    pub async fn bookmark(
        &self,
        caller_id: i64,
        paper_id: i64,
        bookmark: bool,
    ) -> Result<User, ServiceError> {
        let mut user = self.existing(caller_id).await?;

        if user.set_bookmark(paper_id, bookmark) {
            self.repository.upsert(&mut user).await?;
            debug!(user_id = caller_id, paper_id, bookmark, "Updated bookmark");
        }
        Ok(user)
    }

    /// Return the user with this email, creating it if needed.
    pub async fn ensure_user(
        &self,
        name: &str,
        email: &str,
        is_admin: bool,
    ) -> Result<User, ServiceError> {
        let mut user = self.repository.get_by_email(email).await?;
        if !user.is_empty() && user.name == name && user.is_admin == is_admin {
            return Ok(user);
        }

        if user.is_empty() {
            user = User::new(name, email);
        }
        user.name = name.to_string();
        user.is_admin = is_admin;
        self.repository.upsert(&mut user).await?;

        info!(user_id = user.id, "Saved user");
        Ok(user)
    }

    async fn existing(&self, user_id: i64) -> Result<User, ServiceError> {
        let user = self.repository.get(user_id).await?;
        if user.is_empty() {
            return Err(ServiceError::NotFound(user_id));
        }
        Ok(user)
    }

    async fn authorize(&self, caller_id: i64, user_id: i64) -> Result<(), ServiceError> {
        if caller_id == user_id {
            return Ok(());
        }

        let caller = self.repository.get(caller_id).await?;
        if caller.is_admin {
            return Ok(());
        }

        let reason = format!("user {} cannot access user {}", caller_id, user_id);
        Err(AuthError::Forbidden(reason).into())
    }
}
