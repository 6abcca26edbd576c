//! Access control
//!
//! Registration, password login and bearer-token resolution. Authorization
//! decisions themselves live on [`Identity`].

pub mod password;
pub mod token;

use std::sync::Arc;

use chrono::Duration;
use serde::Serialize;

use crate::clock::Clock;
use crate::domain::{DomainError, Identity, User};
use crate::store::{NewUser, Store, StoreError};

pub use password::{hash_password, verify_password, PasswordError};
pub use token::{generate_token, hash_token, parse_bearer};

/// Access control errors
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Incorrect username or password")]
    InvalidCredentials,

    #[error("Could not validate credentials")]
    InvalidToken,

    #[error("Username already taken.")]
    UsernameTaken,

    #[error("Email already registered.")]
    EmailTaken,

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(field) if field == "username" => AuthError::UsernameTaken,
            StoreError::Duplicate(field) if field == "user_email" => AuthError::EmailTaken,
            other => AuthError::Store(other),
        }
    }
}

/// Registration request
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub user_email: String,
    pub password: String,
}

impl Registration {
    pub fn validate(&self) -> Result<(), DomainError> {
        for (field, value) in [
            ("username", &self.username),
            ("user_email", &self.user_email),
            ("password", &self.password),
        ] {
            if value.trim().is_empty() {
                return Err(DomainError::InvalidInput(format!("{} must not be empty", field)));
            }
        }
        Ok(())
    }
}

/// Issued bearer token
#[derive(Debug, Clone, Serialize)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: &'static str,
    #[serde(skip)]
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

/// Credential checks backed by the store
#[derive(Clone)]
pub struct AccessControl {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    token_ttl: Duration,
}

impl AccessControl {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, token_ttl: Duration) -> Self {
        Self {
            store,
            clock,
            token_ttl,
        }
    }

    /// Create a regular (non-admin) user
    pub async fn register(&self, registration: Registration) -> Result<User, AuthError> {
        registration.validate()?;
        let hashed_password = hash_password(&registration.password)?;

        let user = self
            .store
            .create_user(NewUser {
                username: registration.username.trim().to_string(),
                user_email: registration.user_email.trim().to_string(),
                hashed_password,
                is_admin: false,
            })
            .await?;

        tracing::info!(user_id = user.user_id, username = %user.username, "User registered");
        Ok(user)
    }

    /// `None` when the user is unknown or the password does not match.
    /// The username is trimmed the same way `register` stores it.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<Identity>, AuthError> {
        let Some(credentials) = self.store.find_credentials(username.trim()).await? else {
            return Ok(None);
        };

        if !verify_password(password, &credentials.hashed_password) {
            return Ok(None);
        }

        Ok(Some(Identity::from(credentials.user)))
    }

    /// Password login followed by token issuance
    pub async fn login(&self, username: &str, password: &str) -> Result<AccessToken, AuthError> {
        let identity = self
            .authenticate(username, password)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;
        self.issue_token(&identity).await
    }

    /// Persist the digest of a fresh token and hand the raw token back
    pub async fn issue_token(&self, identity: &Identity) -> Result<AccessToken, AuthError> {
        let raw = generate_token();
        let expires_at = self.clock.now() + self.token_ttl;

        self.store
            .save_token(&hash_token(&raw), identity.user_id, expires_at)
            .await?;

        tracing::debug!(user_id = identity.user_id, %expires_at, "Access token issued");

        Ok(AccessToken {
            access_token: raw,
            token_type: "bearer",
            expires_at,
        })
    }

    /// Resolve a raw bearer token to the caller
    pub async fn current_identity(&self, credential: &str) -> Result<Identity, AuthError> {
        let user = self
            .store
            .find_token_user(&hash_token(credential), self.clock.now())
            .await?
            .ok_or(AuthError::InvalidToken)?;
        Ok(Identity::from(user))
    }
}
