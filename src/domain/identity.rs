//! Users, authenticated identities and the authorization predicate
//!
//! Every admin-only or owner-only decision goes through
//! [`Identity::require_admin`] or [`Identity::authorize_for`].

use serde::{Deserialize, Serialize};

use super::error::DomainError;

pub const ADMIN_ONLY: &str = "Administrator users only.";

/// Registered library user (public view, no credentials)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub user_id: i64,
    pub username: String,
    pub user_email: String,
    pub is_admin: bool,
}

/// Caller resolved from a bearer credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: i64,
    pub username: String,
    pub is_admin: bool,
}

impl From<User> for Identity {
    fn from(user: User) -> Self {
        Self {
            user_id: user.user_id,
            username: user.username,
            is_admin: user.is_admin,
        }
    }
}

impl Identity {
    /// Fails with `Forbidden` unless the caller is an admin
    pub fn require_admin(&self) -> Result<(), DomainError> {
        if self.is_admin {
            Ok(())
        } else {
            Err(DomainError::forbidden(ADMIN_ONLY))
        }
    }

    /// True when the caller is `owner_id` or an admin
    pub fn can_act_for(&self, owner_id: i64) -> bool {
        self.is_admin || self.user_id == owner_id
    }

    /// Fails with `Forbidden(message)` unless [`Identity::can_act_for`] holds
    pub fn authorize_for(&self, owner_id: i64, message: &str) -> Result<(), DomainError> {
        if self.can_act_for(owner_id) {
            Ok(())
        } else {
            Err(DomainError::forbidden(message))
        }
    }
}
