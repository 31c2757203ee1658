//! User persistence boundary.
//!
//! The registration flow only needs four things from storage: a lookup by
//! username, an insert that enforces username uniqueness atomically, a delete
//! used to undo a half-finished registration, and a health probe.

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use gatehouse_auth::{NewUser, User};
use gatehouse_core::UserId;

pub use in_memory::InMemoryUserStore;
pub use postgres::PostgresUserStore;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UserStoreError {
    /// The username is already taken.
    #[error("username already exists: {0}")]
    Conflict(String),

    #[error("user not found")]
    NotFound,

    /// Connectivity, query or lock failure.
    #[error("storage error: {0}")]
    Storage(String),
}

/// Snapshot returned by `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreHealth {
    /// `"up"` or `"down"`.
    pub status: &'static str,
    /// `"memory"` or `"postgres"`.
    pub backend: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_connections: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_connections: Option<usize>,
}

impl StoreHealth {
    pub fn is_up(&self) -> bool {
        self.status == "up"
    }
}

/// Username-keyed user storage.
///
/// Implementations must make `insert` atomic with respect to username
/// uniqueness: of two concurrent inserts for the same name, exactly one
/// succeeds and the other returns [`UserStoreError::Conflict`].
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, UserStoreError>;

    async fn insert(&self, user: NewUser) -> Result<User, UserStoreError>;

    /// Remove a user by id. Returns `NotFound` if no such row exists.
    async fn delete(&self, id: UserId) -> Result<(), UserStoreError>;

    async fn health(&self) -> StoreHealth;
}

#[async_trait]
impl<S> UserStore for Arc<S>
where
    S: UserStore + ?Sized,
{
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, UserStoreError> {
        (**self).find_by_username(username).await
    }

    async fn insert(&self, user: NewUser) -> Result<User, UserStoreError> {
        (**self).insert(user).await
    }

    async fn delete(&self, id: UserId) -> Result<(), UserStoreError> {
        (**self).delete(id).await
    }

    async fn health(&self) -> StoreHealth {
        (**self).health().await
    }
}
