use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use gatehouse_auth::{NewUser, User};
use gatehouse_core::UserId;

use super::{StoreHealth, UserStore, UserStoreError};

/// In-memory user store keyed by username.
///
/// Intended for tests/dev. The existence check and the insert happen under one
/// write lock, so duplicate registrations cannot both succeed.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<String, User>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.read().map(|u| u.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> UserStoreError {
    UserStoreError::Storage("lock poisoned".to_string())
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, UserStoreError> {
        let users = self.users.read().map_err(|_| poisoned())?;
        Ok(users.get(username).cloned())
    }

    async fn insert(&self, user: NewUser) -> Result<User, UserStoreError> {
        let mut users = self.users.write().map_err(|_| poisoned())?;

        let username = user.username.as_str().to_string();
        if users.contains_key(&username) {
            return Err(UserStoreError::Conflict(username));
        }

        let user = user.into_user();
        users.insert(username, user.clone());
        Ok(user)
    }

    async fn delete(&self, id: UserId) -> Result<(), UserStoreError> {
        let mut users = self.users.write().map_err(|_| poisoned())?;

        let username = users
            .iter()
            .find(|(_, u)| u.id == id)
            .map(|(name, _)| name.clone())
            .ok_or(UserStoreError::NotFound)?;
        users.remove(&username);
        Ok(())
    }

    async fn health(&self) -> StoreHealth {
        match self.users.read() {
            Ok(users) => StoreHealth {
                status: "up",
                backend: "memory",
                message: format!("{} users", users.len()),
                open_connections: None,
                idle_connections: None,
            },
            Err(_) => StoreHealth {
                status: "down",
                backend: "memory",
                message: "lock poisoned".to_string(),
                open_connections: None,
                idle_connections: None,
            },
        }
    }
}
