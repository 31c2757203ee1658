//! Infrastructure layer: configuration and user persistence.

pub mod config;
pub mod users;

pub use config::{AppConfig, ConfigError};
pub use users::{InMemoryUserStore, PostgresUserStore, StoreHealth, UserStore, UserStoreError};
