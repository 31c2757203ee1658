//! Postgres-backed user store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | UserStoreError |
//! |------------|-----------------------|----------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (other) | any other | `Storage` |
//! | PoolClosed / Io / other | N/A | `Storage` |
//!
//! Username uniqueness is enforced by the `UNIQUE` constraint, so two racing
//! registrations for one name resolve to one insert and one `Conflict`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use gatehouse_auth::{NewUser, Role, User};
use gatehouse_core::UserId;

use super::{StoreHealth, UserStore, UserStoreError};

const CREATE_USERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id            UUID PRIMARY KEY,
    username      TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    role          TEXT NOT NULL DEFAULT 'user',
    created_at    TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT users_username_key UNIQUE (username)
)
"#;

#[derive(Debug)]
struct UserRow {
    id: Uuid,
    username: String,
    password_hash: String,
    role: String,
    created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for UserRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(UserRow {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            password_hash: row.try_get("password_hash")?,
            role: row.try_get("role")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: UserId::from_uuid(row.id),
            username: row.username,
            password_hash: row.password_hash,
            role: Role::new(row.role),
            created_at: row.created_at,
        }
    }
}

/// User store on a shared SQLx connection pool.
#[derive(Debug, Clone)]
pub struct PostgresUserStore {
    pool: Arc<PgPool>,
}

impl PostgresUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Connect to `url` and make sure the `users` table exists.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, UserStoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        let store = Self::new(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Create the `users` table if it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), UserStoreError> {
        sqlx::query(CREATE_USERS_TABLE)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }
}

#[async_trait]
impl UserStore for PostgresUserStore {
    #[instrument(skip(self), err)]
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, UserStoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, username, password_hash, role, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_by_username", e))?;

        Ok(row.map(User::from))
    }

    #[instrument(skip(self, user), fields(username = %user.username), err)]
    async fn insert(&self, user: NewUser) -> Result<User, UserStoreError> {
        let username = user.username.as_str().to_string();

        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (id, username, password_hash, role, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, username, password_hash, role, created_at
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&username)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.created_at)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| match map_sqlx_error("insert", e) {
            UserStoreError::Conflict(_) => UserStoreError::Conflict(username.clone()),
            other => other,
        })?;

        Ok(row.into())
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn delete(&self, id: UserId) -> Result<(), UserStoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete", e))?;

        if result.rows_affected() == 0 {
            return Err(UserStoreError::NotFound);
        }
        Ok(())
    }

    async fn health(&self) -> StoreHealth {
        let open_connections = Some(self.pool.size());
        let idle_connections = Some(self.pool.num_idle());

        match sqlx::query("SELECT 1").execute(&*self.pool).await {
            Ok(_) => StoreHealth {
                status: "up",
                backend: "postgres",
                message: "It's healthy".to_string(),
                open_connections,
                idle_connections,
            },
            Err(e) => {
                tracing::warn!(error = %e, "database health check failed");
                StoreHealth {
                    status: "down",
                    backend: "postgres",
                    message: format!("db down: {e}"),
                    open_connections,
                    idle_connections,
                }
            }
        }
    }
}

/// Map SQLx errors to user store errors.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> UserStoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            if db_err.code().as_deref() == Some("23505") {
                UserStoreError::Conflict(db_err.message().to_string())
            } else {
                UserStoreError::Storage(format!("database error in {operation}: {}", db_err.message()))
            }
        }
        sqlx::Error::PoolClosed => {
            UserStoreError::Storage(format!("connection pool closed in {operation}"))
        }
        _ => UserStoreError::Storage(format!("sqlx error in {operation}: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_closed_maps_to_storage() {
        let err = map_sqlx_error("insert", sqlx::Error::PoolClosed);
        assert_eq!(
            err,
            UserStoreError::Storage("connection pool closed in insert".to_string())
        );
    }

    #[test]
    fn row_not_found_maps_to_storage() {
        let err = map_sqlx_error("find_by_username", sqlx::Error::RowNotFound);
        assert!(matches!(err, UserStoreError::Storage(msg) if msg.contains("find_by_username")));
    }

    #[test]
    fn schema_enforces_unique_usernames() {
        assert!(CREATE_USERS_TABLE.contains("UNIQUE (username)"));
    }
}
