use std::sync::Arc;

use anyhow::Context;
use chrono::Duration;

use gatehouse_auth::{Hs256Jwt, JwtValidator, PolicyEnforcer, PolicyError, Role, TokenIssuer, Username};
use gatehouse_infra::{AppConfig, InMemoryUserStore, PostgresUserStore, UserStore};

/// Everything request handlers need, shared behind an `Arc`.
#[derive(Clone)]
pub struct AppServices {
    pub users: Arc<dyn UserStore>,
    pub policy: PolicyEnforcer,
    pub jwt: Arc<dyn JwtValidator>,
    pub tokens: Arc<dyn TokenIssuer>,
}

impl AppServices {
    /// Wire services around one HS256 key used for both signing and validation.
    pub fn new(users: Arc<dyn UserStore>, policy: PolicyEnforcer, jwt: Hs256Jwt) -> Self {
        let jwt = Arc::new(jwt);
        Self {
            users,
            policy,
            jwt: jwt.clone(),
            tokens: jwt,
        }
    }

    /// In-memory users and policy with the seed rules loaded.
    pub async fn in_memory(jwt_secret: impl AsRef<[u8]>) -> Result<Self, PolicyError> {
        Ok(Self::new(
            Arc::new(InMemoryUserStore::new()),
            PolicyEnforcer::in_memory().await?,
            Hs256Jwt::new(jwt_secret),
        ))
    }
}

impl core::fmt::Debug for AppServices {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AppServices")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Build services from configuration.
///
/// Postgres is used when `database.url` is set, a CSV policy file when
/// `policy.file` is set; otherwise both live in memory.
pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    let users: Arc<dyn UserStore> = match config.database.url.as_deref() {
        Some(url) => {
            let store = PostgresUserStore::connect(url, config.database.max_connections)
                .await
                .context("connecting to postgres")?;
            tracing::info!("using postgres user store");
            Arc::new(store)
        }
        None => {
            tracing::warn!("database.url not set; users are kept in memory");
            Arc::new(InMemoryUserStore::new())
        }
    };

    let policy = match config.policy.file.as_deref() {
        Some(path) => {
            let policy = PolicyEnforcer::from_file(path)
                .await
                .with_context(|| format!("loading policy file {}", path.display()))?;
            tracing::info!(path = %path.display(), "using file-backed policy");
            policy
        }
        None => PolicyEnforcer::in_memory()
            .await
            .context("building in-memory policy")?,
    };

    grant_bootstrap_admins(&policy, &config.policy.bootstrap_admins).await?;

    let jwt = Hs256Jwt::with_ttl(
        config.auth.jwt_secret(),
        Duration::seconds(config.auth.token_ttl_secs),
    );

    Ok(AppServices::new(users, policy, jwt))
}

/// Grant the admin role to each configured username. Already-granted names are left alone.
pub async fn grant_bootstrap_admins(policy: &PolicyEnforcer, admins: &[String]) -> anyhow::Result<()> {
    for admin in admins {
        let username = Username::parse(admin)
            .with_context(|| format!("invalid bootstrap admin username '{admin}'"))?;

        let added = policy
            .add_role_for_user(username.as_str(), &Role::ADMIN)
            .await
            .with_context(|| format!("granting admin role to '{admin}'"))?;
        if added {
            tracing::info!(username = %username, "granted admin role");
        }
    }
    Ok(())
}
