//! Self-registration: validate, store, grant default access, issue a token.
//!
//! The user row, the role fact and the profile rule are written in that order.
//! If a later step fails, earlier writes are undone so a failed registration
//! leaves no user behind and the name can be registered again. Policy facts
//! that already existed before the attempt are left in place.

use chrono::{DateTime, Utc};
use thiserror::Error;

use gatehouse_auth::{
    CredentialError, NewUser, Password, PasswordError, PolicyError, TokenError, User, Username,
};
use gatehouse_infra::UserStoreError;

use crate::app::dto::RegisterRequest;
use crate::app::services::AppServices;

pub const PROFILE_PATH: &str = "/profile";
pub const PROFILE_ACTION: &str = "GET";

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("username already exists: {0}")]
    Conflict(String),

    #[error("user store failure: {0}")]
    Storage(String),

    #[error("password hashing failed: {0}")]
    Hashing(#[from] PasswordError),

    #[error("role assignment failed: {0}")]
    RoleAssignment(PolicyError),

    #[error("policy assignment failed: {0}")]
    PolicyAssignment(PolicyError),

    #[error("token signing failed: {0}")]
    Signing(#[from] TokenError),
}

impl From<CredentialError> for RegistrationError {
    fn from(value: CredentialError) -> Self {
        Self::Validation(value.to_string())
    }
}

impl From<UserStoreError> for RegistrationError {
    fn from(value: UserStoreError) -> Self {
        match value {
            UserStoreError::Conflict(username) => Self::Conflict(username),
            other => Self::Storage(other.to_string()),
        }
    }
}

/// A stored user plus the bearer token issued for them.
#[derive(Debug, Clone)]
pub struct Registered {
    pub user: User,
    pub token: String,
}

pub async fn register_user(
    services: &AppServices,
    request: RegisterRequest,
    now: DateTime<Utc>,
) -> Result<Registered, RegistrationError> {
    let username = Username::parse(&request.username)?;
    let password = Password::parse(&request.password)?;

    // Fast path; the store's own uniqueness check decides races.
    if services.users.find_by_username(username.as_str()).await?.is_some() {
        return Err(RegistrationError::Conflict(username.into_inner()));
    }

    let new_user = hash_off_thread(username, password, now).await?;
    let user = services.users.insert(new_user).await?;

    let mut granted = GrantedFacts::default();
    if let Err(err) = grant_default_access(services, &user, &mut granted).await {
        compensate(services, &user, granted).await;
        return Err(err);
    }

    let token = match services.tokens.issue(&user.username, now) {
        Ok(token) => token,
        Err(err) => {
            compensate(services, &user, granted).await;
            return Err(RegistrationError::Signing(err));
        }
    };

    tracing::info!(username = %user.username, user_id = %user.id, "user registered");
    Ok(Registered { user, token })
}

async fn hash_off_thread(
    username: Username,
    password: Password,
    now: DateTime<Utc>,
) -> Result<NewUser, RegistrationError> {
    let joined = tokio::task::spawn_blocking(move || NewUser::register(username, &password, now)).await;
    match joined {
        Ok(result) => Ok(result?),
        Err(e) => Err(RegistrationError::Hashing(PasswordError::Hash(e.to_string()))),
    }
}

/// Policy facts written by this registration, as opposed to ones that were
/// already present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct GrantedFacts {
    role: bool,
    profile: bool,
}

async fn grant_default_access(
    services: &AppServices,
    user: &User,
    granted: &mut GrantedFacts,
) -> Result<(), RegistrationError> {
    granted.role = services
        .policy
        .add_role_for_user(&user.username, &user.role)
        .await
        .map_err(RegistrationError::RoleAssignment)?;

    granted.profile = services
        .policy
        .add_policy(&user.username, PROFILE_PATH, PROFILE_ACTION)
        .await
        .map_err(RegistrationError::PolicyAssignment)?;

    Ok(())
}

/// Undo a partial registration. Failures here are logged, not returned.
async fn compensate(services: &AppServices, user: &User, granted: GrantedFacts) {
    if granted.profile {
        if let Err(e) = services
            .policy
            .remove_policy(&user.username, PROFILE_PATH, PROFILE_ACTION)
            .await
        {
            tracing::warn!(username = %user.username, error = %e, "failed to remove profile rule");
        }
    }
    if granted.role {
        if let Err(e) = services.policy.remove_role_for_user(&user.username, &user.role).await {
            tracing::warn!(username = %user.username, error = %e, "failed to remove role");
        }
    }
    if let Err(e) = services.users.delete(user.id).await {
        tracing::warn!(username = %user.username, error = %e, "failed to delete user");
    }
    tracing::info!(username = %user.username, "rolled back partial registration");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use gatehouse_auth::{Hs256Jwt, PolicyEnforcer, Role, TokenIssuer, verify_password};
    use gatehouse_infra::{InMemoryUserStore, UserStore};

    use super::*;

    fn request(username: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    struct FailingIssuer;

    impl TokenIssuer for FailingIssuer {
        fn issue(&self, _subject: &str, _now: DateTime<Utc>) -> Result<String, TokenError> {
            Err(TokenError::Sign(jsonwebtoken::errors::ErrorKind::InvalidKeyFormat.into()))
        }
    }

    #[tokio::test]
    async fn registers_user_with_default_access() {
        let services = AppServices::in_memory("test-secret").await.unwrap();
        let now = Utc::now();

        let registered = register_user(&services, request("alice", "hunter22"), now)
            .await
            .unwrap();

        assert_eq!(registered.user.username, "alice");
        assert_eq!(registered.user.role, Role::USER);
        assert!(verify_password("hunter22", &registered.user.password_hash).unwrap());

        let claims = services.jwt.validate(&registered.token, now).unwrap();
        assert_eq!(claims.sub, "alice");

        let policy = &services.policy;
        assert!(policy.enforce("alice", "/user", "GET").await.unwrap());
        assert!(policy.enforce("alice", "/profile", "GET").await.unwrap());
        assert!(!policy.enforce("alice", "/admin", "GET").await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_username_conflicts() {
        let services = AppServices::in_memory("test-secret").await.unwrap();
        register_user(&services, request("alice", "hunter22"), Utc::now())
            .await
            .unwrap();

        let err = register_user(&services, request("alice", "another1"), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, RegistrationError::Conflict(name) if name == "alice"));
    }

    #[tokio::test]
    async fn invalid_credentials_are_rejected_before_storage() {
        let services = AppServices::in_memory("test-secret").await.unwrap();

        for (username, password) in [("", "hunter22"), ("al", "hunter22"), ("alice", "short"), ("a,b", "hunter22")] {
            let err = register_user(&services, request(username, password), Utc::now())
                .await
                .unwrap_err();
            assert!(matches!(err, RegistrationError::Validation(_)), "{username}/{password}");
        }
        assert!(services.users.find_by_username("alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn signing_failure_rolls_back_user_and_policy() {
        let users = Arc::new(InMemoryUserStore::new());
        let policy = PolicyEnforcer::in_memory().await.unwrap();
        let jwt = Arc::new(Hs256Jwt::new("test-secret"));
        let services = AppServices {
            users: users.clone(),
            policy: policy.clone(),
            jwt,
            tokens: Arc::new(FailingIssuer),
        };

        let err = register_user(&services, request("alice", "hunter22"), Utc::now())
            .await
            .unwrap_err();

        assert!(matches!(err, RegistrationError::Signing(_)));
        assert!(users.is_empty());
        assert!(policy.roles_for_user("alice").await.is_empty());
        assert!(!policy.enforce("alice", "/profile", "GET").await.unwrap());
    }

    #[tokio::test]
    async fn rollback_keeps_facts_that_predate_the_attempt() {
        let users = Arc::new(InMemoryUserStore::new());
        let policy = PolicyEnforcer::in_memory().await.unwrap();
        policy.add_role_for_user("alice", &Role::USER).await.unwrap();
        policy.add_policy("alice", PROFILE_PATH, PROFILE_ACTION).await.unwrap();

        let services = AppServices {
            users: users.clone(),
            policy: policy.clone(),
            jwt: Arc::new(Hs256Jwt::new("test-secret")),
            tokens: Arc::new(FailingIssuer),
        };

        let err = register_user(&services, request("alice", "hunter22"), Utc::now())
            .await
            .unwrap_err();

        assert!(matches!(err, RegistrationError::Signing(_)));
        assert!(users.is_empty());
        assert_eq!(policy.roles_for_user("alice").await, vec!["user"]);
        assert!(policy.enforce("alice", PROFILE_PATH, PROFILE_ACTION).await.unwrap());
    }

    /// Services over a file-backed policy whose directory is then removed, so
    /// every policy write fails. `existing_member` is put in the user role first.
    async fn services_with_unwritable_policy(
        temp: &tempfile::TempDir,
        existing_member: Option<&str>,
    ) -> (AppServices, Arc<InMemoryUserStore>) {
        let dir = temp.path().join("policies");
        let policy = PolicyEnforcer::from_file(dir.join("policy.csv")).await.unwrap();
        if let Some(name) = existing_member {
            policy.add_role_for_user(name, &Role::USER).await.unwrap();
        }
        std::fs::remove_dir_all(&dir).unwrap();

        let users = Arc::new(InMemoryUserStore::new());
        let jwt = Arc::new(Hs256Jwt::new("test-secret"));
        let services = AppServices {
            users: users.clone(),
            policy,
            jwt: jwt.clone(),
            tokens: jwt,
        };
        (services, users)
    }

    #[tokio::test]
    async fn role_failure_rolls_back_user() {
        let temp = tempfile::tempdir().unwrap();
        let (services, users) = services_with_unwritable_policy(&temp, None).await;

        let err = register_user(&services, request("alice", "hunter22"), Utc::now())
            .await
            .unwrap_err();

        assert!(matches!(err, RegistrationError::RoleAssignment(_)));
        assert!(users.is_empty());
        assert!(services.policy.roles_for_user("alice").await.is_empty());
    }

    #[tokio::test]
    async fn profile_failure_rolls_back_user_and_keeps_existing_role() {
        let temp = tempfile::tempdir().unwrap();
        let (services, users) = services_with_unwritable_policy(&temp, Some("alice")).await;

        let err = register_user(&services, request("alice", "hunter22"), Utc::now())
            .await
            .unwrap_err();

        assert!(matches!(err, RegistrationError::PolicyAssignment(_)));
        assert!(users.is_empty());
        assert_eq!(services.policy.roles_for_user("alice").await, vec!["user"]);
        assert!(!services.policy.enforce("alice", PROFILE_PATH, PROFILE_ACTION).await.unwrap());
    }

    #[tokio::test]
    async fn name_is_reusable_after_rollback() {
        let users = Arc::new(InMemoryUserStore::new());
        let policy = PolicyEnforcer::in_memory().await.unwrap();
        let jwt = Arc::new(Hs256Jwt::new("test-secret"));

        let failing = AppServices {
            users: users.clone(),
            policy: policy.clone(),
            jwt: jwt.clone(),
            tokens: Arc::new(FailingIssuer),
        };
        register_user(&failing, request("alice", "hunter22"), Utc::now())
            .await
            .unwrap_err();

        let working = AppServices {
            users,
            policy,
            jwt: jwt.clone(),
            tokens: jwt,
        };
        let registered = register_user(&working, request("alice", "hunter22"), Utc::now())
            .await
            .unwrap();
        assert_eq!(registered.user.username, "alice");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_registrations_admit_one() {
        let services = Arc::new(AppServices::in_memory("test-secret").await.unwrap());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let services = services.clone();
                tokio::spawn(async move {
                    register_user(&services, request("racer", "hunter22"), Utc::now()).await
                })
            })
            .collect();

        let mut ok = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => ok += 1,
                Err(RegistrationError::Conflict(_)) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(ok, 1);
    }
}
