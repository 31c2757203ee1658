//! Casbin-backed route authorization.
//!
//! Requests are checked as `(subject, object, action)` where the subject is a
//! username, the object is the request path and the action is the HTTP method.
//! Users inherit the rules of their roles through `g` grouping facts:
//!
//! ```text
//! p, user, /user, GET
//! p, alice, /profile, GET
//! g, alice, user
//! ```
//!
//! Rules live either in memory or in a CSV policy file owned by casbin's
//! `FileAdapter`. The file is rewritten after every mutation.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use casbin::{CoreApi, DefaultModel, Enforcer, FileAdapter, MemoryAdapter, MgmtApi};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::Role;

#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("failed to load policy model: {0}")]
    ModelLoad(String),

    #[error("failed to load policy rules: {0}")]
    PolicyLoad(String),

    #[error("failed to save policy: {0}")]
    PolicySave(String),

    #[error("casbin error: {0}")]
    Casbin(#[from] casbin::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid policy component: {0}")]
    Validation(String),
}

const MAX_POLICY_COMPONENT_LEN: usize = 256;

/// Reject components that could corrupt the CSV policy file.
fn validate_policy_component(component: &str, name: &str) -> Result<(), PolicyError> {
    if component.is_empty() {
        return Err(PolicyError::Validation(format!("{name} is empty")));
    }
    if component.len() > MAX_POLICY_COMPONENT_LEN {
        return Err(PolicyError::Validation(format!(
            "{name} exceeds maximum length of {MAX_POLICY_COMPONENT_LEN} characters"
        )));
    }
    if component.contains('\0') {
        return Err(PolicyError::Validation(format!("{name} contains null byte")));
    }
    if component.contains('\n') || component.contains('\r') {
        return Err(PolicyError::Validation(format!("{name} contains line break")));
    }
    Ok(())
}

/// RBAC model with path patterns: `keyMatch` lets `/reports/*` cover subpaths.
pub const MODEL_CONF: &str = r#"[request_definition]
r = sub, obj, act

[policy_definition]
p = sub, obj, act

[role_definition]
g = _, _

[policy_effect]
e = some(where (p.eft == allow))

[matchers]
m = g(r.sub, p.sub) && keyMatch(r.obj, p.obj) && r.act == p.act
"#;

/// Rules every deployment starts with.
pub const SEED_POLICIES: &[(&str, &str, &str)] = &[
    ("admin", "/admin", "GET"),
    ("admin", "/user", "GET"),
    ("admin", "/profile", "GET"),
    ("user", "/user", "GET"),
];

fn seed_policy_csv() -> String {
    let mut csv = String::from("# p, subject, path, method\n# g, username, role\n");
    for (sub, obj, act) in SEED_POLICIES {
        csv.push_str(&format!("p, {sub}, {obj}, {act}\n"));
    }
    csv
}

fn rule(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

/// Shared handle to the casbin enforcer.
///
/// Reads (`enforce`) take a shared lock; rule mutations take the write lock.
#[derive(Clone)]
pub struct PolicyEnforcer {
    enforcer: Arc<RwLock<Enforcer>>,
    policy_file: Option<PathBuf>,
}

impl PolicyEnforcer {
    /// Enforcer with the seed rules, kept in memory only.
    pub async fn in_memory() -> Result<Self, PolicyError> {
        let model = DefaultModel::from_str(MODEL_CONF)
            .await
            .map_err(|e| PolicyError::ModelLoad(e.to_string()))?;

        let mut enforcer = Enforcer::new(model, MemoryAdapter::default())
            .await
            .map_err(|e| PolicyError::PolicyLoad(e.to_string()))?;

        let seeds = SEED_POLICIES
            .iter()
            .map(|(sub, obj, act)| rule(&[*sub, *obj, *act]))
            .collect();
        enforcer.add_policies(seeds).await?;

        Ok(Self {
            enforcer: Arc::new(RwLock::new(enforcer)),
            policy_file: None,
        })
    }

    /// Enforcer persisted to a CSV policy file.
    ///
    /// A missing file is created with the seed rules.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let path = path.as_ref().to_path_buf();

        if !path.exists() {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            info!(path = %path.display(), "creating policy file with seed rules");
            tokio::fs::write(&path, seed_policy_csv()).await?;
        }

        let model = DefaultModel::from_str(MODEL_CONF)
            .await
            .map_err(|e| PolicyError::ModelLoad(e.to_string()))?;

        let adapter = FileAdapter::new(path.to_string_lossy().to_string());
        let enforcer = Enforcer::new(model, adapter)
            .await
            .map_err(|e| PolicyError::PolicyLoad(e.to_string()))?;

        info!(
            path = %path.display(),
            rules = enforcer.get_policy().len(),
            groupings = enforcer.get_grouping_policy().len(),
            "policy enforcer loaded"
        );

        Ok(Self {
            enforcer: Arc::new(RwLock::new(enforcer)),
            policy_file: Some(path),
        })
    }

    pub fn policy_file(&self) -> Option<&Path> {
        self.policy_file.as_deref()
    }

    /// Decide whether `subject` may perform `action` on `object`.
    pub async fn enforce(&self, subject: &str, object: &str, action: &str) -> Result<bool, PolicyError> {
        let enforcer = self.enforcer.read().await;
        let allowed = enforcer.enforce((subject, object, action))?;
        debug!(subject, object, action, allowed, "policy check");
        Ok(allowed)
    }

    /// Add `p, subject, object, action`. Returns `false` if the rule already existed.
    ///
    /// If the policy file cannot be written the rule is taken back out, so the
    /// in-memory rules never run ahead of the file.
    pub async fn add_policy(&self, subject: &str, object: &str, action: &str) -> Result<bool, PolicyError> {
        validate_policy_component(subject, "subject")?;
        validate_policy_component(object, "object")?;
        validate_policy_component(action, "action")?;

        let fact = rule(&[subject, object, action]);
        let mut enforcer = self.enforcer.write().await;
        let added = enforcer.add_policy(fact.clone()).await?;
        if let Err(err) = self.persist(&mut enforcer, added).await {
            enforcer.remove_policy(fact).await?;
            return Err(err);
        }
        Ok(added)
    }

    pub async fn remove_policy(&self, subject: &str, object: &str, action: &str) -> Result<bool, PolicyError> {
        validate_policy_component(subject, "subject")?;
        validate_policy_component(object, "object")?;
        validate_policy_component(action, "action")?;

        let fact = rule(&[subject, object, action]);
        let mut enforcer = self.enforcer.write().await;
        let removed = enforcer.remove_policy(fact.clone()).await?;
        if let Err(err) = self.persist(&mut enforcer, removed).await {
            enforcer.add_policy(fact).await?;
            return Err(err);
        }
        Ok(removed)
    }

    /// Add `g, user, role`. Returns `false` if the grouping already existed.
    pub async fn add_role_for_user(&self, user: &str, role: &Role) -> Result<bool, PolicyError> {
        validate_policy_component(user, "user")?;
        validate_policy_component(role.as_str(), "role")?;

        let fact = rule(&[user, role.as_str()]);
        let mut enforcer = self.enforcer.write().await;
        let added = enforcer.add_grouping_policy(fact.clone()).await?;
        if let Err(err) = self.persist(&mut enforcer, added).await {
            enforcer.remove_grouping_policy(fact).await?;
            return Err(err);
        }
        Ok(added)
    }

    pub async fn remove_role_for_user(&self, user: &str, role: &Role) -> Result<bool, PolicyError> {
        validate_policy_component(user, "user")?;
        validate_policy_component(role.as_str(), "role")?;

        let fact = rule(&[user, role.as_str()]);
        let mut enforcer = self.enforcer.write().await;
        let removed = enforcer.remove_grouping_policy(fact.clone()).await?;
        if let Err(err) = self.persist(&mut enforcer, removed).await {
            enforcer.add_grouping_policy(fact).await?;
            return Err(err);
        }
        Ok(removed)
    }

    /// Roles directly assigned to `user` (no transitive expansion).
    pub async fn roles_for_user(&self, user: &str) -> Vec<String> {
        let enforcer = self.enforcer.read().await;
        enforcer
            .get_grouping_policy()
            .into_iter()
            .filter(|g| g.first().map(String::as_str) == Some(user))
            .filter_map(|g| g.get(1).cloned())
            .collect()
    }

    async fn persist(&self, enforcer: &mut Enforcer, changed: bool) -> Result<(), PolicyError> {
        if !changed || self.policy_file.is_none() {
            return Ok(());
        }
        enforcer.save_policy().await.map_err(|e| {
            warn!(error = %e, "failed to write policy file");
            PolicyError::PolicySave(e.to_string())
        })
    }
}

impl core::fmt::Debug for PolicyEnforcer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PolicyEnforcer")
            .field("policy_file", &self.policy_file)
            .finish_non_exhaustive()
    }
}
