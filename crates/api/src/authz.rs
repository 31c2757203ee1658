//! Route authorization against the policy enforcer.

use thiserror::Error;

use gatehouse_auth::{PolicyEnforcer, PolicyError};

use crate::context::PrincipalContext;

#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("{subject} may not {action} {object}")]
    Denied {
        subject: String,
        object: String,
        action: String,
    },

    #[error(transparent)]
    Policy(#[from] PolicyError),
}

/// Allow the request only if the policy grants `(username, path, method)`.
pub async fn authorize(
    policy: &PolicyEnforcer,
    principal: &PrincipalContext,
    path: &str,
    method: &str,
) -> Result<(), AuthzError> {
    let subject = principal.username();

    if policy.enforce(subject, path, method).await? {
        return Ok(());
    }

    tracing::info!(subject, object = path, action = method, "access denied");
    Err(AuthzError::Denied {
        subject: subject.to_string(),
        object: path.to_string(),
        action: method.to_string(),
    })
}
