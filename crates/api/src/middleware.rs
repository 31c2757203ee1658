use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, Method, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use gatehouse_auth::{JwtValidator, PolicyEnforcer};

use crate::app::errors::json_error;
use crate::authz::{self, AuthzError};
use crate::context::PrincipalContext;

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
}

/// Require a valid bearer token and attach the principal to the request.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_bearer(req.headers())
        .ok_or_else(|| json_error(StatusCode::UNAUTHORIZED, "missing_token", "missing token"))?;

    let claims = state.jwt.validate(token, Utc::now()).map_err(|e| {
        tracing::debug!(error = %e, "rejected bearer token");
        json_error(StatusCode::UNAUTHORIZED, "invalid_token", "invalid token")
    })?;

    req.extensions_mut().insert(PrincipalContext::new(claims.sub));

    Ok(next.run(req).await)
}

/// Check `(username, path, method)` against the policy.
pub async fn authorize_middleware(
    State(policy): State<PolicyEnforcer>,
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let forbidden = || json_error(StatusCode::FORBIDDEN, "forbidden", "forbidden");

    let principal = req
        .extensions()
        .get::<PrincipalContext>()
        .cloned()
        .ok_or_else(forbidden)?;

    let path = req.uri().path().to_string();
    let method = policy_action(req.method()).to_string();

    match authz::authorize(&policy, &principal, &path, &method).await {
        Ok(()) => Ok(next.run(req).await),
        Err(AuthzError::Denied { .. }) => Err(forbidden()),
        Err(err @ AuthzError::Policy(_)) => {
            tracing::error!(error = %err, "policy evaluation failed");
            Err(forbidden())
        }
    }
}

/// The action a request is checked as. Routers answer `HEAD` with the `GET`
/// handler, so it needs the `GET` permission.
fn policy_action(method: &Method) -> &str {
    if method == Method::HEAD {
        "GET"
    } else {
        method.as_str()
    }
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?;
    let header = header.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();

    if token.is_empty() {
        return None;
    }
    Some(token)
}
