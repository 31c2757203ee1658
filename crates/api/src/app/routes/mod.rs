//! HTTP handlers.

use axum::Router;
use axum::routing::get;

pub mod greetings;
pub mod register;
pub mod system;

/// Routes that sit behind authentication and authorization.
pub fn protected_router() -> Router {
    Router::new()
        .route("/admin", get(greetings::admin))
        .route("/user", get(greetings::user))
        .route("/profile", get(greetings::profile))
}
