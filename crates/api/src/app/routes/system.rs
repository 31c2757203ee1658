use std::sync::Arc;

use axum::{Json, extract::Extension};

use gatehouse_infra::StoreHealth;

use crate::app::dto::MessageResponse;
use crate::app::services::AppServices;

pub async fn hello() -> Json<MessageResponse> {
    Json(MessageResponse::new("Hello World"))
}

/// Always 200; the store's status is reported in the body.
pub async fn health(Extension(services): Extension<Arc<AppServices>>) -> Json<StoreHealth> {
    let health = services.users.health().await;
    if !health.is_up() {
        tracing::warn!(backend = health.backend, message = %health.message, "user store unhealthy");
    }
    Json(health)
}
