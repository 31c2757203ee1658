use axum::{Json, extract::Extension};

use crate::app::dto::MessageResponse;
use crate::context::PrincipalContext;

pub async fn admin() -> Json<MessageResponse> {
    Json(MessageResponse::new("Hello Admin!"))
}

pub async fn user() -> Json<MessageResponse> {
    Json(MessageResponse::new("Hello User!"))
}

pub async fn profile(Extension(principal): Extension<PrincipalContext>) -> Json<MessageResponse> {
    Json(MessageResponse::new(format!("Hello {}", principal.username())))
}
