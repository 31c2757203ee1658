use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;

use crate::app::dto::{RegisterRequest, RegisterResponse};
use crate::app::errors::{json_error, registration_error_to_response};
use crate::app::registration::{self, RegistrationError};
use crate::app::services::AppServices;

pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            return json_error(StatusCode::BAD_REQUEST, "validation_error", rejection.body_text());
        }
    };

    match registration::register_user(&services, request, Utc::now()).await {
        Ok(registered) => (StatusCode::OK, Json(RegisterResponse::new(registered.token))).into_response(),
        Err(err) => {
            match &err {
                RegistrationError::Validation(_) | RegistrationError::Conflict(_) => {
                    tracing::debug!(error = %err, "registration rejected");
                }
                _ => tracing::error!(error = %err, "registration failed"),
            }
            registration_error_to_response(err)
        }
    }
}
