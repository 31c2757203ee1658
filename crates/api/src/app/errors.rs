use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::app::registration::RegistrationError;

pub fn registration_error_to_response(err: RegistrationError) -> Response {
    match err {
        RegistrationError::Validation(msg) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        RegistrationError::Conflict(_) => {
            json_error(StatusCode::CONFLICT, "conflict", "Username already exists")
        }
        RegistrationError::Storage(_) | RegistrationError::Hashing(_) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "store_error",
            "Failed to create user",
        ),
        RegistrationError::RoleAssignment(_) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "policy_error",
            "Failed to assign role",
        ),
        RegistrationError::PolicyAssignment(_) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "policy_error",
            "Failed to assign policy",
        ),
        RegistrationError::Signing(_) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "signing_error",
            "Failed to sign token",
        ),
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
