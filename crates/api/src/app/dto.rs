use serde::{Deserialize, Serialize};

/// `POST /register` body. Missing fields deserialize as empty strings so they
/// surface as validation errors rather than JSON rejections.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub message: String,
    pub token: String,
}

impl RegisterResponse {
    pub fn new(token: String) -> Self {
        Self {
            message: "User registered successfully".to_string(),
            token,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
