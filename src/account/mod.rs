/// Account credential lifecycle
///
/// Request/response types for the lifecycle operations, plus the manager
/// that implements them.

mod manager;

pub use manager::AccountManager;

use crate::db::account::PublicUser;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Registration request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 32, message = "username must be 3-32 characters"))]
    pub username: String,
    #[validate(email(message = "invalid email address"))]
    pub email: String,
    #[validate(length(min = 6, max = 72, message = "password must be 6-72 characters"))]
    pub password: String,
    #[validate(length(min = 1, max = 128, message = "name is required"))]
    pub name: String,
}

/// Login request
#[derive(Debug, Clone, Deserialize)]
pub struct AuthenticateRequest {
    pub username: String,
    pub password: String,
}

/// Login response: public user info plus a bearer session token
#[derive(Debug, Clone, Serialize)]
pub struct AuthenticateResponse {
    pub success: bool,
    pub user: PublicUser,
    pub token: String,
}

/// Password reset request
#[derive(Debug, Clone, Deserialize)]
pub struct RequestPasswordResetRequest {
    pub email: String,
}

/// Password reset confirmation
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPasswordResetRequest {
    pub token: String,
    #[validate(length(min = 6, max = 72, message = "password must be 6-72 characters"))]
    pub new_password: String,
}

/// Generic acknowledgement
#[derive(Debug, Clone, Serialize)]
pub struct AckResponse {
    pub success: bool,
    pub message: String,
}

impl AckResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

/// Current-user response for the bearer-authenticated read
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub success: bool,
    pub user: PublicUser,
}
