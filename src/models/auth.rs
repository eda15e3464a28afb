//! Authentication-related models

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{non_blank, user::UserResponse};

/// Registration request, sent as JSON or as a browser form
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[serde(default)]
    #[validate(custom(function = "non_blank", message = "Missing First Name"))]
    pub first_name: String,

    #[serde(default)]
    pub middle_name: Option<String>,

    #[serde(default)]
    #[validate(custom(function = "non_blank", message = "Missing Last Name"))]
    pub last_name: String,

    #[serde(default)]
    #[validate(
        custom(function = "non_blank", message = "Missing Email"),
        length(max = 254, message = "email must be at most 254 characters")
    )]
    pub email: String,

    /// Length policy is checked against configuration by the account service
    #[serde(default)]
    pub password: String,
}

/// Registration form's email availability check
#[derive(Debug, Deserialize, Validate)]
pub struct EmailCheckRequest {
    #[serde(default)]
    #[validate(custom(function = "non_blank", message = "Missing Email"))]
    pub email: String,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[serde(default)]
    #[validate(custom(function = "non_blank", message = "Missing Email"))]
    pub email: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "Missing Password"))]
    pub password: String,
}

/// Account update; omitted or blank fields are left unchanged
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateUserRequest {
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,

    #[validate(length(max = 254, message = "email must be at most 254 characters"))]
    pub email: Option<String>,

    pub password: Option<String>,
}

/// Register/login response
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub access_token: String,
    pub refresh_token: String,
}

/// Token refresh response
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
}

/// Query parameters on the OAuth callback
#[derive(Debug, Deserialize)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}
