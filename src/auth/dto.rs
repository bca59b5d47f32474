use serde::{Deserialize, Serialize};

use crate::auth::{repo_types::Role, repo_types::User, tokens::IssuedToken};

/// Request body for account registration.
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    #[serde(default)]
    pub surname: String,
    pub email: String,
    pub password: String,
}

/// Request body for account activation.
#[derive(Deserialize)]
pub struct ActivateRequest {
    pub token: String,
}

/// Request body for issuing an authentication token.
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Partial update of an account. `version`, when given, must match the stored one.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub surname: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub activated: Option<bool>,
    pub version: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct UserEnvelope {
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct UsersEnvelope {
    pub users: Vec<User>,
}

#[derive(Debug, Serialize)]
pub struct TokenEnvelope {
    pub authentication_token: IssuedToken,
}

#[derive(Debug, Serialize)]
pub struct MessageEnvelope {
    pub message: String,
}
