use std::any::Any;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use crate::{auth::password::CredentialError, validator::FieldErrors};

/// Failures reported by the user and token stores.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("duplicate email")]
    DuplicateEmail,
    #[error("edit conflict")]
    EditConflict,
    #[error("storage operation timed out")]
    Timeout,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Corrupt(#[from] anyhow::Error),
}

/// Errors at the workflow boundary, each mapped to one HTTP response.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("failed validation")]
    Validation(FieldErrors),
    #[error("resource not found")]
    NotFound,
    #[error("edit conflict")]
    EditConflict,
    #[error("invalid authentication credentials")]
    InvalidCredentials,
    #[error("invalid or missing authentication token")]
    InvalidAuthToken,
    #[error("forbidden")]
    Forbidden,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn field(key: &str, message: &str) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(key.to_string(), message.to_string());
        AppError::Validation(errors)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AppError::NotFound,
            StoreError::EditConflict => AppError::EditConflict,
            StoreError::DuplicateEmail => {
                AppError::field("email", "a user with this email already exists")
            }
            other => AppError::Internal(anyhow::Error::new(other)),
        }
    }
}

impl From<CredentialError> for AppError {
    fn from(err: CredentialError) -> Self {
        AppError::Internal(anyhow::Error::new(err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::Validation(errors) => {
                (StatusCode::UNPROCESSABLE_ENTITY, json!({ "error": errors }))
            }
            AppError::NotFound => (
                StatusCode::NOT_FOUND,
                json!({ "error": "the requested resource could not be found" }),
            ),
            AppError::EditConflict => (
                StatusCode::CONFLICT,
                json!({ "error": "unable to update the record due to an edit conflict, please try again" }),
            ),
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                json!({ "error": "invalid authentication credentials" }),
            ),
            AppError::InvalidAuthToken => {
                let mut res = (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({ "error": "invalid or missing authentication token" })),
                )
                    .into_response();
                res.headers_mut()
                    .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
                return res;
            }
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                json!({ "error": "your user account doesn't have the necessary permissions to access this resource" }),
            ),
            AppError::Internal(e) => {
                error!(error = ?e, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "the server encountered a problem and could not process your request" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

/// Response for a handler that panicked: logged, then reported as an opaque 500.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    AppError::Internal(anyhow::anyhow!("handler panicked: {detail}")).into_response()
}
