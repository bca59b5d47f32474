use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use tracing::warn;

use crate::{
    auth::{
        repo_types::User,
        tokens::{validate_token_plaintext, Scope},
    },
    error::{AppError, StoreError},
    state::AppState,
    validator::Validator,
};

/// Account behind a valid `Authorization: Bearer <token>` header.
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or(AppError::InvalidAuthToken)?;

        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .ok_or(AppError::InvalidAuthToken)?;

        let mut v = Validator::new();
        validate_token_plaintext(&mut v, token);
        if !v.valid() {
            warn!("malformed bearer token");
            return Err(AppError::InvalidAuthToken);
        }

        match state.users.get_for_token(Scope::Authentication, token).await {
            Ok(user) => Ok(AuthUser(user)),
            Err(StoreError::NotFound) => {
                warn!("invalid or expired bearer token");
                Err(AppError::InvalidAuthToken)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Activated account with the admin role.
pub struct AdminUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            warn!(user_id = user.id, role = %user.role, "admin route denied");
            return Err(AppError::Forbidden);
        }
        Ok(AdminUser(user))
    }
}
