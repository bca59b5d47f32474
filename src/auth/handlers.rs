use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{
            ActivateRequest, LoginRequest, MessageEnvelope, RegisterRequest, TokenEnvelope,
            UpdateUserRequest, UserEnvelope, UsersEnvelope,
        },
        extractors::{AdminUser, AuthUser},
        services,
    },
    error::AppError,
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(register).get(list_users))
        .route("/users/activated", put(activate))
        .route("/users/me", get(get_me))
        .route(
            "/users/:id",
            get(show_user).put(edit_user).delete(delete_user),
        )
}

pub fn token_routes() -> Router<AppState> {
    Router::new().route("/tokens/authentication", post(create_authentication_token))
}

fn read_json<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

fn read_id(id: Result<Path<i64>, PathRejection>) -> Result<i64, AppError> {
    match id {
        Ok(Path(id)) if id >= 1 => Ok(id),
        _ => Err(AppError::NotFound),
    }
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, HeaderMap, Json<UserEnvelope>), AppError> {
    let payload = read_json(payload)?;
    let user = services::register_user(&state, payload).await?;

    let mut headers = HeaderMap::new();
    let location = HeaderValue::from_str(&format!("/v1/users/{}", user.id))
        .map_err(|e| AppError::Internal(e.into()))?;
    headers.insert(header::LOCATION, location);

    Ok((StatusCode::CREATED, headers, Json(UserEnvelope { user })))
}

#[instrument(skip(state, payload))]
pub async fn activate(
    State(state): State<AppState>,
    payload: Result<Json<ActivateRequest>, JsonRejection>,
) -> Result<Json<UserEnvelope>, AppError> {
    let payload = read_json(payload)?;
    let user = services::activate_user(&state, &payload.token).await?;
    Ok(Json(UserEnvelope { user }))
}

#[instrument(skip(state, payload))]
pub async fn create_authentication_token(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TokenEnvelope>), AppError> {
    let payload = read_json(payload)?;
    let issued = services::authenticate(&state, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(TokenEnvelope {
            authentication_token: issued,
        }),
    ))
}

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn get_me(AuthUser(user): AuthUser) -> Json<UserEnvelope> {
    Json(UserEnvelope { user })
}

#[instrument(skip_all, fields(admin_id = admin.id))]
pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
) -> Result<Json<UsersEnvelope>, AppError> {
    let users = services::list_users(&state).await?;
    Ok(Json(UsersEnvelope { users }))
}

#[instrument(skip_all, fields(admin_id = admin.id))]
pub async fn show_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<UserEnvelope>, AppError> {
    let id = read_id(id)?;
    let user = services::get_user(&state, id).await?;
    Ok(Json(UserEnvelope { user }))
}

#[instrument(skip_all, fields(admin_id = admin.id))]
pub async fn edit_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<UserEnvelope>, AppError> {
    let id = read_id(id)?;
    let payload = read_json(payload)?;
    let user = services::update_user(&state, id, payload).await?;
    Ok(Json(UserEnvelope { user }))
}

#[instrument(skip_all, fields(admin_id = admin.id))]
pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<MessageEnvelope>, AppError> {
    let id = read_id(id)?;
    services::delete_user(&state, id).await?;
    Ok(Json(MessageEnvelope {
        message: "user successfully deleted".into(),
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::Request,
        response::Response,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::{app::build_app, auth::repo_types::Role, mailer::LogMailer};

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn bearer_request(method: &str, uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(res: Response) -> Value {
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn registration(email: &str) -> Value {
        json!({
            "name": "Ada",
            "surname": "Lovelace",
            "email": email,
            "password": "0123456789"
        })
    }

    async fn login(app: &Router, email: &str) -> String {
        let res = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/v1/tokens/authentication",
                json!({ "email": email, "password": "0123456789" }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        body_json(res).await["authentication_token"]["token"]
            .as_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn register_returns_created_with_location() {
        let (state, _store) = AppState::fake(Arc::new(LogMailer));
        let app = build_app(state);

        let res = app
            .oneshot(json_request("POST", "/v1/users", registration("ada@example.com")))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        assert_eq!(res.headers()[header::LOCATION], "/v1/users/1");
        let body = body_json(res).await;
        assert_eq!(body["user"]["email"], "ada@example.com");
        assert_eq!(body["user"]["activated"], false);
        assert_eq!(body["user"]["version"], 1);
        assert!(body["user"].get("credential").is_none());
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let (state, _store) = AppState::fake(Arc::new(LogMailer));
        let app = build_app(state);
        let res = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/users")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{\"name\": "))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(res).await["error"].is_string());
    }

    #[tokio::test]
    async fn malformed_activation_token_is_unprocessable() {
        let (state, _store) = AppState::fake(Arc::new(LogMailer));
        let app = build_app(state);
        let res = app
            .oneshot(json_request(
                "PUT",
                "/v1/users/activated",
                json!({ "token": "abc" }),
            ))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(res).await["error"]["token"], "must be 43 bytes long");
    }

    #[tokio::test]
    async fn me_requires_a_valid_bearer_token() {
        let (state, _store) = AppState::fake(Arc::new(LogMailer));
        let app = build_app(state);
        app.clone()
            .oneshot(json_request("POST", "/v1/users", registration("ada@example.com")))
            .await
            .unwrap();

        let res = app
            .clone()
            .oneshot(bearer_request("GET", "/v1/users/me", &"x".repeat(43)))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(res.headers()[header::WWW_AUTHENTICATE], "Bearer");

        let token = login(&app, "ada@example.com").await;
        let res = app
            .oneshot(bearer_request("GET", "/v1/users/me", &token))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await["user"]["email"], "ada@example.com");
    }

    #[tokio::test]
    async fn admin_routes_reject_regular_accounts() {
        let (state, _store) = AppState::fake(Arc::new(LogMailer));
        let app = build_app(state);
        app.clone()
            .oneshot(json_request("POST", "/v1/users", registration("ada@example.com")))
            .await
            .unwrap();
        let token = login(&app, "ada@example.com").await;

        let res = app
            .clone()
            .oneshot(bearer_request("GET", "/v1/users", &token))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);

        let res = app
            .oneshot(Request::get("/v1/users/1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn admin_can_manage_users() {
        let (state, _store) = AppState::fake(Arc::new(LogMailer));
        let app = build_app(state.clone());
        for email in ["admin@example.com", "grace@example.com"] {
            app.clone()
                .oneshot(json_request("POST", "/v1/users", registration(email)))
                .await
                .unwrap();
        }
        let mut admin = state.users.get_by_email("admin@example.com").await.unwrap();
        admin.role = Role::Admin;
        admin.activated = true;
        state.users.update(&mut admin).await.unwrap();
        let token = login(&app, "admin@example.com").await;

        let res = app
            .clone()
            .oneshot(bearer_request("GET", "/v1/users", &token))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await["users"].as_array().unwrap().len(), 2);

        let mut edit = json_request("PUT", "/v1/users/2", json!({ "surname": "Hopper", "version": 1 }));
        edit.headers_mut().insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        let res = app.clone().oneshot(edit).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = body_json(res).await;
        assert_eq!(body["user"]["surname"], "Hopper");
        assert_eq!(body["user"]["version"], 2);

        let mut stale = json_request("PUT", "/v1/users/2", json!({ "surname": "Late", "version": 1 }));
        stale.headers_mut().insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        let res = app.clone().oneshot(stale).await.unwrap();
        assert_eq!(res.status(), StatusCode::CONFLICT);

        let res = app
            .clone()
            .oneshot(bearer_request("GET", "/v1/users/abc", &token))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let res = app
            .clone()
            .oneshot(bearer_request("DELETE", "/v1/users/2", &token))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await["message"], "user successfully deleted");

        let res = app
            .oneshot(bearer_request("DELETE", "/v1/users/2", &token))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }
}
