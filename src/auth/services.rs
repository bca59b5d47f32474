use std::time::Duration;

use tracing::{error, info, warn};

use crate::{
    auth::{
        dto::{LoginRequest, RegisterRequest, UpdateUserRequest},
        password::Credential,
        repo_types::User,
        tokens::{validate_token_plaintext, AuthToken, IssuedToken, Scope},
    },
    error::{AppError, StoreError},
    mailer::ActivationEmail,
    state::AppState,
    validator::{is_valid_email, normalize_email, Validator},
};

pub fn validate_email(v: &mut Validator, email: &str) {
    v.check(!email.is_empty(), "email", "must be provided");
    v.check(is_valid_email(email), "email", "must be a valid email address");
}

/// Bounds are in bytes, not characters.
pub fn validate_password_plaintext(v: &mut Validator, password: &str) {
    v.check(!password.is_empty(), "password", "must be provided");
    v.check(password.len() >= 8, "password", "must be at least 8 bytes long");
    v.check(password.len() <= 72, "password", "must not be more than 72 bytes long");
}

pub fn validate_name(v: &mut Validator, name: &str) {
    v.check(!name.is_empty(), "name", "must be provided");
    v.check(name.len() <= 500, "name", "must not be more than 500 bytes long");
}

pub fn validate_user(v: &mut Validator, user: &User) {
    validate_name(v, &user.name);
    validate_email(v, &user.email);
    if let Some(plaintext) = user.credential.plaintext() {
        validate_password_plaintext(v, plaintext);
    }
}

fn ensure_valid(v: Validator) -> Result<(), AppError> {
    if v.valid() {
        Ok(())
    } else {
        Err(AppError::Validation(v.into_errors()))
    }
}

/// Creates a token, persists its hash and returns the plaintext with its expiry.
async fn issue_token(
    state: &AppState,
    user_id: i64,
    ttl: Duration,
    scope: Scope,
) -> Result<IssuedToken, AppError> {
    let (plaintext, token) = AuthToken::generate(user_id, ttl, scope)?;
    state.tokens.insert(&token).await?;
    Ok(IssuedToken {
        token: plaintext,
        expiry: token.expiry,
    })
}

fn send_activation_email(state: &AppState, user: &User, token: String) {
    let notifier = state.notifier.clone();
    let recipient = user.email.clone();
    let email = ActivationEmail::new(&user.name, &token);
    state.tasks.spawn("activation_email", async move {
        notifier
            .send(
                &recipient,
                &email.subject,
                &email.plain_body,
                &email.html_body,
                &token,
            )
            .await
    });
}

/// Creates an inactive account and mails it an activation token.
///
/// Returns as soon as the token is stored; the email goes out in the background.
pub async fn register_user(state: &AppState, req: RegisterRequest) -> Result<User, AppError> {
    let email = normalize_email(&req.email);

    // Checked before hashing so malformed input never costs an argon2 run.
    let mut v = Validator::new();
    validate_name(&mut v, &req.name);
    validate_email(&mut v, &email);
    validate_password_plaintext(&mut v, &req.password);
    ensure_valid(v)?;

    let credential = Credential::set(&req.password)?;
    let mut user = User::new(req.name, req.surname, email, credential);
    user.credential = Credential::from_hash(user.credential.hash());

    match state.users.insert(&mut user).await {
        Ok(()) => {}
        Err(StoreError::DuplicateEmail) => {
            warn!("registration with an email already in use");
            return Err(AppError::field(
                "email",
                "a user with this email already exists",
            ));
        }
        Err(e) => return Err(e.into()),
    }
    let issued = match issue_token(
        state,
        user.id,
        state.config.tokens.activation_ttl(),
        Scope::Activation,
    )
    .await
    {
        Ok(issued) => issued,
        Err(e) => {
            // An account without an activation token can never be activated.
            if let Err(cleanup) = state.users.delete(user.id).await {
                error!(user_id = user.id, error = ?cleanup, "failed to remove unactivatable user");
            }
            return Err(e);
        }
    };

    send_activation_email(state, &user, issued.token);

    info!(user_id = user.id, "user registered");
    Ok(user)
}

/// Redeems an activation token and revokes every activation token of its owner.
pub async fn activate_user(state: &AppState, token_plaintext: &str) -> Result<User, AppError> {
    let mut v = Validator::new();
    validate_token_plaintext(&mut v, token_plaintext);
    ensure_valid(v)?;

    let mut user = match state
        .users
        .get_for_token(Scope::Activation, token_plaintext)
        .await
    {
        Ok(user) => user,
        Err(StoreError::NotFound) => {
            return Err(AppError::field(
                "token",
                "invalid or expired activation token",
            ))
        }
        Err(e) => return Err(e.into()),
    };

    user.activated = true;
    state.users.update(&mut user).await?;

    state
        .tokens
        .delete_all_for_user(Scope::Activation, user.id)
        .await?;

    info!(user_id = user.id, "user activated");
    Ok(user)
}

/// Exchanges email and password for an authentication token.
pub async fn authenticate(state: &AppState, req: LoginRequest) -> Result<IssuedToken, AppError> {
    let email = normalize_email(&req.email);

    let mut v = Validator::new();
    validate_email(&mut v, &email);
    validate_password_plaintext(&mut v, &req.password);
    ensure_valid(v)?;

    let user = match state.users.get_by_email(&email).await {
        Ok(user) => user,
        Err(StoreError::NotFound) => {
            warn!("login with unknown email");
            return Err(AppError::InvalidCredentials);
        }
        Err(e) => return Err(e.into()),
    };

    if !user.credential.matches(&req.password)? {
        warn!(user_id = user.id, "login invalid password");
        return Err(AppError::InvalidCredentials);
    }

    let issued = issue_token(
        state,
        user.id,
        state.config.tokens.authentication_ttl(),
        Scope::Authentication,
    )
    .await?;
    info!(user_id = user.id, "authentication token issued");
    Ok(issued)
}

pub async fn get_user(state: &AppState, id: i64) -> Result<User, AppError> {
    Ok(state.users.get_by_id(id).await?)
}

pub async fn list_users(state: &AppState) -> Result<Vec<User>, AppError> {
    Ok(state.users.list().await?)
}

pub async fn update_user(
    state: &AppState,
    id: i64,
    req: UpdateUserRequest,
) -> Result<User, AppError> {
    let mut user = state.users.get_by_id(id).await?;

    if let Some(expected) = req.version {
        if expected != user.version {
            return Err(AppError::EditConflict);
        }
    }

    if let Some(name) = req.name {
        user.name = name;
    }
    if let Some(surname) = req.surname {
        user.surname = surname;
    }
    if let Some(email) = req.email {
        user.email = normalize_email(&email);
    }
    if let Some(role) = req.role {
        user.role = role;
    }
    if let Some(activated) = req.activated {
        user.activated = activated;
    }

    let mut v = Validator::new();
    validate_user(&mut v, &user);
    ensure_valid(v)?;

    state.users.update(&mut user).await?;
    info!(user_id = user.id, version = user.version, "user updated");
    Ok(user)
}

pub async fn delete_user(state: &AppState, id: i64) -> Result<(), AppError> {
    state.users.delete(id).await?;
    info!(user_id = id, "user deleted");
    Ok(())
}
