//! Authentication API endpoints.
//!
//! - POST `/register` - Create a customer account and start a session
//! - POST `/login` - Check credentials and start a session
//! - GET `/self` - Current user (access token)
//! - POST `/refresh` - Rotate the refresh token and issue a new pair
//! - POST `/logout` - Delete the refresh token record and clear cookies

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header::SET_COOKIE},
    response::{AppendHeaders, IntoResponse},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::error::{ApiError, ResultExt, is_unique_violation, require_field};
use crate::auth::{
    ACCESS_COOKIE_NAME, ApiAuth, CookieSettings, REFRESH_COOKIE_NAME, RefreshAuth,
};
use crate::db::{Database, NewUser, Role};
use crate::impl_has_auth_backend;
use crate::jwt::TokenIssuer;
use crate::password::{CredentialError, hash_password, verify_password};
use crate::session::{SessionTokens, end_session, rotate_session, start_session};

/// Returned for an unknown email, a wrong password, and a corrupt stored hash
/// alike, so responses do not reveal which accounts exist.
const LOGIN_FAILED: &str = "Email or password does not match.";

#[derive(Clone)]
pub struct AuthState {
    pub db: Database,
    pub jwt: Arc<TokenIssuer>,
    pub cookies: CookieSettings,
}

impl_has_auth_backend!(AuthState);

pub fn router(state: AuthState) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/self", get(current_user))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .with_state(state)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterRequest {
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

#[derive(Deserialize)]
struct LoginRequest {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

#[derive(Serialize)]
struct IdResponse {
    id: i64,
}

/// Both `Set-Cookie` headers for a fresh token pair.
fn session_cookies(
    cookies: &CookieSettings,
    session: &SessionTokens,
) -> AppendHeaders<[(axum::http::HeaderName, String); 2]> {
    AppendHeaders([
        (
            SET_COOKIE,
            cookies.build(
                ACCESS_COOKIE_NAME,
                &session.access.token,
                session.access.duration,
            ),
        ),
        (
            SET_COOKIE,
            cookies.build(
                REFRESH_COOKIE_NAME,
                &session.refresh.token,
                session.refresh.duration,
            ),
        ),
    ])
}

async fn register(
    State(state): State<AuthState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = require_field(&payload.email, "Email is required.")?;
    let first_name = require_field(&payload.first_name, "First name is required.")?;
    let last_name = require_field(&payload.last_name, "Last name is required.")?;
    // Passwords are taken verbatim; whitespace is significant.
    let password = match payload.password.as_deref() {
        Some(p) if !p.trim().is_empty() => p.to_string(),
        _ => return Err(ApiError::bad_request("Password is required.")),
    };

    if state
        .db
        .users()
        .email_exists(email)
        .await
        .db_err("Failed to check email")?
    {
        return Err(ApiError::bad_request("Email already exists!"));
    }

    let password_hash = hash_password(password).await.map_err(|e| {
        error!("Failed to hash password: {}", e);
        ApiError::internal("Failed to create user.")
    })?;

    let user_id = state
        .db
        .users()
        .create(&NewUser {
            first_name,
            last_name,
            email,
            password_hash: &password_hash,
            role: Role::Customer,
            tenant_id: None,
        })
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ApiError::bad_request("Email already exists!")
            } else {
                ApiError::db_error("Failed to create user", e)
            }
        })?;

    info!(user_id, "User registered");

    let session = start_session(&state.jwt, &state.db, user_id, Role::Customer).await?;

    Ok((
        StatusCode::CREATED,
        session_cookies(&state.cookies, &session),
        Json(IdResponse { id: user_id }),
    ))
}

async fn login(
    State(state): State<AuthState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = require_field(&payload.email, "Email is required.")?;
    let password = match payload.password {
        Some(p) if !p.trim().is_empty() => p,
        _ => return Err(ApiError::bad_request("Password is required.")),
    };

    let user = state
        .db
        .users()
        .get_by_email(email)
        .await
        .db_err("Failed to look up user")?
        .ok_or_else(|| ApiError::bad_request(LOGIN_FAILED))?;

    match verify_password(password, user.password_hash.clone()).await {
        Ok(true) => {}
        Ok(false) => return Err(ApiError::bad_request(LOGIN_FAILED)),
        Err(CredentialError::Corrupt(e)) => {
            warn!(user_id = user.id, "Stored password hash is corrupt: {}", e);
            return Err(ApiError::bad_request(LOGIN_FAILED));
        }
        Err(e) => {
            error!("Failed to verify password: {}", e);
            return Err(ApiError::internal("Failed to verify password"));
        }
    }

    let session = start_session(&state.jwt, &state.db, user.id, user.role).await?;

    info!(user_id = user.id, "User logged in");

    Ok((
        StatusCode::OK,
        session_cookies(&state.cookies, &session),
        Json(IdResponse { id: user.id }),
    ))
}

async fn current_user(
    State(state): State<AuthState>,
    ApiAuth(auth, _): ApiAuth,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .users()
        .get_by_id(auth.user_id)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found."))?;

    Ok(Json(user))
}

async fn refresh(
    State(state): State<AuthState>,
    RefreshAuth(token): RefreshAuth,
) -> Result<impl IntoResponse, ApiError> {
    // The new pair carries the role currently stored, not the one in the old
    // token, so role changes take effect on the next refresh.
    let user = state
        .db
        .users()
        .get_by_id(token.user_id)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::bad_request("User with the token could not find."))?;

    let session = rotate_session(&state.jwt, &state.db, user.id, user.role, token.record_id).await?;

    Ok((
        StatusCode::OK,
        session_cookies(&state.cookies, &session),
        Json(IdResponse { id: user.id }),
    ))
}

async fn logout(
    State(state): State<AuthState>,
    ApiAuth(auth, _): ApiAuth,
    RefreshAuth(token): RefreshAuth,
) -> Result<impl IntoResponse, ApiError> {
    if token.user_id != auth.user_id {
        return Err(ApiError::unauthorized("Token mismatch"));
    }

    end_session(&state.db, token.record_id)
        .await
        .db_err("Failed to delete refresh token")?;

    info!(user_id = auth.user_id, "User logged out");

    Ok((
        StatusCode::OK,
        AppendHeaders([
            (SET_COOKIE, state.cookies.clear(ACCESS_COOKIE_NAME)),
            (SET_COOKIE, state.cookies.clear(REFRESH_COOKIE_NAME)),
        ]),
        Json(serde_json::json!({})),
    ))
}
