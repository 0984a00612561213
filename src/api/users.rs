//! Admin user management.
//!
//! Every route here requires the `admin` role. Admins can create customers
//! and managers (optionally attached to a tenant) but never other admins, and
//! existing admin accounts cannot be edited or deleted through these routes.
//!
//! `/{id}/sessions` reports and revokes a user's refresh tokens.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};

use super::error::{ApiError, ResultExt, is_unique_violation, require_field};
use crate::auth::{AdminOnly, ApiAuth};
use crate::db::{Database, NewUser, Role, User, UserUpdate};
use crate::impl_has_auth_backend;
use crate::jwt::TokenIssuer;
use crate::password::hash_password;
use crate::session::end_all_sessions;

#[derive(Clone)]
pub struct UsersState {
    pub db: Database,
    pub jwt: Arc<TokenIssuer>,
}

impl_has_auth_backend!(UsersState);

pub fn router(state: UsersState) -> Router {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route(
            "/{id}",
            get(get_user).patch(update_user).delete(delete_user),
        )
        .route("/{id}/sessions", get(count_sessions).delete(revoke_sessions))
        .with_state(state)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateUserRequest {
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    tenant_id: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateUserRequest {
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    tenant_id: Option<i64>,
}

#[derive(Serialize)]
struct IdResponse {
    id: i64,
}

#[derive(Serialize)]
struct SessionsResponse {
    id: i64,
    active: i64,
}

#[derive(Serialize)]
struct RevokedResponse {
    id: i64,
    revoked: u64,
}

/// Parse a role an admin may assign.
fn assignable_role(role: &Option<String>) -> Result<Role, ApiError> {
    match require_field(role, "Role is required.")? {
        "customer" => Ok(Role::Customer),
        "manager" => Ok(Role::Manager),
        _ => Err(ApiError::bad_request("Selected role is not allowed.")),
    }
}

async fn find_user(db: &Database, id: i64) -> Result<User, ApiError> {
    db.users()
        .get_by_id(id)
        .await
        .db_err("Failed to get user")?
        .ok_or_else(|| ApiError::not_found("User not found."))
}

/// Look up a user an admin is about to modify.
async fn modifiable_user(db: &Database, id: i64) -> Result<User, ApiError> {
    let user = find_user(db, id).await?;
    if user.role == Role::Admin {
        return Err(ApiError::forbidden("Admin accounts cannot be modified."));
    }
    Ok(user)
}

async fn check_tenant(db: &Database, tenant_id: Option<i64>) -> Result<(), ApiError> {
    if let Some(id) = tenant_id {
        let exists = db
            .tenants()
            .exists(id)
            .await
            .db_err("Failed to check tenant")?;
        if !exists {
            return Err(ApiError::bad_request("Tenant does not exist."));
        }
    }
    Ok(())
}

async fn create_user(
    State(state): State<UsersState>,
    ApiAuth(auth, _): ApiAuth<AdminOnly>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = require_field(&payload.email, "Email is required.")?;
    let first_name = require_field(&payload.first_name, "First name is required.")?;
    let last_name = require_field(&payload.last_name, "Last name is required.")?;
    let password = match payload.password.as_deref() {
        Some(p) if !p.trim().is_empty() => p.to_string(),
        _ => return Err(ApiError::bad_request("Password is required.")),
    };
    let role = assignable_role(&payload.role)?;
    check_tenant(&state.db, payload.tenant_id).await?;

    let password_hash = hash_password(password).await.map_err(|e| {
        error!("Failed to hash password: {}", e);
        ApiError::internal("Failed to create user.")
    })?;

    let id = state
        .db
        .users()
        .create(&NewUser {
            first_name,
            last_name,
            email,
            password_hash: &password_hash,
            role,
            tenant_id: payload.tenant_id,
        })
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                ApiError::bad_request("Email already exists!")
            } else {
                ApiError::db_error("Failed to create user", e)
            }
        })?;

    info!(
        user_id = id,
        admin_id = auth.user_id,
        role = role.as_str(),
        "User created by admin"
    );

    Ok((StatusCode::CREATED, Json(IdResponse { id })))
}

async fn list_users(
    State(state): State<UsersState>,
    _auth: ApiAuth<AdminOnly>,
) -> Result<impl IntoResponse, ApiError> {
    let users = state.db.users().list().await.db_err("Failed to list users")?;
    Ok(Json(users))
}

async fn get_user(
    State(state): State<UsersState>,
    _auth: ApiAuth<AdminOnly>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let user = find_user(&state.db, id).await?;
    Ok(Json(user))
}

async fn update_user(
    State(state): State<UsersState>,
    ApiAuth(auth, _): ApiAuth<AdminOnly>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, ApiError> {
    modifiable_user(&state.db, id).await?;
    let first_name = require_field(&payload.first_name, "First name is required.")?;
    let last_name = require_field(&payload.last_name, "Last name is required.")?;
    let role = assignable_role(&payload.role)?;
    check_tenant(&state.db, payload.tenant_id).await?;

    let updated = state
        .db
        .users()
        .update(
            id,
            &UserUpdate {
                first_name,
                last_name,
                role,
                tenant_id: payload.tenant_id,
            },
        )
        .await
        .db_err("Failed to update user")?;
    if !updated {
        return Err(ApiError::not_found("User not found."));
    }

    info!(user_id = id, admin_id = auth.user_id, "User updated by admin");

    Ok(Json(IdResponse { id }))
}

async fn delete_user(
    State(state): State<UsersState>,
    ApiAuth(auth, _): ApiAuth<AdminOnly>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    modifiable_user(&state.db, id).await?;

    // Refresh token records go with the user (ON DELETE CASCADE).
    let deleted = state
        .db
        .users()
        .delete(id)
        .await
        .db_err("Failed to delete user")?;
    if !deleted {
        return Err(ApiError::not_found("User not found."));
    }

    info!(user_id = id, admin_id = auth.user_id, "User deleted by admin");

    Ok(Json(IdResponse { id }))
}

async fn count_sessions(
    State(state): State<UsersState>,
    _auth: ApiAuth<AdminOnly>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    find_user(&state.db, id).await?;
    let active = state
        .db
        .refresh_tokens()
        .count_by_user(id)
        .await
        .db_err("Failed to count sessions")?;
    Ok(Json(SessionsResponse { id, active }))
}

async fn revoke_sessions(
    State(state): State<UsersState>,
    ApiAuth(auth, _): ApiAuth<AdminOnly>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    find_user(&state.db, id).await?;
    let revoked = end_all_sessions(&state.db, id)
        .await
        .db_err("Failed to revoke sessions")?;

    info!(user_id = id, admin_id = auth.user_id, revoked, "Sessions revoked by admin");

    Ok(Json(RevokedResponse { id, revoked }))
}
