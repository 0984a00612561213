mod auth;
mod error;
mod tenants;
mod users;

use axum::Router;
use std::sync::Arc;

use crate::auth::CookieSettings;
use crate::db::Database;
use crate::jwt::TokenIssuer;

pub use error::ApiError;

/// Create the router for `/auth`, `/tenants` and `/users`.
pub fn create_api_router(db: Database, jwt: Arc<TokenIssuer>, cookies: CookieSettings) -> Router {
    let auth_state = auth::AuthState {
        db: db.clone(),
        jwt: jwt.clone(),
        cookies,
    };

    let tenants_state = tenants::TenantsState {
        db: db.clone(),
        jwt: jwt.clone(),
    };

    let users_state = users::UsersState { db, jwt };

    Router::new()
        .nest("/auth", auth::router(auth_state))
        .nest("/tenants", tenants::router(tenants_state))
        .nest("/users", users::router(users_state))
}
