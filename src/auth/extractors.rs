//! Axum extractors for authentication.
//!
//! The actual checks live in two plain pipelines, [`authenticate_access`] and
//! [`authenticate_refresh`]. The extractors below only wire them to request
//! parts and router state.

use std::marker::PhantomData;

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, request::Parts},
};
use tracing::error;

use super::cookie::{ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, get_bearer_token, get_cookie};
use super::errors::{ApiAuthError, AuthErrorKind};
use super::state::HasAuthBackend;
use super::types::{AuthenticatedUser, RefreshSession};
use crate::db::{Database, Role};
use crate::jwt::TokenIssuer;

/// Access token from the `accessToken` cookie, falling back to an
/// `Authorization: Bearer` header.
pub fn extract_access_token(headers: &HeaderMap) -> Option<&str> {
    get_cookie(headers, ACCESS_COOKIE_NAME).or_else(|| get_bearer_token(headers))
}

/// Verify the access token carried by a request.
pub fn authenticate_access(
    headers: &HeaderMap,
    jwt: &TokenIssuer,
) -> Result<AuthenticatedUser, AuthErrorKind> {
    let token = extract_access_token(headers).ok_or(AuthErrorKind::NotAuthenticated)?;

    let claims = jwt
        .verify_access_token(token)
        .map_err(|_| AuthErrorKind::InvalidToken)?;
    let user_id = claims.user_id().ok_or(AuthErrorKind::InvalidToken)?;

    Ok(AuthenticatedUser { claims, user_id })
}

/// Verify the refresh token carried by a request, including that its store
/// record still exists.
pub async fn authenticate_refresh(
    headers: &HeaderMap,
    jwt: &TokenIssuer,
    db: &Database,
) -> Result<RefreshSession, AuthErrorKind> {
    let token = get_cookie(headers, REFRESH_COOKIE_NAME).ok_or(AuthErrorKind::NotAuthenticated)?;

    let claims = jwt
        .verify_refresh_token(token)
        .map_err(|_| AuthErrorKind::InvalidToken)?;
    let user_id = claims.user_id().ok_or(AuthErrorKind::InvalidToken)?;
    let record_id = claims.record_id().ok_or(AuthErrorKind::InvalidToken)?;

    let exists = db
        .refresh_tokens()
        .exists_by_id(record_id)
        .await
        .map_err(|e| {
            error!("Failed to check refresh token: {}", e);
            AuthErrorKind::DatabaseError
        })?;
    if !exists {
        return Err(AuthErrorKind::TokenRevoked);
    }

    Ok(RefreshSession {
        claims,
        user_id,
        record_id,
    })
}

// =============================================================================
// Role constraints
// =============================================================================

/// Roles a route accepts. Implemented by zero-sized marker types.
pub trait RoleConstraint {
    const ALLOWED: &'static [Role];
}

/// Any authenticated user.
pub struct AnyRole;

impl RoleConstraint for AnyRole {
    const ALLOWED: &'static [Role] = &[Role::Customer, Role::Manager, Role::Admin];
}

pub struct AdminOnly;

impl RoleConstraint for AdminOnly {
    const ALLOWED: &'static [Role] = &[Role::Admin];
}

// =============================================================================
// Extractors
// =============================================================================

/// Extractor for endpoints that require a valid access token whose role is
/// in `R::ALLOWED`. Rejects with 401 when unauthenticated and 403 when the
/// role does not match.
pub struct ApiAuth<R: RoleConstraint = AnyRole>(
    pub AuthenticatedUser,
    pub PhantomData<fn() -> R>,
);

impl<S, R> FromRequestParts<S> for ApiAuth<R>
where
    S: HasAuthBackend + Send + Sync,
    R: RoleConstraint,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = authenticate_access(&parts.headers, state.jwt())?;
        if !user.role().is_allowed(R::ALLOWED) {
            return Err(AuthErrorKind::InsufficientRole.into());
        }
        Ok(ApiAuth(user, PhantomData))
    }
}

/// Extractor for endpoints that consume a refresh token.
pub struct RefreshAuth(pub RefreshSession);

impl<S> FromRequestParts<S> for RefreshAuth
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = ApiAuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        authenticate_refresh(&parts.headers, state.jwt(), state.db())
            .await
            .map(RefreshAuth)
            .map_err(ApiAuthError::from)
    }
}
