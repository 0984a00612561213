//! Authentication user types.

use crate::db::Role;
use crate::jwt::{AccessClaims, RefreshClaims};

/// Authenticated user information extracted from an access token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    /// JWT claims from the access token
    pub claims: AccessClaims,
    /// Database user ID (parsed from `sub`)
    pub user_id: i64,
}

impl AuthenticatedUser {
    pub fn role(&self) -> Role {
        self.claims.role
    }
}

/// A refresh token that passed signature and store checks.
#[derive(Debug, Clone)]
pub struct RefreshSession {
    pub claims: RefreshClaims,
    pub user_id: i64,
    /// Store record backing the token
    pub record_id: i64,
}
