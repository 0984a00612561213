//! JWT authentication with role-based access control.
//!
//! Dual-token system: short-lived access tokens (1 hour, stateless, RS256)
//! and long-lived refresh tokens (1 year, database-tracked, HS256). Refresh
//! tokens are rotated on every use.

mod cookie;
mod errors;
mod extractors;
mod state;
mod types;

pub use cookie::{
    ACCESS_COOKIE_NAME, CookieSettings, REFRESH_COOKIE_NAME, get_bearer_token, get_cookie,
};
pub use errors::{ApiAuthError, AuthErrorKind};
pub use extractors::{
    AdminOnly, AnyRole, ApiAuth, RefreshAuth, RoleConstraint, authenticate_access,
    authenticate_refresh, extract_access_token,
};
pub use state::HasAuthBackend;
pub use types::{AuthenticatedUser, RefreshSession};
