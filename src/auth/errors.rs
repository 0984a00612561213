//! Authentication error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Why a request could not be authenticated or authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    /// No token was presented.
    NotAuthenticated,
    /// Bad signature, wrong issuer, expired, or malformed claims.
    InvalidToken,
    /// Refresh token is valid but its store record is gone.
    TokenRevoked,
    /// Valid token, role not in the route's allow-list.
    InsufficientRole,
    DatabaseError,
}

impl AuthErrorKind {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotAuthenticated | Self::InvalidToken | Self::TokenRevoked => {
                StatusCode::UNAUTHORIZED
            }
            Self::InsufficientRole => StatusCode::FORBIDDEN,
            Self::DatabaseError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            Self::NotAuthenticated | Self::InvalidToken | Self::TokenRevoked => {
                "UnauthorizedError"
            }
            Self::InsufficientRole => "ForbiddenError",
            Self::DatabaseError => "InternalServerError",
        }
    }

    fn message(&self) -> &'static str {
        match self {
            Self::NotAuthenticated => "Not authenticated",
            Self::InvalidToken => "Invalid or expired token",
            Self::TokenRevoked => "Token has been revoked",
            Self::InsufficientRole => "Insufficient permissions",
            Self::DatabaseError => "Database error",
        }
    }
}

/// Rejection returned by the auth extractors.
#[derive(Debug)]
pub struct ApiAuthError(pub AuthErrorKind);

impl From<AuthErrorKind> for ApiAuthError {
    fn from(kind: AuthErrorKind) -> Self {
        Self(kind)
    }
}

#[derive(Serialize)]
struct ErrorDetail {
    #[serde(rename = "type")]
    error_type: &'static str,
    message: &'static str,
}

#[derive(Serialize)]
struct ErrorResponse {
    errors: [ErrorDetail; 1],
}

impl IntoResponse for ApiAuthError {
    fn into_response(self) -> Response {
        (
            self.0.status_code(),
            Json(ErrorResponse {
                errors: [ErrorDetail {
                    error_type: self.0.error_type(),
                    message: self.0.message(),
                }],
            }),
        )
            .into_response()
    }
}
