//! JWT token generation and validation.
//!
//! Access tokens are RS256: anyone holding the public key can verify them,
//! only this service can mint them. Refresh tokens are HS256 with a secret that
//! never leaves this service, and carry the id of their store record as `jti`.

use std::sync::Arc;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::Role;
use crate::keys::KeyMaterial;

/// Issuer claim on every token this service signs.
pub const ISSUER: &str = "auth-service";

/// Access token duration: 1 hour
pub const ACCESS_TOKEN_DURATION_SECS: u64 = 60 * 60;

/// Refresh token duration: 365 days (leap years are not accounted for)
pub const REFRESH_TOKEN_DURATION_SECS: u64 = 365 * 24 * 60 * 60;

/// Identity embedded in both token kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subject {
    /// User id, stringified
    pub sub: String,
    pub role: Role,
}

impl Subject {
    pub fn new(user_id: i64, role: Role) -> Self {
        Self {
            sub: user_id.to_string(),
            role,
        }
    }
}

/// JWT claims for access tokens (stateless).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject (user id)
    pub sub: String,
    pub role: Role,
    pub iss: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
}

impl AccessClaims {
    /// The numeric user id, if `sub` holds one.
    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }
}

/// JWT claims for refresh tokens (tracked in the database by `jti`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: String,
    pub role: Role,
    /// Refresh token record id
    pub id: String,
    /// JWT ID, same value as `id`
    pub jti: String,
    pub iss: String,
    pub iat: u64,
    pub exp: u64,
}

impl RefreshClaims {
    pub fn user_id(&self) -> Option<i64> {
        self.sub.parse().ok()
    }

    /// The store record this token refers to. Rejects tokens whose `id` and
    /// `jti` disagree.
    pub fn record_id(&self) -> Option<i64> {
        if self.id != self.jti {
            return None;
        }
        self.jti.parse().ok()
    }
}

/// A signed token and its lifetime.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    /// Token duration in seconds
    pub duration: u64,
}

/// Signs and verifies access and refresh tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    keys: Arc<KeyMaterial>,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
}

impl TokenIssuer {
    pub fn new(keys: Arc<KeyMaterial>) -> Self {
        let refresh_encoding = EncodingKey::from_secret(keys.refresh_secret());
        let refresh_decoding = DecodingKey::from_secret(keys.refresh_secret());
        Self {
            keys,
            refresh_encoding,
            refresh_decoding,
        }
    }

    /// Sign an access token for the subject.
    pub fn issue_access_token(&self, subject: &Subject) -> Result<IssuedToken, JwtError> {
        let now = now();
        let claims = AccessClaims {
            sub: subject.sub.clone(),
            role: subject.role,
            iss: ISSUER.to_string(),
            iat: now,
            exp: now + ACCESS_TOKEN_DURATION_SECS,
        };

        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::RS256),
            &claims,
            self.keys.access_signing_key(),
        )
        .map_err(JwtError::Encoding)?;

        Ok(IssuedToken {
            token,
            duration: ACCESS_TOKEN_DURATION_SECS,
        })
    }

    /// Sign a refresh token bound to an existing store record.
    pub fn issue_refresh_token(
        &self,
        subject: &Subject,
        record_id: i64,
    ) -> Result<IssuedToken, JwtError> {
        let now = now();
        let claims = RefreshClaims {
            sub: subject.sub.clone(),
            role: subject.role,
            id: record_id.to_string(),
            jti: record_id.to_string(),
            iss: ISSUER.to_string(),
            iat: now,
            exp: now + REFRESH_TOKEN_DURATION_SECS,
        };

        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &self.refresh_encoding,
        )
        .map_err(JwtError::Encoding)?;

        Ok(IssuedToken {
            token,
            duration: REFRESH_TOKEN_DURATION_SECS,
        })
    }

    /// Validate and decode an access token.
    pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims, JwtError> {
        let validation = validation(Algorithm::RS256);
        let token_data = jsonwebtoken::decode::<AccessClaims>(
            token,
            self.keys.access_verifying_key(),
            &validation,
        )
        .map_err(JwtError::Decoding)?;
        Ok(token_data.claims)
    }

    /// Validate and decode a refresh token. Does not check the store; see
    /// [`crate::auth::authenticate_refresh`] for the full check.
    pub fn verify_refresh_token(&self, token: &str) -> Result<RefreshClaims, JwtError> {
        let validation = validation(Algorithm::HS256);
        let token_data =
            jsonwebtoken::decode::<RefreshClaims>(token, &self.refresh_decoding, &validation)
                .map_err(JwtError::Decoding)?;
        Ok(token_data.claims)
    }
}

fn validation(algorithm: Algorithm) -> Validation {
    let mut validation = Validation::new(algorithm);
    validation.leeway = 0;
    validation.set_issuer(&[ISSUER]);
    validation.set_required_spec_claims(&["exp", "iss", "sub"]);
    validation
}

fn now() -> u64 {
    chrono::Utc::now().timestamp().max(0) as u64
}

/// Errors that can occur during JWT operations.
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Failed to encode token: {0}")]
    Encoding(jsonwebtoken::errors::Error),
    #[error("Failed to decode token: {0}")]
    Decoding(jsonwebtoken::errors::Error),
}
