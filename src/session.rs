//! Issuing and rotating access/refresh token pairs.
//!
//! Every refresh token is backed by a row in `refresh_tokens`. Rotation deletes
//! the old row and inserts the new one in a single transaction. The delete is
//! checked: if the old row is already gone (a concurrent rotation or a logout
//! won the race) the whole rotation fails and nothing is written.

use chrono::{Duration, Utc};
use thiserror::Error;
use tracing::debug;

use crate::db::{Database, RefreshTokenRecord, RefreshTokenStore, Role, SQLITE_DATETIME_FORMAT};
use crate::jwt::{IssuedToken, JwtError, Subject, TokenIssuer};

/// Lifetime of a refresh token record. Fixed at 365 days; leap years are not
/// compensated.
pub const REFRESH_RECORD_LIFETIME_DAYS: i64 = 365;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
    #[error(transparent)]
    Token(#[from] JwtError),
    /// The refresh token being rotated no longer has a store record.
    #[error("refresh token has been revoked")]
    Revoked,
}

/// A freshly issued token pair.
#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
    /// Store record backing the refresh token.
    pub record: RefreshTokenRecord,
}

/// Expiry timestamp for a record created now.
pub fn refresh_record_expiry() -> String {
    (Utc::now() + Duration::days(REFRESH_RECORD_LIFETIME_DAYS))
        .format(SQLITE_DATETIME_FORMAT)
        .to_string()
}

/// Insert a new refresh token record for `owner_user_id`. Its id becomes the
/// `jti` of the next refresh token issued to that user.
pub async fn rotate_refresh_record(
    db: &Database,
    owner_user_id: i64,
) -> Result<RefreshTokenRecord, sqlx::Error> {
    db.refresh_tokens()
        .create(owner_user_id, &refresh_record_expiry())
        .await
}

/// Issue a new access token and a new store-backed refresh token
/// (register and login).
pub async fn start_session(
    jwt: &TokenIssuer,
    db: &Database,
    user_id: i64,
    role: Role,
) -> Result<SessionTokens, SessionError> {
    let subject = Subject::new(user_id, role);
    let access = jwt.issue_access_token(&subject)?;
    let record = rotate_refresh_record(db, user_id).await?;
    let refresh = jwt.issue_refresh_token(&subject, record.id)?;

    debug!(user_id, record_id = record.id, "Session started");

    Ok(SessionTokens {
        access,
        refresh,
        record,
    })
}

/// Replace the refresh token backed by `old_record_id` with a new pair.
///
/// Fails with [`SessionError::Revoked`] if the old record was already deleted;
/// in that case no new record is created.
pub async fn rotate_session(
    jwt: &TokenIssuer,
    db: &Database,
    user_id: i64,
    role: Role,
    old_record_id: i64,
) -> Result<SessionTokens, SessionError> {
    let subject = Subject::new(user_id, role);
    let access = jwt.issue_access_token(&subject)?;

    let mut tx = db.begin().await.map_err(lost_race)?;

    if RefreshTokenStore::delete_in(&mut tx, old_record_id)
        .await
        .map_err(lost_race)?
        == 0
    {
        return Err(SessionError::Revoked);
    }

    let record = RefreshTokenStore::create_in(&mut tx, user_id, &refresh_record_expiry())
        .await
        .map_err(lost_race)?;
    let refresh = jwt.issue_refresh_token(&subject, record.id)?;

    tx.commit().await.map_err(lost_race)?;

    debug!(
        user_id,
        old_record_id,
        record_id = record.id,
        "Refresh token rotated"
    );

    Ok(SessionTokens {
        access,
        refresh,
        record,
    })
}

/// Delete the record behind a refresh token. Returns whether a row was removed.
pub async fn end_session(db: &Database, record_id: i64) -> Result<bool, sqlx::Error> {
    Ok(db.refresh_tokens().delete_by_id(record_id).await? > 0)
}

/// Delete every refresh token record of a user. Their outstanding refresh
/// tokens stop working; access tokens run until they expire.
pub async fn end_all_sessions(db: &Database, user_id: i64) -> Result<u64, sqlx::Error> {
    db.refresh_tokens().delete_all_by_user(user_id).await
}

/// SQLite reports a competing writer on the same database as BUSY or LOCKED.
/// During rotation that writer is another rotation or a logout touching the
/// same record, so the loser sees the token as revoked.
fn lost_race(e: sqlx::Error) -> SessionError {
    if is_lock_contention(&e) {
        debug!(error = %e, "Rotation lost to a concurrent writer");
        SessionError::Revoked
    } else {
        SessionError::Storage(e)
    }
}

fn is_lock_contention(e: &sqlx::Error) -> bool {
    const SQLITE_BUSY: i32 = 5;
    const SQLITE_LOCKED: i32 = 6;

    e.as_database_error()
        .and_then(|db_err| db_err.code())
        .and_then(|code| code.parse::<i32>().ok())
        .is_some_and(|code| matches!(code & 0xff, SQLITE_BUSY | SQLITE_LOCKED))
}
