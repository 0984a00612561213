//! Refresh token records for rotation and revocation.
//!
//! Each issued refresh token owns exactly one row here, and the row id is the
//! token's `jti`. Access tokens are stateless and never stored. Expired rows
//! are left in place: expiry is enforced by the token signature.

use sqlx::sqlite::SqlitePool;

/// Format used for every datetime column (matches SQLite's `datetime('now')`).
pub const SQLITE_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A persisted refresh token record.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RefreshTokenRecord {
    pub id: i64,
    pub user_id: i64,
    pub expires_at: String,
    pub created_at: String,
}

/// Store for refresh token records.
pub struct RefreshTokenStore {
    pool: SqlitePool,
}

impl RefreshTokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a record and return it with its assigned id.
    pub async fn create(
        &self,
        user_id: i64,
        expires_at: &str,
    ) -> Result<RefreshTokenRecord, sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        let record = Self::create_in(&mut tx, user_id, expires_at).await?;
        tx.commit().await?;
        Ok(record)
    }

    /// Insert a record inside an existing transaction.
    pub async fn create_in(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        user_id: i64,
        expires_at: &str,
    ) -> Result<RefreshTokenRecord, sqlx::Error> {
        let result = sqlx::query("INSERT INTO refresh_tokens (user_id, expires_at) VALUES (?, ?)")
            .bind(user_id)
            .bind(expires_at)
            .execute(&mut **tx)
            .await?;

        sqlx::query_as(
            "SELECT id, user_id, expires_at, created_at FROM refresh_tokens WHERE id = ?",
        )
        .bind(result.last_insert_rowid())
        .fetch_one(&mut **tx)
        .await
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<RefreshTokenRecord>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, user_id, expires_at, created_at FROM refresh_tokens WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn exists_by_id(&self, id: i64) -> Result<bool, sqlx::Error> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM refresh_tokens WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Delete a record. Returns the number of rows removed (0 if it was
    /// already gone).
    pub async fn delete_by_id(&self, id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Delete a record inside an existing transaction.
    pub async fn delete_in(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        id: i64,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE id = ?")
            .bind(id)
            .execute(&mut **tx)
            .await?;
        Ok(result.rows_affected())
    }

    /// Delete every record owned by a user.
    pub async fn delete_all_by_user(&self, user_id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Number of unexpired records owned by a user.
    pub async fn count_by_user(&self, user_id: i64) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM refresh_tokens WHERE user_id = ? AND expires_at > datetime('now')",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count.0)
    }
}
