use serde::Serialize;
use sqlx::sqlite::SqlitePool;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub id: i64,
    pub name: String,
    pub address: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Clone)]
pub struct TenantStore {
    pool: SqlitePool,
}

impl TenantStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a tenant. Returns the tenant ID.
    pub async fn create(&self, name: &str, address: &str) -> Result<i64, sqlx::Error> {
        let result = sqlx::query("INSERT INTO tenants (name, address) VALUES (?, ?)")
            .bind(name)
            .bind(address)
            .execute(&self.pool)
            .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn list(&self) -> Result<Vec<Tenant>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, name, address, created_at, updated_at FROM tenants ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Tenant>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, name, address, created_at, updated_at FROM tenants WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn exists(&self, id: i64) -> Result<bool, sqlx::Error> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tenants WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0 > 0)
    }

    /// Returns false if the tenant does not exist.
    pub async fn update(&self, id: i64, name: &str, address: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tenants SET name = ?, address = ?, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(name)
        .bind(address)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a tenant. Users belonging to it are detached, not deleted.
    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tenants WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
