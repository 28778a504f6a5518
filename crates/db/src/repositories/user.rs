use async_trait::async_trait;
use sqlx::Row;

use curator_core::domain::user::{UserId, UserRecord};

use super::{RepositoryError, UserRepository};
use crate::DbPool;

pub struct SqlUserRepository {
    pool: DbPool,
}

impl SqlUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for SqlUserRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<UserRecord>, RepositoryError> {
        let row = sqlx::query("SELECT id, name FROM users WHERE id = ?1")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| UserRecord {
            id: UserId(row.get::<String, _>("id")),
            name: row.get::<Option<String>, _>("name"),
        }))
    }

    async fn save(&self, record: UserRecord) -> Result<UserId, RepositoryError> {
        sqlx::query(
            "INSERT INTO users (id, name) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, updated_at = datetime('now')",
        )
        .bind(&record.id.0)
        .bind(&record.name)
        .execute(&self.pool)
        .await?;

        Ok(record.id)
    }
}
