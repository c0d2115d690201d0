//! User database operations

use serde::Serialize;
use sqlx::SqlitePool;

use super::Result;

/// User record
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing)]
    pub hashed_password: String,
    pub created_at: String,
}

/// User repository
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a user. A taken name is a `CatalogError::Conflict`.
    pub async fn create(&self, name: &str, hashed_password: &str) -> Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, hashed_password)
            VALUES (?, ?)
            RETURNING id, name, hashed_password, created_at
            "#,
        )
        .bind(name)
        .bind(hashed_password)
        .fetch_one(self.pool)
        .await?;

        Ok(user)
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, hashed_password, created_at
            FROM users
            WHERE name = ?
            "#,
        )
        .bind(name)
        .fetch_optional(self.pool)
        .await?;

        Ok(user)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, hashed_password, created_at
            FROM users
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{test_support, CatalogError};

    #[tokio::test]
    async fn test_create_and_find_user() {
        let (_dir, pool) = test_support::pool().await;
        let repo = UserRepository::new(&pool);

        let alice = repo.create("alice", "hash").await.unwrap();
        assert_eq!(alice.name, "alice");

        let found = repo.find_by_name("alice").await.unwrap().unwrap();
        assert_eq!(found.id, alice.id);
        assert_eq!(repo.find_by_id(alice.id).await.unwrap().unwrap().name, "alice");
    }

    #[tokio::test]
    async fn test_duplicate_name_conflicts() {
        let (_dir, pool) = test_support::pool().await;
        let repo = UserRepository::new(&pool);

        repo.create("alice", "hash").await.unwrap();
        let result = repo.create("alice", "other").await;
        assert!(matches!(result, Err(CatalogError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_names_are_case_sensitive() {
        let (_dir, pool) = test_support::pool().await;
        let repo = UserRepository::new(&pool);

        repo.create("alice", "hash").await.unwrap();
        repo.create("Alice", "hash").await.unwrap();
        assert!(repo.find_by_name("ALICE").await.unwrap().is_none());
    }
}
