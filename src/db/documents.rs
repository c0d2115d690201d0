//! Document database operations

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

use super::Result;

/// Page count recorded when the document could not be counted
pub const UNKNOWN_PAGE_COUNT: i64 = -1;

/// Document record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: i64,
    pub opaque_name: String,
    pub owner_id: i64,
    pub original_filename: String,
    pub page_count: i64,
    pub published_at: String,
}

/// Document joined with its owner's name, for listings
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DocumentListing {
    pub id: i64,
    pub opaque_name: String,
    pub original_filename: String,
    pub page_count: i64,
    pub published_at: String,
    pub owner_id: i64,
    pub owner_name: String,
}

/// Fields supplied when recording an ingested document
#[derive(Debug, Clone)]
pub struct NewDocument<'a> {
    pub opaque_name: &'a str,
    pub owner_id: i64,
    pub original_filename: &'a str,
    pub page_count: i64,
}

/// Document repository
pub struct DocumentRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> DocumentRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a document row.
    ///
    /// Runs in its own transaction; a duplicate `opaque_name` rolls it back and
    /// surfaces as `CatalogError::Conflict`.
    pub async fn insert(&self, new: &NewDocument<'_>) -> Result<Document> {
        let published_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        let mut tx = self.pool.begin().await?;

        let document = sqlx::query_as::<_, Document>(
            r#"
            INSERT INTO documents (opaque_name, owner_id, original_filename, page_count, published_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id, opaque_name, owner_id, original_filename, page_count, published_at
            "#,
        )
        .bind(new.opaque_name)
        .bind(new.owner_id)
        .bind(new.original_filename)
        .bind(new.page_count)
        .bind(&published_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(document)
    }

    /// Look up a document by its opaque name
    pub async fn find_by_name(&self, opaque_name: &str) -> Result<Option<Document>> {
        let document = sqlx::query_as::<_, Document>(
            r#"
            SELECT id, opaque_name, owner_id, original_filename, page_count, published_at
            FROM documents
            WHERE opaque_name = ?
            "#,
        )
        .bind(opaque_name)
        .fetch_optional(self.pool)
        .await?;

        Ok(document)
    }

    /// All documents with owner names, oldest first
    pub async fn list(&self) -> Result<Vec<DocumentListing>> {
        let documents = sqlx::query_as::<_, DocumentListing>(
            r#"
            SELECT d.id, d.opaque_name, d.original_filename, d.page_count, d.published_at,
                   u.id AS owner_id, u.name AS owner_name
            FROM documents d
            JOIN users u ON u.id = d.owner_id
            ORDER BY d.published_at ASC, d.id ASC
            "#,
        )
        .fetch_all(self.pool)
        .await?;

        Ok(documents)
    }
}
