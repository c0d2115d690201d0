//! Database schema initialization

use sqlx::SqlitePool;

use super::Result;

/// Initialize the database schema
pub async fn initialize_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(SCHEMA_SQL).execute(pool).await?;

    Ok(())
}

const SCHEMA_SQL: &str = r#"
-- Users (names are case-sensitive: default BINARY collation)
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    hashed_password TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Uploaded documents
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY,
    -- Storage handle; a duplicate aborts the insert
    opaque_name TEXT NOT NULL UNIQUE,
    owner_id INTEGER NOT NULL REFERENCES users (id),
    original_filename TEXT NOT NULL,
    -- -1 until the page count is known
    page_count INTEGER NOT NULL DEFAULT -1,
    published_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_documents_published_at ON documents(published_at);
CREATE INDEX IF NOT EXISTS idx_documents_owner_id ON documents(owner_id);
"#;
