//! Credential checks against the catalog

use std::sync::Arc;

use sqlx::SqlitePool;
use thiserror::Error;

use super::password::PasswordHasher;
use crate::db::{CatalogError, User, UserRepository};
use crate::pool::{PoolError, WorkerPool};

/// Longest accepted account name, in characters
const MAX_NAME_LEN: usize = 64;

#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown user or wrong password; callers can't tell which
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Name already taken: {0}")]
    NameTaken(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Password workers unavailable: {0}")]
    Busy(PoolError),

    #[error("Password hashing failed: {0}")]
    Hash(String),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

impl From<PoolError> for AuthError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Join(msg) => AuthError::Hash(msg),
            other => AuthError::Busy(other),
        }
    }
}

/// Verifies and registers accounts
#[derive(Clone)]
pub struct CredentialGate {
    db: SqlitePool,
    pool: WorkerPool,
    hasher: Arc<dyn PasswordHasher>,
}

impl CredentialGate {
    pub fn new(db: SqlitePool, pool: WorkerPool, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self { db, pool, hasher }
    }

    /// Check a name/password pair and return the matching user.
    pub async fn verify(&self, name: &str, password: &str) -> Result<User, AuthError> {
        let name = account_name(name);
        let Some(user) = UserRepository::new(&self.db).find_by_name(name).await? else {
            tracing::info!(name = %name, "Login failed: unknown user");
            return Err(AuthError::InvalidCredentials);
        };

        let hasher = self.hasher.clone();
        let password = password.to_owned();
        let hashed = user.hashed_password.clone();
        let matches = self.pool.run(move || hasher.verify(&password, &hashed)).await??;

        if !matches {
            tracing::info!(name = %name, user_id = user.id, "Login failed: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        tracing::debug!(user_id = user.id, "Credentials verified");
        Ok(user)
    }

    /// Create an account. The password is hashed on the worker pool.
    pub async fn register(&self, name: &str, password: &str) -> Result<User, AuthError> {
        let name = account_name(name);
        if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
            return Err(AuthError::InvalidInput(format!(
                "name must be 1 to {} characters",
                MAX_NAME_LEN
            )));
        }
        if password.is_empty() {
            return Err(AuthError::InvalidInput("password must not be empty".into()));
        }

        let hasher = self.hasher.clone();
        let password = password.to_owned();
        let hashed = self.pool.run(move || hasher.hash(&password)).await??;

        let user = UserRepository::new(&self.db)
            .create(name, &hashed)
            .await
            .map_err(|e| match e {
                CatalogError::Conflict(_) => AuthError::NameTaken(name.to_string()),
                other => AuthError::Catalog(other),
            })?;

        tracing::info!(user_id = user.id, name = %user.name, "Account created");
        Ok(user)
    }
}

/// Account names are compared without surrounding whitespace
fn account_name(raw: &str) -> &str {
    raw.trim()
}
