//! Bearer sessions
//!
//! Tokens are random UUIDs handed to the client once. Only their SHA-256
//! digest is kept, so the table never holds a usable token.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::db::UserRepository;
use crate::error::AppError;
use crate::state::AppState;

/// In-memory table of live sessions
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, i64>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a session for `user_id` and return its bearer token.
    pub fn issue(&self, user_id: i64) -> String {
        let token = Uuid::new_v4().simple().to_string();
        self.sessions.write().insert(digest(&token), user_id);
        token
    }

    /// User the token belongs to, if the session is live
    pub fn resolve(&self, token: &str) -> Option<i64> {
        self.sessions.read().get(&digest(token)).copied()
    }

    /// End a session. Returns false if there was none.
    pub fn revoke(&self, token: &str) -> bool {
        self.sessions.write().remove(&digest(token)).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Bearer token from the `Authorization` header. The scheme is case-insensitive.
pub(crate) fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| {
            if v.len() > 7 && v[..7].eq_ignore_ascii_case("bearer ") {
                Some(v[7..].trim())
            } else {
                None
            }
        })
}

/// The user behind a valid bearer token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub name: String,
    pub token: String,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AppError::Unauthenticated)?;
        let user_id = state.sessions().resolve(token).ok_or(AppError::Unauthenticated)?;

        let user = UserRepository::new(state.db())
            .find_by_id(user_id)
            .await?
            .ok_or(AppError::Unauthenticated)?;

        Ok(AuthUser {
            id: user.id,
            name: user.name,
            token: token.to_string(),
        })
    }
}
