//! Route modules for the Folio server

pub mod auth;
pub mod documents;
pub mod health;
pub mod storage;
pub mod upload;

use axum::Router;

use crate::state::AppState;

/// Build the application router
pub fn router(state: AppState) -> Router {
    let max_upload_bytes = state.config().storage.max_upload_bytes;

    Router::new()
        .merge(health::router())
        .nest("/auth", auth::router())
        .nest("/api/documents", documents::router())
        .nest("/upload", upload::router(max_upload_bytes))
        .nest("/storage", storage::router())
        .with_state(state)
}
