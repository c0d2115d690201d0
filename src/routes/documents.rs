//! Document catalog routes
//!
//! Endpoints:
//! - GET /api/documents - All documents with their owners, oldest first
//! - GET /api/documents/:id/pages/:page - Page view for one page of a document

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::db::{DocumentListing, DocumentRepository};
use crate::error::Result;
use crate::state::AppState;

/// What a client needs to show one page
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageView {
    /// Original filename of the document
    pub name: String,
    pub image_url: String,
    /// 1-based number of the page actually shown, after clamping
    pub page: usize,
    /// -1 when the page count could not be determined
    pub page_count: i64,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_documents))
        .route("/:id/pages/:page", get(page_view))
}

/// GET /api/documents
async fn list_documents(State(state): State<AppState>) -> Result<Json<Vec<DocumentListing>>> {
    let documents = DocumentRepository::new(state.db()).list().await?;
    Ok(Json(documents))
}

/// GET /api/documents/:id/pages/:page
///
/// `page` is a 0-based index and is clamped into the document. The page is
/// rendered now if it hasn't been yet.
async fn page_view(
    State(state): State<AppState>,
    Path((id, page)): Path<(String, i64)>,
) -> Result<Json<PageView>> {
    let location = state.render_cache().locate_page(&id, page).await?;

    Ok(Json(PageView {
        name: location.original_filename,
        image_url: format!("/storage/pdf/pages/{}/{}", id, location.key.page),
        page: location.key.page + 1,
        page_count: location.page_count,
    }))
}
