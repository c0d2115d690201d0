//! Blob download routes
//!
//! Endpoints:
//! - GET /storage/pdf/:id - Original PDF
//! - GET /storage/pdf/pages/:id/:page - Rendered page, redirects to the
//!   fallback URL on any failure
//!
//! Bodies are streamed from disk one chunk at a time. `Content-Length` comes
//! from the blob size and is known before the first chunk is sent.

use std::io;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use bytes::Bytes;
use futures::channel::mpsc;
use futures::SinkExt;

use crate::db::DocumentRepository;
use crate::error::{AppError, Result};
use crate::state::AppState;
use crate::storage::{stream, BlobStore, StreamError};

const PDF_CONTENT_TYPE: &str = "application/pdf";
const PAGE_CONTENT_TYPE: &str = "application/png";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/pdf/:id", get(download_original))
        .route("/pdf/pages/:id/:page", get(download_page))
}

/// GET /storage/pdf/:id
async fn download_original(State(state): State<AppState>, Path(id): Path<String>) -> Result<Response> {
    let document = DocumentRepository::new(state.db())
        .find_by_name(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(id.clone()))?;

    let disposition = format!(
        "inline; filename*=UTF-8''{}",
        urlencoding::encode(&document.original_filename)
    );

    streamed_response(
        &state,
        state.originals(),
        &document.opaque_name,
        PDF_CONTENT_TYPE,
        Some(disposition),
    )
    .await
}

/// GET /storage/pdf/pages/:id/:page
async fn download_page(State(state): State<AppState>, Path((id, page)): Path<(String, String)>) -> Response {
    match serve_page(&state, &id, &page).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(
                opaque_name = %id,
                page = %page,
                error = %e,
                "Page unavailable, redirecting to fallback"
            );
            Redirect::to(&state.config().render.fallback_url).into_response()
        }
    }
}

async fn serve_page(state: &AppState, id: &str, page: &str) -> Result<Response> {
    let page: i64 = page
        .parse()
        .map_err(|_| AppError::BadRequest(format!("Invalid page number: {}", page)))?;

    let cache = state.render_cache();
    let location = cache.locate_page(id, page).await?;

    streamed_response(state, cache.pages(), &location.key.blob_id(), PAGE_CONTENT_TYPE, None).await
}

/// Response streaming blob `id` from `store`.
///
/// Size and open failures surface as errors before any response is built.
async fn streamed_response(
    state: &AppState,
    store: &BlobStore,
    id: &str,
    content_type: &'static str,
    disposition: Option<String>,
) -> Result<Response> {
    let size = store.size(id).await?;
    let file = store.open(id).await?;

    let body = stream_body(file, state.config().storage.chunk_size, id.to_string());

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_LENGTH, size);
    if let Some(disposition) = disposition {
        builder = builder.header(header::CONTENT_DISPOSITION, disposition);
    }

    builder.body(body).map_err(|e| AppError::Internal(e.to_string()))
}

/// Body fed by a task that streams `file` through a bounded channel.
///
/// The task stops when the client goes away and the channel closes.
fn stream_body(file: tokio::fs::File, chunk_size: usize, id: String) -> Body {
    let (mut tx, rx) = mpsc::channel::<std::result::Result<Bytes, io::Error>>(1);

    tokio::spawn(async move {
        match stream(file, chunk_size, &mut tx).await {
            Ok(sent) => tracing::debug!(id = %id, bytes = sent, "Stream complete"),
            Err(StreamError::SinkClosed { sent }) => {
                tracing::info!(id = %id, bytes = sent, "Client disconnected mid-stream");
            }
            Err(StreamError::Read { sent, source }) => {
                tracing::error!(id = %id, bytes = sent, error = %source, "Read failed mid-stream");
                // Aborts the body so the client sees a truncated transfer
                let _ = tx.send(Err(source)).await;
            }
        }
    });

    Body::from_stream(rx)
}
