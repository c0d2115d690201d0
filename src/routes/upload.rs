//! Upload route
//!
//! POST /upload - multipart form with a `file` field, bearer token required

use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};

use crate::auth::AuthUser;
use crate::db::Document;
use crate::error::{AppError, Result};
use crate::state::AppState;
use crate::upload::Upload;

/// Name of the multipart field carrying the PDF
const FILE_FIELD: &str = "file";

pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/", post(upload))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

/// POST /upload
async fn upload(
    State(state): State<AppState>,
    user: AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Document>)> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(multipart_error)?;

        tracing::info!(
            user_id = user.id,
            filename = %filename,
            content_type = ?content_type,
            bytes = bytes.len(),
            "Upload received"
        );

        let document = state
            .ingestor()
            .accept(Upload {
                bytes,
                filename,
                content_type,
                owner_id: user.id,
            })
            .await?;

        return Ok((StatusCode::CREATED, Json(document)));
    }

    Err(AppError::BadRequest(format!("Missing '{}' field", FILE_FIELD)))
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::BadRequest(err.body_text())
    }
}
