//! Common test utilities and fixtures.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use bytes::Bytes;
use folio_server::auth::BcryptHasher;
use folio_server::config::Config;
use folio_server::db;
use folio_server::pdf::{RasterError, Rasterizer};
use folio_server::routes;
use folio_server::state::AppState;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

pub const FALLBACK_URL: &str = "/fallback.png";
pub const BOUNDARY: &str = "folio-test-boundary";

/// Stands in for MuPDF.
///
/// A "PDF" is any file starting with `%PDF`; its page count is the number
/// after `pages=`. Page `n` renders as `png:<file name>:<n>`.
#[derive(Default)]
pub struct FakeRasterizer {
    pub renders: AtomicUsize,
}

impl FakeRasterizer {
    pub fn render_count(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }
}

impl Rasterizer for FakeRasterizer {
    fn page_count(&self, pdf: &Path) -> Result<usize, RasterError> {
        let data = std::fs::read(pdf).map_err(|e| RasterError::Open(e.to_string()))?;
        let text = String::from_utf8_lossy(&data);
        if !text.starts_with("%PDF") {
            return Err(RasterError::Open("missing PDF header".into()));
        }
        text.split("pages=")
            .nth(1)
            .and_then(|rest| rest.split_whitespace().next())
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| RasterError::Open("no page count".into()))
    }

    fn render_page(&self, pdf: &Path, page: usize) -> Result<Vec<u8>, RasterError> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        let name = pdf
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(format!("png:{}:{}", name, page).into_bytes())
    }
}

/// A fake PDF with `pages` pages, padded to at least `len` bytes
pub fn fake_pdf(pages: usize, len: usize) -> Vec<u8> {
    let mut data = format!("%PDF-1.4 pages={} \n", pages).into_bytes();
    let mut filler = 0u8;
    while data.len() < len {
        data.push(b'a' + filler % 26);
        filler = filler.wrapping_add(1);
    }
    data
}

/// Router over a fresh database and blob directories
pub struct TestServer {
    _dir: TempDir,
    pub router: Router,
    pub state: AppState,
    pub rasterizer: Arc<FakeRasterizer>,
}

impl TestServer {
    pub async fn new() -> Self {
        Self::with_chunk_size(7).await
    }

    pub async fn with_chunk_size(chunk_size: usize) -> Self {
        let dir = TempDir::new().unwrap();

        let mut config = Config::default();
        config.database.url = format!("sqlite://{}", dir.path().join("catalog.sqlite3").display());
        config.storage.originals_dir = dir.path().join("pdf");
        config.storage.pages_dir = dir.path().join("pages");
        config.storage.chunk_size = chunk_size;
        config.render.fallback_url = FALLBACK_URL.to_string();
        config.auth.bcrypt_cost = 4;

        let pool = db::create_pool(&config.database.url, 2).await.unwrap();
        let rasterizer = Arc::new(FakeRasterizer::default());
        let hasher = Arc::new(BcryptHasher::new(config.auth.bcrypt_cost));

        let state = AppState::new(config, pool, rasterizer.clone(), hasher).await.unwrap();
        let router = routes::router(state.clone());

        Self {
            _dir: dir,
            router,
            state,
            rasterizer,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Send a request and collect the whole body
    pub async fn send_collect(&self, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Bytes) {
        let response = self.send(request).await;
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, body)
    }

    pub async fn json(&self, method: &str, uri: &str, body: Option<Value>, token: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let body = match body {
            Some(v) => {
                builder = builder.header("Content-Type", "application/json");
                Body::from(serde_json::to_vec(&v).unwrap())
            }
            None => Body::empty(),
        };

        let (status, _, bytes) = self.send_collect(builder.body(body).unwrap()).await;
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, axum::http::HeaderMap, Bytes) {
        self.send_collect(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    /// Create an account and return its bearer token
    pub async fn register(&self, name: &str, password: &str) -> String {
        let (status, body) = self
            .json(
                "POST",
                "/auth/create",
                Some(json!({ "name": name, "password": password })),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
        body["token"].as_str().unwrap().to_string()
    }

    pub async fn upload(
        &self,
        token: Option<&str>,
        filename: &str,
        content_type: &str,
        data: &[u8],
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/upload")
            .header("Content-Type", format!("multipart/form-data; boundary={}", BOUNDARY));
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        let request = builder
            .body(Body::from(multipart_body(filename, content_type, data)))
            .unwrap();

        let (status, _, bytes) = self.send_collect(request).await;
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }
}

/// A multipart form with a single `file` field
pub fn multipart_body(filename: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
            filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}
