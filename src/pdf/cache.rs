//! Rendered page cache
//!
//! Pages are rendered the first time they are requested and kept on disk in
//! the pages blob store as `<opaque_name><page>.png`. Documents never change,
//! so a rendered page never goes stale.
//!
//! Concurrent misses for the same page share one render: the first caller
//! registers a shared future in the in-flight map and later callers await the
//! same future. The render runs in its own spawned task, so a caller that
//! goes away (client disconnect) does not cancel a render other callers are
//! waiting on. The task deregisters the page once the outcome is known.
//! Failures are not remembered, so the next request renders again.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use sqlx::SqlitePool;
use thiserror::Error;

use super::rasterizer::{RasterError, Rasterizer};
use crate::db::{CatalogError, DocumentRepository};
use crate::pool::{PoolError, WorkerPool};
use crate::storage::{BlobStore, StorageError};

/// Render errors
///
/// Cloneable because one outcome is handed to every waiter of a shared render.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Source PDF missing for document {0}")]
    SourceMissing(String),

    #[error("Rasterization failed: {0}")]
    Renderer(String),

    #[error("Render workers unavailable: {0}")]
    Busy(PoolError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Catalog error: {0}")]
    Catalog(String),
}

impl From<StorageError> for RenderError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(id) => RenderError::NotFound(id),
            other => RenderError::Storage(other.to_string()),
        }
    }
}

impl From<CatalogError> for RenderError {
    fn from(err: CatalogError) -> Self {
        RenderError::Catalog(err.to_string())
    }
}

impl From<RasterError> for RenderError {
    fn from(err: RasterError) -> Self {
        RenderError::Renderer(err.to_string())
    }
}

impl From<PoolError> for RenderError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Join(msg) => RenderError::Renderer(msg),
            other => RenderError::Busy(other),
        }
    }
}

/// Cache key: a document and a clamped page index
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct PageKey {
    pub opaque_name: String,
    pub page: usize,
}

impl PageKey {
    /// Identifier of the rendered page in the pages blob store
    pub fn blob_id(&self) -> String {
        format!("{}{}", self.opaque_name, self.page)
    }
}

/// A rendered page and where it sits in its document
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub page: usize,
    pub page_count: i64,
    pub data: Bytes,
}

/// A rendered page known to be on disk
#[derive(Debug, Clone)]
pub struct PageLocation {
    pub key: PageKey,
    pub page_count: i64,
    /// Display name of the document the page belongs to
    pub original_filename: String,
}

/// Clamp a requested page into `[0, page_count - 1]`.
///
/// An unknown page count (`-1`) only clamps the lower bound. A document with
/// zero pages has nothing to render.
pub fn clamp_page(requested: i64, page_count: i64) -> Option<usize> {
    match page_count {
        0 => None,
        n if n > 0 => Some(requested.clamp(0, n - 1) as usize),
        _ => Some(requested.max(0) as usize),
    }
}

type SharedRender = Shared<BoxFuture<'static, Result<Bytes, RenderError>>>;

/// On-disk page cache with per-page render deduplication
#[derive(Clone)]
pub struct RenderCache {
    inner: Arc<RenderCacheInner>,
}

struct RenderCacheInner {
    db: SqlitePool,
    originals: BlobStore,
    pages: BlobStore,
    rasterizer: Arc<dyn Rasterizer>,
    pool: WorkerPool,
    in_flight: Mutex<HashMap<PageKey, SharedRender>>,
    rendered: AtomicUsize,
}

impl RenderCache {
    pub fn new(
        db: SqlitePool,
        originals: BlobStore,
        pages: BlobStore,
        rasterizer: Arc<dyn Rasterizer>,
        pool: WorkerPool,
    ) -> Self {
        Self {
            inner: Arc::new(RenderCacheInner {
                db,
                originals,
                pages,
                rasterizer,
                pool,
                in_flight: Mutex::new(HashMap::new()),
                rendered: AtomicUsize::new(0),
            }),
        }
    }

    /// Image bytes for `page` of document `opaque_name`, rendering on first use.
    pub async fn get_page(&self, opaque_name: &str, page: i64) -> Result<RenderedPage, RenderError> {
        let location = self.resolve(opaque_name, page).await?;

        let data = match self.inner.pages.read(&location.key.blob_id()).await {
            Ok(data) => data,
            Err(e) if e.is_not_found() => self.join_or_start(&location.key).await?,
            Err(e) => return Err(e.into()),
        };

        Ok(RenderedPage {
            page: location.key.page,
            page_count: location.page_count,
            data,
        })
    }

    /// Make sure the page is rendered and return where it is stored.
    ///
    /// Used by download paths that stream the page from disk themselves.
    pub async fn locate_page(&self, opaque_name: &str, page: i64) -> Result<PageLocation, RenderError> {
        let location = self.resolve(opaque_name, page).await?;

        if !self.inner.pages.exists(&location.key.blob_id()).await? {
            self.join_or_start(&location.key).await?;
        }

        Ok(location)
    }

    /// The store rendered pages are written to
    pub fn pages(&self) -> &BlobStore {
        &self.inner.pages
    }

    /// Renders completed by this cache since startup
    pub fn rendered_count(&self) -> usize {
        self.inner.rendered.load(Ordering::Relaxed)
    }

    /// Pages currently being rendered
    pub fn in_flight_count(&self) -> usize {
        self.inner.in_flight.lock().len()
    }

    async fn resolve(&self, opaque_name: &str, page: i64) -> Result<PageLocation, RenderError> {
        let document = DocumentRepository::new(&self.inner.db)
            .find_by_name(opaque_name)
            .await?
            .ok_or_else(|| RenderError::NotFound(opaque_name.to_string()))?;

        let page = clamp_page(page, document.page_count)
            .ok_or_else(|| RenderError::NotFound(format!("{} has no pages", opaque_name)))?;

        Ok(PageLocation {
            key: PageKey {
                opaque_name: document.opaque_name,
                page,
            },
            page_count: document.page_count,
            original_filename: document.original_filename,
        })
    }

    /// Await the in-flight render for `key`, starting one if there is none.
    fn join_or_start(&self, key: &PageKey) -> SharedRender {
        let mut in_flight = self.inner.in_flight.lock();
        if let Some(pending) = in_flight.get(key) {
            tracing::debug!(opaque_name = %key.opaque_name, page = key.page, "Joining in-flight render");
            return pending.clone();
        }

        // The task deregisters under this same lock, so it cannot remove the
        // entry before it is inserted below
        let handle = tokio::spawn(render_task(self.inner.clone(), key.clone()));
        let pending = async move {
            handle
                .await
                .unwrap_or_else(|e| Err(RenderError::Renderer(format!("Render task failed: {}", e))))
        }
        .boxed()
        .shared();

        in_flight.insert(key.clone(), pending.clone());
        pending
    }
}

async fn render_task(inner: Arc<RenderCacheInner>, key: PageKey) -> Result<Bytes, RenderError> {
    let result = render_and_store(&inner, &key).await;
    inner.in_flight.lock().remove(&key);

    if let Err(e) = &result {
        tracing::warn!(
            opaque_name = %key.opaque_name,
            page = key.page,
            error = %e,
            "Page render failed"
        );
    }
    result
}

async fn render_and_store(inner: &RenderCacheInner, key: &PageKey) -> Result<Bytes, RenderError> {
    let blob_id = key.blob_id();

    // Another render may have finished between the caller's check and registration
    match inner.pages.read(&blob_id).await {
        Ok(data) => return Ok(data),
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(e.into()),
    }

    let source = inner.originals.path(&key.opaque_name)?;
    if !inner.originals.exists(&key.opaque_name).await? {
        return Err(RenderError::SourceMissing(key.opaque_name.clone()));
    }

    let started = Instant::now();
    let rasterizer = inner.rasterizer.clone();
    let page = key.page;
    let png = inner
        .pool
        .run(move || rasterizer.render_page(&source, page))
        .await??;

    // Persist before any waiter sees the bytes
    match inner.pages.put(&blob_id, &png).await {
        Ok(()) | Err(StorageError::Conflict(_)) => {}
        Err(e) => return Err(e.into()),
    }
    inner.rendered.fetch_add(1, Ordering::Relaxed);

    tracing::info!(
        opaque_name = %key.opaque_name,
        page = key.page,
        bytes = png.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Page rendered"
    );

    Ok(Bytes::from(png))
}
