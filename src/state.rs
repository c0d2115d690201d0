//! Application state management

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::auth::{CredentialGate, PasswordHasher, SessionStore};
use crate::config::Config;
use crate::pdf::{RenderCache, Rasterizer};
use crate::pool::WorkerPool;
use crate::storage::{BlobStore, StorageError};
use crate::upload::{Ingestor, NameGenerator, TimestampNameGenerator};

/// File extension of stored originals
pub const ORIGINAL_EXTENSION: &str = "pdf";

/// File extension of rendered pages
pub const PAGE_EXTENSION: &str = "png";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    db: SqlitePool,
    pool: WorkerPool,
    originals: BlobStore,
    render_cache: RenderCache,
    ingestor: Ingestor,
    gate: CredentialGate,
    sessions: SessionStore,
}

impl AppState {
    /// Create a new application state
    ///
    /// Creates the blob store directories if needed. One worker pool is
    /// shared by hashing, probing and rendering.
    pub async fn new(
        config: Config,
        db: SqlitePool,
        rasterizer: Arc<dyn Rasterizer>,
        hasher: Arc<dyn PasswordHasher>,
    ) -> Result<Self, StorageError> {
        Self::with_names(config, db, rasterizer, hasher, Arc::new(TimestampNameGenerator)).await
    }

    /// Like [`AppState::new`], with a custom source of document names
    pub async fn with_names(
        config: Config,
        db: SqlitePool,
        rasterizer: Arc<dyn Rasterizer>,
        hasher: Arc<dyn PasswordHasher>,
        names: Arc<dyn NameGenerator>,
    ) -> Result<Self, StorageError> {
        let originals = BlobStore::new(&config.storage.originals_dir, ORIGINAL_EXTENSION).await?;
        let pages = BlobStore::new(&config.storage.pages_dir, PAGE_EXTENSION).await?;

        let pool = WorkerPool::new(
            config.workers.threads,
            config.workers.queue_depth,
            config.workers.submit_timeout(),
        );

        let render_cache = RenderCache::new(
            db.clone(),
            originals.clone(),
            pages,
            rasterizer.clone(),
            pool.clone(),
        );
        let ingestor = Ingestor::new(db.clone(), originals.clone(), rasterizer, pool.clone(), names);
        let gate = CredentialGate::new(db.clone(), pool.clone(), hasher);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                db,
                pool,
                originals,
                render_cache,
                ingestor,
                gate,
                sessions: SessionStore::new(),
            }),
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the database pool
    pub fn db(&self) -> &SqlitePool {
        &self.inner.db
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.inner.pool
    }

    /// Store of uploaded PDFs
    pub fn originals(&self) -> &BlobStore {
        &self.inner.originals
    }

    pub fn render_cache(&self) -> &RenderCache {
        &self.inner.render_cache
    }

    pub fn ingestor(&self) -> &Ingestor {
        &self.inner.ingestor
    }

    pub fn gate(&self) -> &CredentialGate {
        &self.inner.gate
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.inner.sessions
    }
}
