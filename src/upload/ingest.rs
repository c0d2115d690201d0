//! Ingestion pipeline
//!
//! Blob first, catalog row last: a document becomes visible only once its
//! bytes are durable on disk.

use std::sync::Arc;

use bytes::Bytes;
use sqlx::SqlitePool;
use thiserror::Error;

use super::names::NameGenerator;
use crate::db::{CatalogError, Document, DocumentRepository, NewDocument, UNKNOWN_PAGE_COUNT};
use crate::pdf::Rasterizer;
use crate::pool::{PoolError, WorkerPool};
use crate::storage::{BlobStore, StorageError};

/// The only content kind accepted for upload
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Display name for uploads that arrive without a filename
const UNTITLED: &str = "untitled.pdf";

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Unsupported content kind: {0}")]
    UnsupportedKind(String),

    /// Generated name already taken; the client should retry
    #[error("Storage conflict for {0}, retry")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Catalog error: {0}")]
    Catalog(CatalogError),

    /// No worker could count the pages; nothing was recorded
    #[error("Ingest workers unavailable: {0}")]
    Busy(PoolError),
}

/// One file received at the upload boundary
#[derive(Debug, Clone)]
pub struct Upload {
    pub bytes: Bytes,
    pub filename: String,
    pub content_type: Option<String>,
    pub owner_id: i64,
}

/// Stores uploaded PDFs and records them in the catalog
#[derive(Clone)]
pub struct Ingestor {
    db: SqlitePool,
    originals: BlobStore,
    rasterizer: Arc<dyn Rasterizer>,
    pool: WorkerPool,
    names: Arc<dyn NameGenerator>,
}

impl Ingestor {
    pub fn new(
        db: SqlitePool,
        originals: BlobStore,
        rasterizer: Arc<dyn Rasterizer>,
        pool: WorkerPool,
        names: Arc<dyn NameGenerator>,
    ) -> Self {
        Self {
            db,
            originals,
            rasterizer,
            pool,
            names,
        }
    }

    /// Check the content kind of an upload and ingest it.
    pub async fn accept(&self, upload: Upload) -> Result<Document, IngestError> {
        let content_type = upload.content_type.unwrap_or_default();
        if !is_pdf(&content_type) {
            tracing::info!(
                filename = %upload.filename,
                content_type = %content_type,
                "Rejected upload of unsupported kind"
            );
            return Err(IngestError::UnsupportedKind(content_type));
        }

        let display_name = match upload.filename.trim() {
            "" => UNTITLED,
            name => name,
        };
        self.ingest(upload.bytes, display_name, upload.owner_id).await
    }

    /// Store `bytes` under a fresh opaque name and record the document.
    pub async fn ingest(&self, bytes: Bytes, display_name: &str, owner_id: i64) -> Result<Document, IngestError> {
        let opaque_name = self.names.generate();

        self.originals.put(&opaque_name, &bytes).await.map_err(|e| match e {
            StorageError::Conflict(id) => IngestError::Conflict(id),
            other => IngestError::Storage(other),
        })?;

        let page_count = self.count_pages(&opaque_name).await?;

        let document = DocumentRepository::new(&self.db)
            .insert(&NewDocument {
                opaque_name: &opaque_name,
                owner_id,
                original_filename: display_name,
                page_count,
            })
            .await
            .map_err(|e| match e {
                CatalogError::Conflict(_) => IngestError::Conflict(opaque_name.clone()),
                other => IngestError::Catalog(other),
            })?;

        tracing::info!(
            opaque_name = %document.opaque_name,
            filename = %document.original_filename,
            owner_id,
            pages = document.page_count,
            bytes = bytes.len(),
            "Document ingested"
        );

        Ok(document)
    }

    /// Page count of a stored original, or `UNKNOWN_PAGE_COUNT` if the PDF
    /// can't be read. An overloaded pool is an error, not an unreadable PDF.
    async fn count_pages(&self, opaque_name: &str) -> Result<i64, IngestError> {
        let path = self.originals.path(opaque_name)?;
        let rasterizer = self.rasterizer.clone();

        let error = match self.pool.run(move || rasterizer.page_count(&path)).await {
            Ok(Ok(count)) => return Ok(count as i64),
            Ok(Err(e)) => e.to_string(),
            // The rasterizer panicked on this file
            Err(PoolError::Join(msg)) => msg,
            Err(e) => {
                tracing::warn!(opaque_name = %opaque_name, error = %e, "Page count rejected by worker pool");
                return Err(IngestError::Busy(e));
            }
        };

        tracing::warn!(
            opaque_name = %opaque_name,
            error = %error,
            "Page count failed, recording unknown page count"
        );
        Ok(UNKNOWN_PAGE_COUNT)
    }
}

fn is_pdf(content_type: &str) -> bool {
    let essence = content_type.split(';').next().unwrap_or_default().trim();
    essence.eq_ignore_ascii_case(PDF_CONTENT_TYPE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{test_support, UserRepository};
    use crate::pdf::RasterError;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    struct FixedPages(Option<usize>);

    impl Rasterizer for FixedPages {
        fn page_count(&self, _pdf: &Path) -> Result<usize, RasterError> {
            self.0.ok_or_else(|| RasterError::Open("not a PDF".into()))
        }

        fn render_page(&self, _pdf: &Path, _page: usize) -> Result<Vec<u8>, RasterError> {
            Err(RasterError::Render("unused".into()))
        }
    }

    struct SameName;

    impl NameGenerator for SameName {
        fn generate(&self) -> String {
            "fixedname".to_string()
        }
    }

    async fn setup(pages: Option<usize>, names: Arc<dyn NameGenerator>) -> (TempDir, TempDir, Ingestor, i64) {
        let dir = TempDir::new().unwrap();
        let (db_dir, db) = test_support::pool().await;
        let owner = UserRepository::new(&db).create("alice", "hash").await.unwrap();
        let originals = BlobStore::new(dir.path().join("pdf"), "pdf").await.unwrap();
        let ingestor = Ingestor::new(
            db,
            originals,
            Arc::new(FixedPages(pages)),
            WorkerPool::new(1, 4, Duration::from_secs(5)),
            names,
        );
        (dir, db_dir, ingestor, owner.id)
    }

    #[test]
    fn test_content_kind_check() {
        assert!(is_pdf("application/pdf"));
        assert!(is_pdf("Application/PDF"));
        assert!(is_pdf("application/pdf; charset=binary"));
        assert!(!is_pdf("image/png"));
        assert!(!is_pdf(""));
    }

    #[tokio::test]
    async fn test_ingest_stores_bytes_and_records_pages() {
        let (_dir, _db_dir, ingestor, owner) =
            setup(Some(3), Arc::new(crate::upload::TimestampNameGenerator)).await;
        let body = Bytes::from_static(b"%PDF-1.4 three pages");

        let doc = ingestor.ingest(body.clone(), "report.pdf", owner).await.unwrap();

        assert_eq!(doc.page_count, 3);
        assert_eq!(doc.original_filename, "report.pdf");
        assert_eq!(ingestor.originals.read(&doc.opaque_name).await.unwrap(), body);
    }

    #[tokio::test]
    async fn test_identical_uploads_get_distinct_names() {
        let (_dir, _db_dir, ingestor, owner) =
            setup(Some(1), Arc::new(crate::upload::TimestampNameGenerator)).await;
        let body = Bytes::from_static(b"%PDF-1.4 same");

        let a = ingestor.ingest(body.clone(), "a.pdf", owner).await.unwrap();
        let b = ingestor.ingest(body, "a.pdf", owner).await.unwrap();
        assert_ne!(a.opaque_name, b.opaque_name);
    }

    #[tokio::test]
    async fn test_unreadable_pdf_records_unknown_page_count() {
        let (_dir, _db_dir, ingestor, owner) = setup(None, Arc::new(SameName)).await;

        let doc = ingestor
            .ingest(Bytes::from_static(b"garbage"), "broken.pdf", owner)
            .await
            .unwrap();
        assert_eq!(doc.page_count, UNKNOWN_PAGE_COUNT);
    }

    #[tokio::test]
    async fn test_name_collision_conflicts_and_leaves_catalog_unchanged() {
        let (_dir, _db_dir, ingestor, owner) = setup(Some(2), Arc::new(SameName)).await;

        ingestor
            .ingest(Bytes::from_static(b"%PDF first"), "first.pdf", owner)
            .await
            .unwrap();
        let second = ingestor
            .ingest(Bytes::from_static(b"%PDF second"), "second.pdf", owner)
            .await;
        assert!(matches!(second, Err(IngestError::Conflict(_))));

        let listing = DocumentRepository::new(&ingestor.db).list().await.unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].original_filename, "first.pdf");
        assert_eq!(
            ingestor.originals.read("fixedname").await.unwrap(),
            Bytes::from_static(b"%PDF first")
        );
    }

    #[tokio::test]
    async fn test_saturated_pool_is_busy_and_records_nothing() {
        let dir = TempDir::new().unwrap();
        let (_db_dir, db) = test_support::pool().await;
        let owner = UserRepository::new(&db).create("alice", "hash").await.unwrap();
        let originals = BlobStore::new(dir.path().join("pdf"), "pdf").await.unwrap();
        let pool = WorkerPool::new(1, 0, Duration::from_millis(20));
        let ingestor = Ingestor::new(
            db,
            originals,
            Arc::new(FixedPages(Some(3))),
            pool.clone(),
            Arc::new(SameName),
        );

        let (release, hold) = std::sync::mpsc::channel::<()>();
        let blocker = tokio::spawn({
            let pool = pool.clone();
            async move { pool.run(move || hold.recv().ok()).await }
        });
        while pool.stats().active == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let result = ingestor
            .ingest(Bytes::from_static(b"%PDF valid"), "valid.pdf", owner.id)
            .await;
        assert!(matches!(result, Err(IngestError::Busy(PoolError::Busy))));

        let listing = DocumentRepository::new(&ingestor.db).list().await.unwrap();
        assert!(listing.is_empty());

        release.send(()).unwrap();
        blocker.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_accept_rejects_other_kinds() {
        let (_dir, _db_dir, ingestor, owner) = setup(Some(1), Arc::new(SameName)).await;

        let result = ingestor
            .accept(Upload {
                bytes: Bytes::from_static(b"\x89PNG"),
                filename: "photo.png".into(),
                content_type: Some("image/png".into()),
                owner_id: owner,
            })
            .await;
        assert!(matches!(result, Err(IngestError::UnsupportedKind(_))));
        assert!(!ingestor.originals.exists("fixedname").await.unwrap());
    }

    #[tokio::test]
    async fn test_accept_defaults_missing_filename() {
        let (_dir, _db_dir, ingestor, owner) = setup(Some(1), Arc::new(SameName)).await;

        let doc = ingestor
            .accept(Upload {
                bytes: Bytes::from_static(b"%PDF"),
                filename: "  ".into(),
                content_type: Some("APPLICATION/PDF".into()),
                owner_id: owner,
            })
            .await
            .unwrap();
        assert_eq!(doc.original_filename, UNTITLED);
    }
}
