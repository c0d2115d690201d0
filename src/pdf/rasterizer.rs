//! PDF collaborator interface
//!
//! Probing and rasterizing are synchronous and CPU-bound; callers run them on
//! the worker pool.

use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("Failed to open PDF: {0}")]
    Open(String),

    #[error("Page {page} out of range (document has {count} pages)")]
    PageOutOfRange { page: usize, count: usize },

    #[error("Render error: {0}")]
    Render(String),

    #[error("Image error: {0}")]
    Image(String),
}

/// Converts PDF pages to images.
pub trait Rasterizer: Send + Sync + 'static {
    /// Number of pages in the PDF at `pdf`
    fn page_count(&self, pdf: &Path) -> Result<usize, RasterError>;

    /// Render page `page` (0-based) of the PDF at `pdf` as PNG bytes
    fn render_page(&self, pdf: &Path, page: usize) -> Result<Vec<u8>, RasterError>;
}
