//! PDF page rendering
//!
//! Rasterizes PDF pages with MuPDF and keeps the results in an on-disk
//! page cache.

mod cache;
mod mupdf_renderer;
mod rasterizer;

pub use cache::{clamp_page, PageKey, PageLocation, RenderCache, RenderError, RenderedPage};
pub use mupdf_renderer::MupdfRasterizer;
pub use rasterizer::{RasterError, Rasterizer};
