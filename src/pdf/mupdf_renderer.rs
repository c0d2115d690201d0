//! MuPDF-backed rasterizer
//!
//! Opens a fresh document per call, so no MuPDF state is shared between
//! worker threads.

use std::path::Path;

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use mupdf::{Colorspace, Document, Matrix};

use super::rasterizer::{RasterError, Rasterizer};

impl From<mupdf::Error> for RasterError {
    fn from(err: mupdf::Error) -> Self {
        RasterError::Render(err.to_string())
    }
}

/// Renders pages with MuPDF and encodes them as PNG
#[derive(Debug, Clone)]
pub struct MupdfRasterizer {
    scale: f32,
}

impl MupdfRasterizer {
    pub fn new(scale: f32) -> Self {
        Self {
            scale: scale.clamp(0.1, 8.0),
        }
    }

    fn open(pdf: &Path) -> Result<Document, RasterError> {
        let path = pdf.to_string_lossy();
        Document::open(&*path).map_err(|e| RasterError::Open(e.to_string()))
    }
}

impl Rasterizer for MupdfRasterizer {
    fn page_count(&self, pdf: &Path) -> Result<usize, RasterError> {
        let doc = Self::open(pdf)?;
        let count = doc.page_count()?;
        Ok(count.max(0) as usize)
    }

    fn render_page(&self, pdf: &Path, page: usize) -> Result<Vec<u8>, RasterError> {
        let doc = Self::open(pdf)?;
        let count = doc.page_count()?.max(0) as usize;
        if page >= count {
            return Err(RasterError::PageOutOfRange { page, count });
        }

        let page = doc.load_page(page as i32)?;
        let matrix = Matrix::new_scale(self.scale, self.scale);
        let colorspace = Colorspace::device_rgb();
        let pixmap = page.to_pixmap(&matrix, &colorspace, true, true)?;

        encode_png(&pixmap)
    }
}

fn encode_png(pixmap: &mupdf::Pixmap) -> Result<Vec<u8>, RasterError> {
    samples_to_png(
        pixmap.width() as u32,
        pixmap.height() as u32,
        pixmap.n() as usize,
        pixmap.samples(),
    )
}

/// PNG-encode tightly packed 8-bit samples with `components` channels per pixel.
fn samples_to_png(width: u32, height: u32, components: usize, samples: &[u8]) -> Result<Vec<u8>, RasterError> {
    let color = match components {
        1 => ExtendedColorType::L8,
        2 => ExtendedColorType::La8,
        3 => ExtendedColorType::Rgb8,
        4 => ExtendedColorType::Rgba8,
        n => return Err(RasterError::Image(format!("Unsupported pixmap with {} components", n))),
    };

    let len = (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(components))
        .ok_or_else(|| RasterError::Image(format!("Pixmap {}x{} is too large", width, height)))?;
    let pixels = samples.get(..len).ok_or_else(|| {
        RasterError::Image(format!("Pixmap has {} bytes, expected {}", samples.len(), len))
    })?;

    let mut output = Vec::new();
    PngEncoder::new(&mut output)
        .write_image(pixels, width, height, color)
        .map_err(|e| RasterError::Image(e.to_string()))?;
    Ok(output)
}
