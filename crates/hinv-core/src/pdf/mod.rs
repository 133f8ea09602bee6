//! Source documents and page rasterization.

mod extractor;
mod raster;

pub use extractor::PdfExtractor;
pub use raster::PdfRasterizer;
#[cfg(test)]
pub(crate) use raster::tests as raster_tests;

use std::path::Path;

use image::DynamicImage;
use tracing::debug;

use crate::error::{HinvError, PdfError};

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, PdfError>;

/// Turns a PDF into one raster image per page.
pub trait Rasterizer {
    /// Rasterize every page of the document, in page order.
    fn rasterize(&self, pdf: &[u8]) -> Result<Vec<DynamicImage>>;
}

/// A document handed to the pipeline.
#[derive(Debug, Clone)]
pub enum SourceDocument {
    /// Raw PDF bytes, rasterized on demand.
    Pdf(Vec<u8>),
    /// Pre-rendered page images.
    Images(Vec<DynamicImage>),
}

impl SourceDocument {
    /// Read a PDF or image file.
    pub fn from_path(path: &Path) -> std::result::Result<Self, HinvError> {
        if !path.is_file() {
            return Err(HinvError::Input(format!("file not found: {}", path.display())));
        }
        let bytes = std::fs::read(path)
            .map_err(|e| HinvError::Input(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_bytes(bytes)
    }

    /// Detect the document kind from its content.
    pub fn from_bytes(bytes: Vec<u8>) -> std::result::Result<Self, HinvError> {
        if bytes.is_empty() {
            return Err(HinvError::Input("document is empty".to_string()));
        }
        if bytes.starts_with(b"%PDF") {
            debug!("Detected PDF document ({} bytes)", bytes.len());
            return Ok(SourceDocument::Pdf(bytes));
        }
        let image = image::load_from_memory(&bytes)
            .map_err(|e| HinvError::Input(format!("unsupported document format: {}", e)))?;
        debug!("Detected image document {}x{}", image.width(), image.height());
        Ok(SourceDocument::Images(vec![image]))
    }

    pub fn is_pdf(&self) -> bool {
        matches!(self, SourceDocument::Pdf(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_detects_pdf_magic() {
        let doc = SourceDocument::from_bytes(b"%PDF-1.7\n...".to_vec()).unwrap();
        assert!(doc.is_pdf());
    }

    #[test]
    fn test_detects_png() {
        let mut png = Vec::new();
        DynamicImage::new_rgb8(4, 3)
            .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        match SourceDocument::from_bytes(png).unwrap() {
            SourceDocument::Images(images) => assert_eq!(images[0].width(), 4),
            SourceDocument::Pdf(_) => panic!("expected image document"),
        }
    }

    #[test]
    fn test_rejects_unknown_content() {
        let err = SourceDocument::from_bytes(b"hello world".to_vec()).unwrap_err();
        assert!(matches!(err, HinvError::Input(_)));
    }

    #[test]
    fn test_missing_file_is_input_error() {
        let err = SourceDocument::from_path(Path::new("/nonexistent/invoice.pdf")).unwrap_err();
        assert!(matches!(err, HinvError::Input(_)));
    }
}
