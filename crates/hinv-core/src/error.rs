//! Error types for the hinv-core library.

use std::fmt;

use thiserror::Error;

/// Main error type for the hinv library.
#[derive(Error, Debug)]
pub enum HinvError {
    /// The input document is missing, unreadable or in an unsupported format.
    #[error("input error: {0}")]
    Input(String),

    /// PDF processing error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// OCR processing error.
    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors related to PDF processing and rasterization.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// Failed to extract the embedded text layer.
    #[error("failed to extract text: {0}")]
    TextExtraction(String),

    /// Failed to extract images from a page.
    #[error("failed to extract images: {0}")]
    ImageExtraction(String),

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// Invalid page number requested.
    #[error("invalid page number: {0}")]
    InvalidPage(u32),

    /// Neither rasterization strategy produced page images.
    #[error("rasterization failed (primary: {primary}; secondary: {secondary})")]
    Rasterization { primary: String, secondary: String },
}

/// Errors related to OCR processing.
#[derive(Error, Debug)]
pub enum OcrError {
    /// Failed to load OCR models.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// Text recognition failed.
    #[error("text recognition failed: {0}")]
    Recognition(String),

    /// No recognizer is available to the pipeline.
    #[error("no OCR recognizer configured")]
    NoRecognizer,

    /// Invalid image format or dimensions.
    #[error("invalid image: {0}")]
    InvalidImage(String),
}

/// Stage of the hybrid pipeline, used to report where a document failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    Rasterized,
    Recognized,
    Indexed,
    FieldsExtracted,
    ItemsExtracted,
    Scored,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Start => "start",
            Stage::Rasterized => "rasterized",
            Stage::Recognized => "recognized",
            Stage::Indexed => "indexed",
            Stage::FieldsExtracted => "fields-extracted",
            Stage::ItemsExtracted => "items-extracted",
            Stage::Scored => "scored",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

/// A failure of the hybrid path, tagged with the last stage that completed.
#[derive(Error, Debug)]
#[error("hybrid processing failed after stage '{stage}': {source}")]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub source: HinvError,
}

impl PipelineError {
    pub fn new(stage: Stage, source: impl Into<HinvError>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }
}

/// Result type for the hinv library.
pub type Result<T> = std::result::Result<T, HinvError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_error_reports_stage() {
        let err = PipelineError::new(Stage::Rasterized, OcrError::NoRecognizer);
        assert_eq!(
            err.to_string(),
            "hybrid processing failed after stage 'rasterized': OCR error: no OCR recognizer configured"
        );
    }

    #[test]
    fn test_rasterization_error_message() {
        let err = PdfError::Rasterization {
            primary: "page 1 has no image".to_string(),
            secondary: "no images in document".to_string(),
        };
        assert!(err.to_string().contains("primary: page 1 has no image"));
    }
}
