//! Configuration structures for the hybrid pipeline.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::HinvError;

/// Maximum vertical distance between a supplier label and a legal-suffix token.
pub const SUPPLIER_LABEL_TOLERANCE_PX: i32 = 200;
/// Vertical window around a totals label searched for the currency amount.
pub const TOTALS_ROW_TOLERANCE_PX: i32 = 30;
/// Vertical window used when reconstructing the text of a single line.
pub const LINE_TOLERANCE_PX: i32 = 20;
/// Vertical distance within which table tokens belong to the same row.
pub const TABLE_ROW_TOLERANCE_PX: i32 = 20;
/// Height of the table region below the header token.
pub const TABLE_HEIGHT_PX: i32 = 400;
/// Shortest line item description that is kept (in characters).
pub const MIN_DESCRIPTION_LEN: usize = 3;
/// OCR tokens at or below this confidence are discarded.
pub const MIN_TOKEN_CONFIDENCE: f32 = 0.30;
/// Overall confidence reported for documents handled in fallback mode.
pub const FALLBACK_CONFIDENCE: f32 = 0.3;

/// Main configuration for the hinv pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HinvConfig {
    /// OCR configuration.
    pub ocr: OcrConfig,

    /// PDF rasterization configuration.
    pub pdf: PdfConfig,

    /// Field extraction tolerances.
    pub extraction: ExtractionConfig,

    /// Model configuration.
    pub models: ModelConfig,

    /// HTTP service configuration.
    pub server: ServerConfig,
}

/// OCR engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Tokens at or below this confidence (0.0 - 1.0) are dropped.
    pub min_token_confidence: f32,

    /// Maximum image dimension (longer side) handed to the recognizer.
    pub max_image_size: u32,

    /// Keep `[UNK]` markers emitted by the recognizer.
    pub keep_unk: bool,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            min_token_confidence: MIN_TOKEN_CONFIDENCE,
            max_image_size: 4096,
            keep_unk: false,
        }
    }
}

/// PDF processing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfConfig {
    /// Target resolution for the primary rasterization strategy.
    pub render_dpi: u32,

    /// Upscale factor (relative to 72 dpi) for the secondary strategy.
    pub fallback_zoom: f32,

    /// Maximum pages to process (0 = unlimited).
    pub max_pages: usize,

    /// Use the embedded text layer when the caller supplies no text.
    pub extract_embedded_text: bool,
}

impl Default for PdfConfig {
    fn default() -> Self {
        Self {
            render_dpi: 300,
            fallback_zoom: 3.0,
            max_pages: 0,
            extract_embedded_text: true,
        }
    }
}

/// Geometric tolerances for field, table and totals extraction.
///
/// All distances are in page pixels of the rasterized image.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub supplier_label_tolerance_px: i32,
    pub totals_row_tolerance_px: i32,
    pub line_tolerance_px: i32,
    pub table_row_tolerance_px: i32,
    pub table_height_px: i32,
    pub min_description_len: usize,

    /// Currency code written to every record.
    pub currency: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            supplier_label_tolerance_px: SUPPLIER_LABEL_TOLERANCE_PX,
            totals_row_tolerance_px: TOTALS_ROW_TOLERANCE_PX,
            line_tolerance_px: LINE_TOLERANCE_PX,
            table_row_tolerance_px: TABLE_ROW_TOLERANCE_PX,
            table_height_px: TABLE_HEIGHT_PX,
            min_description_len: MIN_DESCRIPTION_LEN,
            currency: "EUR".to_string(),
        }
    }
}

/// Model file locations for the native recognizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Directory containing model files.
    pub model_dir: PathBuf,

    /// Text detection model file name.
    pub detection_model: String,

    /// Text recognition model file name.
    pub recognition_model: String,

    /// Character dictionary file name.
    pub dictionary: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            detection_model: "det.onnx".to_string(),
            recognition_model: "latin_rec.onnx".to_string(),
            dictionary: "latin_dict.txt".to_string(),
        }
    }
}

impl ModelConfig {
    /// Paths of all files the recognizer needs, in detection/recognition/dictionary order.
    pub fn files_in(&self, dir: &Path) -> [PathBuf; 3] {
        [
            dir.join(&self.detection_model),
            dir.join(&self.recognition_model),
            dir.join(&self.dictionary),
        ]
    }

    /// Whether every model file exists in `dir`.
    pub fn available_in(&self, dir: &Path) -> bool {
        self.files_in(dir).iter().all(|p| p.exists())
    }
}

/// HTTP service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind (host:port).
    pub bind: String,

    /// Largest accepted request body.
    pub max_upload_bytes: usize,

    /// Directory for uploaded documents; the system temp dir when unset.
    pub temp_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:5000".to_string(),
            max_upload_bytes: 32 * 1024 * 1024,
            temp_dir: None,
        }
    }
}

impl HinvConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, HinvError> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| HinvError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), HinvError> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| HinvError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get full path to a model file.
    pub fn model_path(&self, model_name: &str) -> PathBuf {
        self.models.model_dir.join(model_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_named_tolerances() {
        let config = HinvConfig::default();
        assert_eq!(config.extraction.supplier_label_tolerance_px, 200);
        assert_eq!(config.extraction.totals_row_tolerance_px, 30);
        assert_eq!(config.extraction.table_height_px, 400);
        assert_eq!(config.extraction.min_description_len, 3);
        assert_eq!(config.pdf.render_dpi, 300);
        assert_eq!(config.extraction.currency, "EUR");
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: HinvConfig =
            serde_json::from_str(r#"{"extraction": {"table_height_px": 600}}"#).unwrap();
        assert_eq!(config.extraction.table_height_px, 600);
        assert_eq!(config.extraction.line_tolerance_px, LINE_TOLERANCE_PX);
        assert_eq!(config.ocr.min_token_confidence, MIN_TOKEN_CONFIDENCE);
    }

    #[test]
    fn test_model_files_in_dir() {
        let models = ModelConfig::default();
        let files = models.files_in(Path::new("/opt/models"));
        assert_eq!(files[0], PathBuf::from("/opt/models/det.onnx"));
        assert!(!models.available_in(Path::new("/nonexistent/hinv/models")));
    }
}
