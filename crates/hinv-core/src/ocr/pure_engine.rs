//! Native recognizer backed by `pure-onnx-ocr`.

use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;

use image::{DynamicImage, GenericImageView};
use tracing::{debug, info, trace};

use crate::error::OcrError;
use crate::models::config::{ModelConfig, OcrConfig};

use super::{BoundingBox, OcrPage, Recognizer, Token};

/// OCR engine backed by `pure-onnx-ocr` (pure Rust, no external ONNX Runtime).
///
/// The engine detects text regions, each of which becomes one OCR line. Words
/// inside a region get boxes apportioned across the region width by their
/// character offsets.
pub struct PureOcrEngine {
    engine: Mutex<pure_onnx_ocr::engine::OcrEngine>,
    config: OcrConfig,
}

/// A detected region in pixel coordinates.
struct Region {
    text: String,
    left: f64,
    top: f64,
    right: f64,
    bottom: f64,
    confidence: f32,
}

impl PureOcrEngine {
    /// Create an engine from model files in a directory.
    pub fn from_dir(model_dir: &Path, models: &ModelConfig, config: OcrConfig) -> Result<Self, OcrError> {
        let [det_path, rec_path, dict_path] = models.files_in(model_dir);

        let engine = pure_onnx_ocr::engine::OcrEngineBuilder::new()
            .det_model_path(&det_path)
            .rec_model_path(&rec_path)
            .dictionary_path(&dict_path)
            .build()
            .map_err(|e| OcrError::ModelLoad(format!("pure-onnx-ocr: {}", e)))?;

        info!("Loaded pure-onnx-ocr engine from {}", model_dir.display());

        Ok(Self {
            engine: Mutex::new(engine),
            config,
        })
    }

    fn regions(&self, image: &DynamicImage) -> Result<Vec<Region>, OcrError> {
        let engine = self
            .engine
            .lock()
            .map_err(|_| OcrError::Recognition("engine lock poisoned".to_string()))?;
        let results = engine
            .run_from_image(image)
            .map_err(|e| OcrError::Recognition(format!("pure-onnx-ocr: {}", e)))?;

        debug!("pure-onnx-ocr returned {} text regions", results.len());

        let mut regions: Vec<Region> = results
            .iter()
            .filter_map(|r| {
                let (left, top, right, bottom) = polygon_bounds(&r.bounding_box)?;
                let text = if self.config.keep_unk {
                    r.text.clone()
                } else {
                    r.text.replace("[UNK]", " ")
                };
                Some(Region {
                    text,
                    left,
                    top,
                    right,
                    bottom,
                    confidence: r.confidence,
                })
            })
            .collect();

        // Reading order: 20px bands top to bottom, then left to right
        regions.sort_by(|a, b| {
            let band_a = (a.top / 20.0) as i64;
            let band_b = (b.top / 20.0) as i64;
            band_a
                .cmp(&band_b)
                .then(a.left.partial_cmp(&b.left).unwrap_or(std::cmp::Ordering::Equal))
        });

        Ok(regions)
    }
}

impl Recognizer for PureOcrEngine {
    fn recognize(&self, image: &DynamicImage, page: usize) -> Result<OcrPage, OcrError> {
        let start = Instant::now();
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(OcrError::InvalidImage(format!("empty image {}x{}", width, height)));
        }

        let max_side = self.config.max_image_size.max(1);
        let resized;
        let (input, scale) = if width.max(height) > max_side {
            let scale = max_side as f64 / width.max(height) as f64;
            resized = image.resize(
                (width as f64 * scale).round() as u32,
                (height as f64 * scale).round() as u32,
                image::imageops::FilterType::Triangle,
            );
            (&resized, scale)
        } else {
            (image, 1.0)
        };

        info!("Recognizing page {} ({}x{})", page, width, height);

        let regions = self.regions(input)?;

        let mut tokens = Vec::new();
        let mut lines = Vec::with_capacity(regions.len());
        for (line_idx, region) in regions.iter().enumerate() {
            let words = split_region(region, scale);
            let kept: Vec<Token> = words
                .into_iter()
                .filter(|(_, _, conf)| *conf > self.config.min_token_confidence)
                .map(|(text, bbox, conf)| Token::new(text, page, bbox, conf, line_idx, line_idx))
                .collect();
            trace!("Line {}: {:?} ({} words kept)", line_idx, region.text, kept.len());
            if !kept.is_empty() {
                lines.push(region.text.trim().to_string());
            }
            tokens.extend(kept);
        }

        info!(
            "OCR complete: {} tokens on page {} in {}ms",
            tokens.len(),
            page,
            start.elapsed().as_millis()
        );

        Ok(OcrPage {
            page,
            tokens,
            text: lines.join("\n"),
            image_size: (width, height),
        })
    }
}

/// Split a region into words with boxes proportional to character offsets.
///
/// `scale` is the factor the image was resized by; boxes are mapped back to
/// the original image coordinates.
fn split_region(region: &Region, scale: f64) -> Vec<(String, BoundingBox, f32)> {
    let chars: Vec<char> = region.text.chars().collect();
    let total = chars.len().max(1) as f64;
    let char_width = (region.right - region.left) / total;

    let top = (region.top / scale).round() as i32;
    let height = ((region.bottom - region.top) / scale).round() as i32;

    let mut words = Vec::new();
    let mut start: Option<usize> = None;
    for (i, c) in chars.iter().chain(std::iter::once(&' ')).enumerate() {
        match (c.is_whitespace(), start) {
            (false, None) => start = Some(i),
            (true, Some(s)) => {
                let text: String = chars[s..i].iter().collect();
                let left = region.left + char_width * s as f64;
                let right = region.left + char_width * i as f64;
                let bbox = BoundingBox::new(
                    (left / scale).round() as i32,
                    top,
                    ((right - left) / scale).round().max(1.0) as i32,
                    height,
                );
                words.push((text, bbox, region.confidence));
                start = None;
            }
            _ => {}
        }
    }
    words
}

/// Axis-aligned bounds of the first four exterior points of a polygon.
fn polygon_bounds(polygon: &pure_onnx_ocr::Polygon<f64>) -> Option<(f64, f64, f64, f64)> {
    let mut coords = polygon.exterior().coords().take(4).peekable();
    coords.peek()?;
    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for coord in coords {
        min_x = min_x.min(coord.x);
        min_y = min_y.min(coord.y);
        max_x = max_x.max(coord.x);
        max_y = max_y.max(coord.y);
    }
    Some((min_x, min_y, max_x, max_y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_region_apportions_boxes() {
        let region = Region {
            text: "Acme B.V.".to_string(),
            left: 100.0,
            top: 50.0,
            right: 190.0,
            bottom: 70.0,
            confidence: 0.9,
        };
        let words = split_region(&region, 1.0);
        assert_eq!(words.len(), 2);
        assert_eq!(words[0].0, "Acme");
        assert_eq!(words[0].1, BoundingBox::new(100, 50, 40, 20));
        assert_eq!(words[1].0, "B.V.");
        assert_eq!(words[1].1.left, 150);
    }

    #[test]
    fn test_split_region_undoes_scale() {
        let region = Region {
            text: "V000123".to_string(),
            left: 50.0,
            top: 10.0,
            right: 120.0,
            bottom: 20.0,
            confidence: 0.8,
        };
        let words = split_region(&region, 0.5);
        assert_eq!(words[0].1, BoundingBox::new(100, 20, 140, 20));
    }
}
