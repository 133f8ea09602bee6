//! OCR tokens, the recognizer boundary and the token index.

mod index;
#[cfg(feature = "native")]
mod pure_engine;

pub use index::{TokenIndex, normalize_token};
#[cfg(feature = "native")]
pub use pure_engine::PureOcrEngine;

use image::DynamicImage;
use serde::{Deserialize, Serialize};

use crate::error::OcrError;

/// Axis-aligned rectangle in page pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,

    /// Recognition confidence, present when the box came from a token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

impl BoundingBox {
    pub fn new(left: i32, top: i32, width: i32, height: i32) -> Self {
        Self {
            left,
            top,
            width,
            height,
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Right edge (`left + width`).
    pub fn right(&self) -> i32 {
        self.left + self.width
    }

    /// Bottom edge (`top + height`).
    pub fn bottom(&self) -> i32 {
        self.top + self.height
    }

    /// Smallest box covering both boxes; confidence is not carried over.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let left = self.left.min(other.left);
        let top = self.top.min(other.top);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        BoundingBox::new(left, top, right - left, bottom - top)
    }
}

/// One recognized word with its position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// Recognized text, never empty.
    pub text: String,

    /// Zero-based page index.
    pub page: usize,

    pub bbox: BoundingBox,

    /// Recognition confidence in [0, 1].
    pub confidence: f32,

    /// Line index within the page.
    pub line: usize,

    /// Block index within the page.
    pub block: usize,
}

impl Token {
    pub fn new(
        text: impl Into<String>,
        page: usize,
        bbox: BoundingBox,
        confidence: f32,
        line: usize,
        block: usize,
    ) -> Self {
        Self {
            text: text.into(),
            page,
            bbox: bbox.with_confidence(confidence),
            confidence,
            line,
            block,
        }
    }

    /// Vertical distance between the top edges of two tokens.
    pub fn vertical_distance(&self, other: &Token) -> i32 {
        (self.bbox.top - other.bbox.top).abs()
    }
}

/// Recognition output for a single page image.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OcrPage {
    /// Zero-based page index.
    pub page: usize,

    /// Tokens that passed the confidence filter.
    pub tokens: Vec<Token>,

    /// Recognized text, one line per OCR line.
    pub text: String,

    /// Image dimensions (width, height).
    pub image_size: (u32, u32),
}

impl OcrPage {
    /// Mean token confidence, 0.0 for a page without tokens.
    pub fn mean_confidence(&self) -> f32 {
        if self.tokens.is_empty() {
            return 0.0;
        }
        self.tokens.iter().map(|t| t.confidence).sum::<f32>() / self.tokens.len() as f32
    }
}

/// Turns a page image into positioned word tokens.
pub trait Recognizer {
    /// Recognize the words on one page image.
    fn recognize(&self, image: &DynamicImage, page: usize) -> Result<OcrPage, OcrError>;
}
