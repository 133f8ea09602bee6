//! Field candidates produced by the extraction strategies.

use crate::models::invoice::Provenance;
use crate::ocr::{BoundingBox, Token};

/// Header fields with an OCR and a text strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Supplier,
    InvoiceNumber,
    InvoiceDate,
}

impl FieldKind {
    pub const ALL: [FieldKind; 3] = [
        FieldKind::Supplier,
        FieldKind::InvoiceNumber,
        FieldKind::InvoiceDate,
    ];

    /// Key used in the record's `field_sources` map.
    pub fn key(&self) -> &'static str {
        match self {
            FieldKind::Supplier => "supplier",
            FieldKind::InvoiceNumber => "invoice_number",
            FieldKind::InvoiceDate => "date",
        }
    }
}

/// A proposed value for one field.
///
/// An empty candidate has an empty value and zero confidence; its provenance
/// still names the strategy that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldCandidate {
    pub value: String,
    pub bbox: Option<BoundingBox>,
    pub confidence: f32,
    pub provenance: Provenance,
}

impl FieldCandidate {
    pub fn empty(provenance: Provenance) -> Self {
        Self {
            value: String::new(),
            bbox: None,
            confidence: 0.0,
            provenance,
        }
    }

    /// Candidate located on a token; confidence is the token's.
    pub fn from_token(value: impl Into<String>, token: &Token) -> Self {
        Self {
            value: value.into(),
            bbox: Some(token.bbox),
            confidence: token.confidence,
            provenance: Provenance::Ocr,
        }
    }

    /// Candidate found by a text pattern with a fixed confidence.
    pub fn from_text(value: impl Into<String>, confidence: f32) -> Self {
        Self {
            value: value.into(),
            bbox: None,
            confidence,
            provenance: Provenance::Text,
        }
    }

    pub fn with_bbox(mut self, bbox: BoundingBox) -> Self {
        self.bbox = Some(bbox);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}
