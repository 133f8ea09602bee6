//! Per-field extraction strategies.
//!
//! Every header field has two independent strategies: a spatial one over the
//! OCR token index and a pattern one over the plain text. Both always return
//! a candidate, empty when nothing was found.

pub mod amounts;
pub mod dates;
pub mod invoice_number;
pub mod patterns;
pub mod supplier;

pub use amounts::parse_amount;
pub use dates::{DateExtractor, normalize_date};
pub use invoice_number::InvoiceNumberExtractor;
pub use supplier::SupplierExtractor;

use tracing::trace;

use super::candidate::{FieldCandidate, FieldKind};
use crate::models::config::ExtractionConfig;
use crate::models::invoice::Provenance;
use crate::ocr::TokenIndex;
use patterns::FieldPattern;

/// Trait for field extractors.
pub trait FieldExtractor {
    /// The field this extractor produces.
    fn field(&self) -> FieldKind;

    /// Spatial strategy over positioned OCR tokens.
    fn from_tokens(&self, index: &TokenIndex, config: &ExtractionConfig) -> FieldCandidate;

    /// Pattern strategy over plain text.
    fn from_text(&self, text: &str) -> FieldCandidate;
}

/// The extractor responsible for `field`.
pub fn extractor_for(field: FieldKind) -> &'static dyn FieldExtractor {
    match field {
        FieldKind::Supplier => &SupplierExtractor,
        FieldKind::InvoiceNumber => &InvoiceNumberExtractor,
        FieldKind::InvoiceDate => &DateExtractor,
    }
}

/// Run a pattern list in priority order; the first match wins.
pub(crate) fn match_patterns(
    field: FieldKind,
    patterns: &[FieldPattern],
    text: &str,
    map: impl Fn(String) -> String,
) -> FieldCandidate {
    for pattern in patterns {
        if let Some(value) = pattern.find(text) {
            trace!("{} matched text pattern '{}': {}", field.key(), pattern.name, value);
            return FieldCandidate::from_text(map(value), pattern.confidence);
        }
    }
    FieldCandidate::empty(Provenance::Text)
}
