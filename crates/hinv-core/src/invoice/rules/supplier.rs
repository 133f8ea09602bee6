//! Supplier name extraction.

use tracing::debug;

use super::patterns::{LEGAL_SUFFIX_TOKEN, SUPPLIER_LABEL, SUPPLIER_PATTERNS};
use super::{FieldExtractor, match_patterns};
use crate::invoice::candidate::{FieldCandidate, FieldKind};
use crate::models::config::ExtractionConfig;
use crate::models::invoice::Provenance;
use crate::ocr::{TokenIndex, normalize_token};

/// Finds the supplier near the invoice label.
///
/// Spatially, the supplier is the first token carrying a legal-entity suffix
/// (B.V., N.V., Holding, ...) within the label tolerance below or above a
/// `FACTUUR` label on the same page. The value is the OCR line up to and
/// including that token, and its bounding box is the union of those words'
/// boxes rather than the suffix token's own box. The confidence is the
/// suffix token's.
pub struct SupplierExtractor;

impl FieldExtractor for SupplierExtractor {
    fn field(&self) -> FieldKind {
        FieldKind::Supplier
    }

    fn from_tokens(&self, index: &TokenIndex, config: &ExtractionConfig) -> FieldCandidate {
        let labels = index.lookup(SUPPLIER_LABEL);
        if labels.is_empty() {
            return FieldCandidate::empty(Provenance::Ocr);
        }

        let suffix = index.tokens().find(|token| {
            LEGAL_SUFFIX_TOKEN.is_match(&token.text)
                && labels.iter().any(|label| {
                    label.page == token.page
                        && label.vertical_distance(token) < config.supplier_label_tolerance_px
                })
        });

        let Some(suffix) = suffix else {
            return FieldCandidate::empty(Provenance::Ocr);
        };

        let words: Vec<_> = index
            .line_of(suffix)
            .into_iter()
            .filter(|t| t.bbox.left <= suffix.bbox.left)
            .filter(|t| normalize_token(&t.text) != SUPPLIER_LABEL)
            .collect();

        let value = words
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let bbox = words
            .iter()
            .map(|t| t.bbox)
            .reduce(|a, b| a.union(&b))
            .unwrap_or(suffix.bbox)
            .with_confidence(suffix.confidence);

        debug!("Supplier from tokens: {:?} ({:.2})", value, suffix.confidence);
        FieldCandidate::from_token(value, suffix).with_bbox(bbox)
    }

    fn from_text(&self, text: &str) -> FieldCandidate {
        match_patterns(self.field(), &SUPPLIER_PATTERNS, text, |v| v)
    }
}
