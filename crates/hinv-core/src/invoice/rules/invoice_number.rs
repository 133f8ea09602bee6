//! Invoice number extraction.

use super::patterns::{INVOICE_NUMBER_PATTERNS, INVOICE_NUMBER_TOKEN};
use super::{FieldExtractor, match_patterns};
use crate::invoice::candidate::{FieldCandidate, FieldKind};
use crate::models::config::ExtractionConfig;
use crate::models::invoice::Provenance;
use crate::ocr::TokenIndex;

/// Invoice numbers of the form `V` followed by at least six digits.
pub struct InvoiceNumberExtractor;

impl FieldExtractor for InvoiceNumberExtractor {
    fn field(&self) -> FieldKind {
        FieldKind::InvoiceNumber
    }

    fn from_tokens(&self, index: &TokenIndex, _config: &ExtractionConfig) -> FieldCandidate {
        index
            .tokens()
            .find_map(|token| {
                INVOICE_NUMBER_TOKEN
                    .find(&token.text)
                    .map(|m| FieldCandidate::from_token(m.as_str(), token))
            })
            .unwrap_or_else(|| FieldCandidate::empty(Provenance::Ocr))
    }

    fn from_text(&self, text: &str) -> FieldCandidate {
        match_patterns(self.field(), &INVOICE_NUMBER_PATTERNS, text, |v| v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::{BoundingBox, Token};

    #[test]
    fn test_first_matching_token_wins() {
        let index = TokenIndex::from_tokens(vec![
            Token::new("Factuurnummer", 0, BoundingBox::new(10, 100, 90, 12), 0.9, 3, 0),
            Token::new("V000456:", 0, BoundingBox::new(110, 100, 60, 12), 0.95, 3, 0),
            Token::new("V999999", 0, BoundingBox::new(10, 300, 60, 12), 0.99, 8, 0),
        ]);

        let candidate = InvoiceNumberExtractor.from_tokens(&index, &ExtractionConfig::default());
        assert_eq!(candidate.value, "V000456");
        assert_eq!(candidate.confidence, 0.95);
        assert_eq!(candidate.bbox.unwrap().left, 110);
    }

    #[test]
    fn test_short_v_number_is_ignored() {
        let index = TokenIndex::from_tokens(vec![Token::new(
            "V12345",
            0,
            BoundingBox::new(0, 0, 10, 10),
            0.9,
            0,
            0,
        )]);
        assert!(InvoiceNumberExtractor
            .from_tokens(&index, &ExtractionConfig::default())
            .is_empty());
    }

    #[test]
    fn test_from_text_prefers_v_number() {
        let candidate = InvoiceNumberExtractor.from_text("Factuurnummer: 2024017\nRef V000123");
        assert_eq!(candidate.value, "V000123");
        assert_eq!(candidate.confidence, 0.9);

        let candidate = InvoiceNumberExtractor.from_text("Factuurnummer: 2024017");
        assert_eq!(candidate.value, "2024017");
    }
}
