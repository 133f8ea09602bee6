//! Hybrid invoice parser combining spatial OCR extraction with text patterns.

use std::collections::BTreeMap;

use tracing::debug;

use crate::models::config::ExtractionConfig;
use crate::models::invoice::{ExtractedData, LineItem, Provenance, Totals};
use crate::ocr::TokenIndex;

use super::candidate::{FieldCandidate, FieldKind};
use super::reconcile::reconcile;
use super::rules::extractor_for;
use super::table::extract_line_items;
use super::totals::extract_totals;

/// Reconciled header fields, in `FieldKind::ALL` order.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderFields {
    pub supplier: FieldCandidate,
    pub invoice_number: FieldCandidate,
    pub date: FieldCandidate,
}

impl HeaderFields {
    pub fn get(&self, field: FieldKind) -> &FieldCandidate {
        match field {
            FieldKind::Supplier => &self.supplier,
            FieldKind::InvoiceNumber => &self.invoice_number,
            FieldKind::InvoiceDate => &self.date,
        }
    }

    pub fn to_array(&self) -> [FieldCandidate; 3] {
        [self.supplier.clone(), self.invoice_number.clone(), self.date.clone()]
    }

    /// Provenance of each field keyed by its `field_sources` name.
    pub fn sources(&self) -> BTreeMap<String, Provenance> {
        FieldKind::ALL
            .iter()
            .map(|f| (f.key().to_string(), self.get(*f).provenance))
            .collect()
    }
}

/// Result of parsing one document.
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    pub fields: HeaderFields,
    pub line_items: Vec<LineItem>,
    pub totals: Totals,
}

impl ExtractionResult {
    /// Flatten into the record's `extracted_data` section.
    pub fn to_extracted_data(&self, currency: &str) -> ExtractedData {
        ExtractedData {
            supplier_name: self.fields.supplier.value.clone(),
            invoice_number: self.fields.invoice_number.value.clone(),
            invoice_date: self.fields.date.value.clone(),
            currency: currency.to_string(),
            line_items: self.line_items.clone(),
            totals: self.totals.clone(),
        }
    }
}

/// Trait for invoice parsing.
pub trait InvoiceParser {
    /// Parse header fields from tokens and text.
    fn parse_fields(&self, index: &TokenIndex, text: &str) -> HeaderFields;

    /// Parse line items and totals from tokens and text.
    fn parse_amounts(&self, index: &TokenIndex, text: &str) -> (Vec<LineItem>, Totals);

    /// Parse header fields from plain text only. Line items and totals are
    /// never taken from this path.
    fn parse_text(&self, text: &str) -> HeaderFields;
}

/// Parser running both strategies per field and reconciling their results.
#[derive(Debug, Clone, Default)]
pub struct HybridInvoiceParser {
    config: ExtractionConfig,
}

impl HybridInvoiceParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use custom extraction tolerances.
    pub fn with_config(mut self, config: ExtractionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    fn field(&self, field: FieldKind, index: &TokenIndex, text: &str) -> FieldCandidate {
        let extractor = extractor_for(field);
        let ocr = extractor.from_tokens(index, &self.config);
        let text = extractor.from_text(text);
        debug!(
            "{}: ocr={:?} ({:.2}), text={:?} ({:.2})",
            field.key(),
            ocr.value,
            ocr.confidence,
            text.value,
            text.confidence
        );
        reconcile(field, ocr, text)
    }

    /// Run every strategy: fields, then items, then totals.
    pub fn parse(&self, index: &TokenIndex, text: &str) -> ExtractionResult {
        let fields = self.parse_fields(index, text);
        let (line_items, totals) = self.parse_amounts(index, text);
        ExtractionResult {
            fields,
            line_items,
            totals,
        }
    }
}

impl InvoiceParser for HybridInvoiceParser {
    fn parse_fields(&self, index: &TokenIndex, text: &str) -> HeaderFields {
        HeaderFields {
            supplier: self.field(FieldKind::Supplier, index, text),
            invoice_number: self.field(FieldKind::InvoiceNumber, index, text),
            date: self.field(FieldKind::InvoiceDate, index, text),
        }
    }

    fn parse_amounts(&self, index: &TokenIndex, text: &str) -> (Vec<LineItem>, Totals) {
        (
            extract_line_items(index, text, &self.config),
            extract_totals(index, text, &self.config),
        )
    }

    fn parse_text(&self, text: &str) -> HeaderFields {
        let field = |kind: FieldKind| extractor_for(kind).from_text(text);
        HeaderFields {
            supplier: field(FieldKind::Supplier),
            invoice_number: field(FieldKind::InvoiceNumber),
            date: field(FieldKind::InvoiceDate),
        }
    }
}
