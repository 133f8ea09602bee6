//! Invoice record produced by the hybrid pipeline.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Which extraction path produced a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// Found spatially in the OCR tokens.
    Ocr,
    /// Found by pattern matching on the plain text.
    Text,
    /// Both paths agreed on the value.
    Hybrid,
}

/// How a line item was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineItemSource {
    /// Parsed from a row inside the located table region.
    OcrPositioned,
    /// Parsed from a `description € amount` text line.
    TextFallback,
}

/// A single billable line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,

    pub quantity: u32,

    /// Unit price; equal to `amount` while quantity is always 1.
    #[serde(with = "rust_decimal::serde::float")]
    pub rate: Decimal,

    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,

    pub confidence: f32,

    pub source: LineItemSource,
}

impl LineItem {
    /// Create a single-quantity line item.
    pub fn new(
        description: impl Into<String>,
        amount: Decimal,
        confidence: f32,
        source: LineItemSource,
    ) -> Self {
        Self {
            description: description.into(),
            quantity: 1,
            rate: amount,
            amount,
            confidence,
            source,
        }
    }
}

/// Invoice totals; each member is present only when found.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    /// Amount before VAT.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub subtotal: Option<Decimal>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub vat_amount: Option<Decimal>,

    /// Amount to pay.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    pub total: Option<Decimal>,
}

impl Totals {
    pub fn is_empty(&self) -> bool {
        self.subtotal.is_none() && self.vat_amount.is_none() && self.total.is_none()
    }
}

/// The extracted invoice fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedData {
    /// Supplier name; empty when not found.
    pub supplier_name: String,

    /// Invoice number; empty when not found.
    pub invoice_number: String,

    /// Invoice date, `YYYY-MM-DD` when it could be normalized.
    pub invoice_date: String,

    pub currency: String,

    pub line_items: Vec<LineItem>,

    pub totals: Totals,
}

/// How the record was produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingInfo {
    /// Mean confidence of all OCR tokens (0.0 without OCR).
    pub ocr_confidence: f32,

    /// Whether non-empty plain text was available.
    pub text_extraction_available: bool,

    /// Whether the hybrid OCR + text path completed.
    pub hybrid_processing: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages_processed: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_mode: Option<bool>,

    /// Mean token confidence per page.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub page_confidence: Vec<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,
}

/// Complete output for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    pub extracted_data: ExtractedData,

    pub processing_info: ProcessingInfo,

    /// Overall confidence in [0, 1].
    pub confidence_score: f32,

    /// Provenance of `supplier`, `invoice_number` and `date`.
    pub field_sources: BTreeMap<String, Provenance>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    #[test]
    fn test_totals_skip_absent_members() {
        let totals = Totals {
            subtotal: Some(Decimal::from_str("100.00").unwrap()),
            ..Default::default()
        };
        let json = serde_json::to_value(&totals).unwrap();
        assert_eq!(json, serde_json::json!({ "subtotal": 100.0 }));
    }

    #[test]
    fn test_line_item_serializes_source_and_numbers() {
        let item = LineItem::new(
            "Consulting",
            Decimal::from_str("250.50").unwrap(),
            0.8,
            LineItemSource::OcrPositioned,
        );
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["source"], "ocr_positioned");
        assert_eq!(json["quantity"], 1);
        assert_eq!(json["amount"], 250.5);
        assert_eq!(json["rate"], 250.5);
    }

    #[test]
    fn test_processing_info_optional_members() {
        let info = ProcessingInfo {
            ocr_confidence: 0.0,
            text_extraction_available: true,
            hybrid_processing: false,
            pages_processed: None,
            fallback_mode: Some(true),
            page_confidence: Vec::new(),
            processing_time_ms: None,
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "ocr_confidence": 0.0,
                "text_extraction_available": true,
                "hybrid_processing": false,
                "fallback_mode": true
            })
        );
    }

    #[test]
    fn test_provenance_names() {
        assert_eq!(serde_json::to_string(&Provenance::Hybrid).unwrap(), "\"hybrid\"");
        assert_eq!(serde_json::to_string(&Provenance::Ocr).unwrap(), "\"ocr\"");
    }
}
