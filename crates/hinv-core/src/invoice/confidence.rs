//! Overall record confidence.

use super::candidate::FieldCandidate;
use crate::models::invoice::LineItem;

const FIELD_WEIGHT: f32 = 0.4;
const ITEM_WEIGHT: f32 = 0.3;
const OCR_WEIGHT: f32 = 0.2;
const TEXT_BONUS: f32 = 0.2;

fn mean(values: impl Iterator<Item = f32>) -> f32 {
    let (sum, count) = values.fold((0.0f32, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 { 0.0 } else { sum / count as f32 }
}

/// Inputs to the overall score.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConfidenceBreakdown {
    /// Mean confidence of the reconciled header fields (empty fields count as 0).
    pub field: f32,
    /// Mean confidence of the line items, 0 without items.
    pub items: f32,
    /// Mean OCR token confidence.
    pub ocr: f32,
    /// Whether non-empty plain text was available.
    pub text_available: bool,
}

impl ConfidenceBreakdown {
    pub fn new(fields: &[FieldCandidate], items: &[LineItem], ocr: f32, text_available: bool) -> Self {
        Self {
            field: mean(fields.iter().map(|f| f.confidence)),
            items: mean(items.iter().map(|i| i.confidence)),
            ocr,
            text_available,
        }
    }

    /// `0.4·field + 0.3·items + 0.2·ocr (+0.2 with text)`, capped at 1.0.
    pub fn score(&self) -> f32 {
        let bonus = if self.text_available { TEXT_BONUS } else { 0.0 };
        (FIELD_WEIGHT * self.field + ITEM_WEIGHT * self.items + OCR_WEIGHT * self.ocr + bonus).min(1.0)
    }
}
