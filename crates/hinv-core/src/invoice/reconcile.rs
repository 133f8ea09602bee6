//! Choosing between the OCR and text candidate of a field.

use tracing::trace;

use super::candidate::{FieldCandidate, FieldKind};
use crate::models::invoice::Provenance;

/// Pick the final value for `field` from its two candidates.
///
/// 1. Equal non-empty values: the value with the higher confidence, tagged hybrid.
/// 2. Exactly one non-empty: that candidate unchanged.
/// 3. Both non-empty and different: the more confident one; ties go to OCR.
/// 4. Both empty: the OCR candidate.
pub fn reconcile(field: FieldKind, ocr: FieldCandidate, text: FieldCandidate) -> FieldCandidate {
    let chosen = match (ocr.is_empty(), text.is_empty()) {
        (false, false) if ocr.value == text.value => FieldCandidate {
            confidence: ocr.confidence.max(text.confidence),
            provenance: Provenance::Hybrid,
            bbox: ocr.bbox.or(text.bbox),
            value: ocr.value,
        },
        (false, true) => ocr,
        (true, false) => text,
        _ => {
            if ocr.confidence >= text.confidence {
                ocr
            } else {
                text
            }
        }
    };

    trace!(
        "{}: chose {:?} ({:?}, {:.2})",
        field.key(),
        chosen.value,
        chosen.provenance,
        chosen.confidence
    );
    chosen
}
