//! Invoice date extraction and normalization.

use chrono::NaiveDate;

use super::patterns::{DATE_PATTERNS, DATE_TOKEN};
use super::{FieldExtractor, match_patterns};
use crate::invoice::candidate::{FieldCandidate, FieldKind};
use crate::models::config::ExtractionConfig;
use crate::models::invoice::Provenance;
use crate::ocr::TokenIndex;

/// Date field extractor. Values are normalized to `YYYY-MM-DD`.
pub struct DateExtractor;

impl FieldExtractor for DateExtractor {
    fn field(&self) -> FieldKind {
        FieldKind::InvoiceDate
    }

    fn from_tokens(&self, index: &TokenIndex, _config: &ExtractionConfig) -> FieldCandidate {
        index
            .tokens()
            .find_map(|token| {
                DATE_TOKEN
                    .find(&token.text)
                    .map(|m| FieldCandidate::from_token(normalize_date(m.as_str()), token))
            })
            .unwrap_or_else(|| FieldCandidate::empty(Provenance::Ocr))
    }

    fn from_text(&self, text: &str) -> FieldCandidate {
        match_patterns(self.field(), &DATE_PATTERNS, text, |v| normalize_date(&v))
    }
}

/// Normalize a `D-M-YYYY`, `D/M/YYYY` or `YYYY-M-D` date to `YYYY-MM-DD`.
///
/// A four-digit first component means year-month-day, otherwise
/// day-month-year. Input that is not a valid calendar date is returned
/// unchanged, so normalizing twice gives the same result.
pub fn normalize_date(s: &str) -> String {
    let trimmed = s.trim();
    let parts: Vec<&str> = trimmed.split(['-', '/', '.']).collect();

    if parts.len() != 3 || parts.iter().any(|p| p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit())) {
        return trimmed.to_string();
    }

    let (year, month, day) = if parts[0].len() == 4 {
        (parts[0], parts[1], parts[2])
    } else if parts[2].len() == 4 {
        (parts[2], parts[1], parts[0])
    } else {
        return trimmed.to_string();
    };

    match (year.parse::<i32>(), month.parse::<u32>(), day.parse::<u32>()) {
        (Ok(y), Ok(m), Ok(d)) => NaiveDate::from_ymd_opt(y, m, d)
            .map(|date| date.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| trimmed.to_string()),
        _ => trimmed.to_string(),
    }
}
