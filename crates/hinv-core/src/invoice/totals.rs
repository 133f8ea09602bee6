//! Subtotal, VAT and total extraction.

use rust_decimal::Decimal;
use tracing::debug;

use super::rules::parse_amount;
use super::rules::patterns::{
    AMOUNT_IN_TEXT, CURRENCY_SYMBOL, SUBTOTAL_LABEL, SUBTOTAL_TEXT, TOTAL_DUE_LABEL, TOTAL_LABELS,
    TOTAL_TEXT, VAT_LABEL, VAT_TEXT,
};
use crate::models::config::ExtractionConfig;
use crate::models::invoice::Totals;
use crate::ocr::{Token, TokenIndex};

/// Which totals member a row describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TotalKind {
    Subtotal,
    Vat,
    Total,
}

/// Classify a reconstructed row by its keywords.
///
/// Exclusive-of-VAT wording wins over VAT wording, which wins over
/// amount-due wording.
pub fn classify_row(row_text: &str) -> Option<TotalKind> {
    if SUBTOTAL_LABEL.is_match(row_text) {
        Some(TotalKind::Subtotal)
    } else if VAT_LABEL.is_match(row_text) {
        Some(TotalKind::Vat)
    } else if TOTAL_DUE_LABEL.is_match(row_text) {
        Some(TotalKind::Total)
    } else {
        None
    }
}

fn assign(totals: &mut Totals, kind: TotalKind, amount: Decimal) {
    let slot = match kind {
        TotalKind::Subtotal => &mut totals.subtotal,
        TotalKind::Vat => &mut totals.vat_amount,
        TotalKind::Total => &mut totals.total,
    };
    slot.get_or_insert(amount);
}

/// The currency amount nearest to `label` vertically among `row`.
///
/// An amount counts when its token holds the currency symbol or directly
/// follows a standalone currency token. Ties go to the rightmost amount.
fn nearest_currency_amount(label: &Token, row: &[&Token]) -> Option<Decimal> {
    row.iter()
        .enumerate()
        .filter_map(|(i, token)| {
            let m = AMOUNT_IN_TEXT.find(&token.text)?;
            let marked = token.text.contains(CURRENCY_SYMBOL)
                || i.checked_sub(1)
                    .map(|prev| row[prev].text.trim() == CURRENCY_SYMBOL.to_string())
                    .unwrap_or(false);
            if !marked {
                return None;
            }
            let amount = parse_amount(m.as_str())?;
            Some((token.vertical_distance(label), -token.bbox.left, amount))
        })
        .min_by_key(|(distance, neg_left, _)| (*distance, *neg_left))
        .map(|(_, _, amount)| amount)
}

/// Totals from rows anchored on `totaal`/`total` tokens.
pub fn totals_from_tokens(index: &TokenIndex, config: &ExtractionConfig) -> Totals {
    let mut totals = Totals::default();

    for label in TOTAL_LABELS.iter().flat_map(|l| index.lookup(l)) {
        let row = index.row(label, config.totals_row_tolerance_px);
        let Some(amount) = nearest_currency_amount(label, &row) else {
            continue;
        };
        let line_text = index.row_text(label, config.line_tolerance_px);
        if let Some(kind) = classify_row(&line_text) {
            debug!("Totals row {:?} -> {:?} {}", line_text, kind, amount);
            assign(&mut totals, kind, amount);
        }
    }

    totals
}

/// Totals from labeled text lines.
pub fn totals_from_text(text: &str) -> Totals {
    let mut totals = Totals::default();
    for (kind, pattern) in [
        (TotalKind::Subtotal, &*SUBTOTAL_TEXT),
        (TotalKind::Vat, &*VAT_TEXT),
        (TotalKind::Total, &*TOTAL_TEXT),
    ] {
        if let Some(amount) = pattern.captures(text).and_then(|c| parse_amount(&c[1])) {
            assign(&mut totals, kind, amount);
        }
    }
    totals
}

/// Totals from tokens, or from text when the tokens yield nothing.
pub fn extract_totals(index: &TokenIndex, text: &str, config: &ExtractionConfig) -> Totals {
    let totals = totals_from_tokens(index, config);
    if !totals.is_empty() {
        return totals;
    }
    totals_from_text(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::BoundingBox;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    fn token(text: &str, left: i32, top: i32) -> Token {
        Token::new(text, 0, BoundingBox::new(left, top, 50, 12), 0.9, (top / 10) as usize, 0)
    }

    fn dec(s: &str) -> Option<Decimal> {
        Some(Decimal::from_str(s).unwrap())
    }

    #[test]
    fn test_classify_row() {
        assert_eq!(classify_row("Totaal exclusief btw € 100.00"), Some(TotalKind::Subtotal));
        assert_eq!(classify_row("Totaal btw 21% € 21.00"), Some(TotalKind::Vat));
        assert_eq!(classify_row("Totaal te betalen € 121.00"), Some(TotalKind::Total));
        assert_eq!(classify_row("Totaal € 5.00"), None);
    }

    #[test]
    fn test_subtotal_row_sets_only_subtotal() {
        let index = TokenIndex::from_tokens(vec![
            token("Totaal", 50, 700),
            token("exclusief", 110, 700),
            token("btw", 170, 700),
            token("€", 380, 701),
            token("100.00", 400, 700),
        ]);
        let totals = totals_from_tokens(&index, &ExtractionConfig::default());
        assert_eq!(totals, Totals { subtotal: dec("100.00"), vat_amount: None, total: None });
    }

    #[test]
    fn test_stacked_totals_rows() {
        let index = TokenIndex::from_tokens(vec![
            token("Totaal", 50, 700),
            token("exclusief", 110, 700),
            token("btw", 170, 700),
            token("€", 380, 700),
            token("100.00", 400, 700),
            token("Totaal", 50, 725),
            token("btw", 110, 725),
            token("21%", 170, 725),
            token("€21.00", 400, 725),
            token("Totaal", 50, 750),
            token("te", 110, 750),
            token("betalen", 150, 750),
            token("€121.00", 400, 750),
        ]);
        let totals = totals_from_tokens(&index, &ExtractionConfig::default());
        assert_eq!(totals.subtotal, dec("100.00"));
        assert_eq!(totals.vat_amount, dec("21.00"));
        assert_eq!(totals.total, dec("121.00"));
    }

    #[test]
    fn test_text_fallback() {
        let text = "Totaal exclusief btw € 100.00\nBtw 21% € 21.00\nTotaal te betalen € 121.00";
        let totals = extract_totals(&TokenIndex::default(), text, &ExtractionConfig::default());
        assert_eq!(totals.subtotal, dec("100.00"));
        assert_eq!(totals.vat_amount, dec("21.00"));
        assert_eq!(totals.total, dec("121.00"));
    }

    #[test]
    fn test_single_subtotal_line_in_text() {
        let totals = totals_from_text("Totaal exclusief btw € 100.00");
        assert_eq!(totals, Totals { subtotal: dec("100.00"), ..Default::default() });
    }
}
