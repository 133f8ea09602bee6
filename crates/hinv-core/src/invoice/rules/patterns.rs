//! Pattern registry for invoice extraction.
//!
//! Text patterns for each field are listed in priority order: the first
//! pattern that matches wins, and its confidence is reported with the value.
//! Token patterns are applied to single OCR words.

use lazy_static::lazy_static;
use regex::Regex;

/// A text pattern whose first capture group is the field value.
pub struct FieldPattern {
    pub name: &'static str,
    pub regex: Regex,
    pub confidence: f32,
}

impl FieldPattern {
    fn new(name: &'static str, pattern: &str, confidence: f32) -> Self {
        Self {
            name,
            regex: Regex::new(pattern).unwrap(),
            confidence,
        }
    }

    /// Trimmed first capture group of the first match.
    pub fn find(&self, text: &str) -> Option<String> {
        let caps = self.regex.captures(text)?;
        let value = caps.get(1)?.as_str().trim();
        (!value.is_empty()).then(|| value.to_string())
    }
}

/// Label introducing the supplier block on Dutch invoices.
pub const SUPPLIER_LABEL: &str = "factuur";

/// Column headers that anchor the line item table, in priority order.
pub const TABLE_HEADER_LABELS: [&str; 2] = ["omschrijving", "description"];

/// Labels of totals rows.
pub const TOTAL_LABELS: [&str; 2] = ["totaal", "total"];

/// Currency symbol marking monetary tokens.
pub const CURRENCY_SYMBOL: char = '€';

/// Monetary amount with two decimals, optional thousands separators.
const AMOUNT: &str = r"\d{1,3}(?:[.,]?\d{3})*[.,]\d{2}";

lazy_static! {
    // Token patterns
    pub static ref LEGAL_SUFFIX_TOKEN: Regex = Regex::new(
        r"(?i)(?:^|[^a-z])(?:B\.V\.?|N\.V\.?|BV|NV|Holding|Group)(?:$|[^a-z])"
    ).unwrap();

    pub static ref INVOICE_NUMBER_TOKEN: Regex = Regex::new(r"^V\d{6,}").unwrap();

    pub static ref DATE_TOKEN: Regex = Regex::new(r"^\d{1,2}[-/]\d{1,2}[-/]\d{4}").unwrap();

    pub static ref AMOUNT_TOKEN: Regex = Regex::new(&format!(r"^€?\s*{}$", AMOUNT)).unwrap();

    pub static ref AMOUNT_IN_TEXT: Regex = Regex::new(AMOUNT).unwrap();

    // Text patterns
    pub static ref SUPPLIER_PATTERNS: Vec<FieldPattern> = vec![
        FieldPattern::new(
            "line_after_factuur",
            r"(?i)\bFACTUUR[ \t]*(?:\r?\n[ \t]*)+([^\r\n]+)",
            0.8,
        ),
        FieldPattern::new(
            "name_with_legal_suffix",
            r"(?m)^[ \t]*([A-Z][A-Za-z0-9&'\-. ]*?[ \t](?:B\.V\.|N\.V\.|BV|NV|Holding|Group))(?:[^A-Za-z]|$)",
            0.8,
        ),
    ];

    pub static ref INVOICE_NUMBER_PATTERNS: Vec<FieldPattern> = vec![
        FieldPattern::new("v_number", r"\b(V\d{6,})\b", 0.9),
        FieldPattern::new(
            "labeled_number",
            r"(?i)(?:Factuurnummer|Factuurnr\.?|Invoice[^\n]*?(?:Number|No\.?))\s*:?\s*(V?\d+)",
            0.9,
        ),
    ];

    pub static ref DATE_PATTERNS: Vec<FieldPattern> = vec![
        FieldPattern::new(
            "labeled_date",
            r"(?i)\b(?:Factuurdatum|Invoice\s+date|Datum|Date)\s*:?\s*(\d{1,2}[-/]\d{1,2}[-/]\d{4})",
            0.9,
        ),
        FieldPattern::new("date_literal", r"\b(\d{1,2}[-/]\d{1,2}[-/]\d{4})\b", 0.8),
    ];

    // Tables
    pub static ref TABLE_HEADER_ROW: Regex = Regex::new(
        r"(?i)omschrijving|description|bedrag|amount"
    ).unwrap();

    pub static ref TEXT_LINE_ITEM: Regex = Regex::new(
        &format!(r"^(.+?)\s+€\s*({})$", AMOUNT)
    ).unwrap();

    pub static ref NON_ITEM_LINE: Regex = Regex::new(
        r"(?i)totaal|total|btw|vat|subtotal"
    ).unwrap();

    // Totals
    pub static ref SUBTOTAL_LABEL: Regex = Regex::new(r"(?i)exclusief|excl").unwrap();

    pub static ref VAT_LABEL: Regex = Regex::new(r"(?i)btw|vat").unwrap();

    pub static ref TOTAL_DUE_LABEL: Regex = Regex::new(r"(?i)betalen|incl").unwrap();

    pub static ref SUBTOTAL_TEXT: Regex = Regex::new(
        &format!(r"(?i)(?:totaal\s+exclusief[^\n]*btw|subtota(?:a)?l)[^\n]*€\s*({})", AMOUNT)
    ).unwrap();

    pub static ref VAT_TEXT: Regex = Regex::new(
        &format!(r"(?i)(?:btw|vat)[^\n]*\d{{1,2}}(?:[.,]\d+)?\s*%[^\n]*€\s*({})", AMOUNT)
    ).unwrap();

    pub static ref TOTAL_TEXT: Regex = Regex::new(
        &format!(r"(?i)(?:totaal\s+te\s+betalen|total\s+to\s+pay|totaal\s+incl[^\n]*)[^\n]*€\s*({})", AMOUNT)
    ).unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legal_suffix_token() {
        for word in ["B.V.", "BV", "NV,", "Holding", "acme-bv"] {
            assert!(LEGAL_SUFFIX_TOKEN.is_match(word), "{word}");
        }
        for word in ["Invoice", "Bvlgari", "November"] {
            assert!(!LEGAL_SUFFIX_TOKEN.is_match(word), "{word}");
        }
    }

    #[test]
    fn test_supplier_patterns_in_priority_order() {
        let text = "FACTUUR\nAcme Trading B.V.\nKerkstraat 1";
        assert_eq!(SUPPLIER_PATTERNS[0].find(text).as_deref(), Some("Acme Trading B.V."));

        let text = "Invoice from\nGlobex Holding\n";
        assert!(SUPPLIER_PATTERNS[0].find(text).is_none());
        assert_eq!(SUPPLIER_PATTERNS[1].find(text).as_deref(), Some("Globex Holding"));
    }

    #[test]
    fn test_invoice_number_patterns() {
        assert_eq!(
            INVOICE_NUMBER_PATTERNS[0].find("Ref V000123 dated").as_deref(),
            Some("V000123")
        );
        assert_eq!(
            INVOICE_NUMBER_PATTERNS[1].find("Factuurnummer: 20240017").as_deref(),
            Some("20240017")
        );
        assert_eq!(
            INVOICE_NUMBER_PATTERNS[1].find("Invoice Number V12").as_deref(),
            Some("V12")
        );
    }

    #[test]
    fn test_labeled_date_skips_due_date() {
        let text = "Vervaldatum: 15-03-2024\nDatum: 01-03-2024";
        assert_eq!(DATE_PATTERNS[0].find(text).as_deref(), Some("01-03-2024"));
        assert_eq!(DATE_PATTERNS[1].find(text).as_deref(), Some("15-03-2024"));
    }

    #[test]
    fn test_amount_token() {
        assert!(AMOUNT_TOKEN.is_match("1,234.56"));
        assert!(AMOUNT_TOKEN.is_match("€100.00"));
        assert!(AMOUNT_TOKEN.is_match("60,50"));
        assert!(!AMOUNT_TOKEN.is_match("2024"));
        assert!(!AMOUNT_TOKEN.is_match("21%"));
    }

    #[test]
    fn test_totals_text_patterns() {
        let caps = SUBTOTAL_TEXT.captures("Totaal exclusief btw € 100.00").unwrap();
        assert_eq!(&caps[1], "100.00");
        let caps = VAT_TEXT.captures("Btw 21% € 21.00").unwrap();
        assert_eq!(&caps[1], "21.00");
        let caps = TOTAL_TEXT.captures("Totaal te betalen € 121.00").unwrap();
        assert_eq!(&caps[1], "121.00");
        assert!(VAT_TEXT.captures("Totaal exclusief btw € 100.00").is_none());
    }
}
