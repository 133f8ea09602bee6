//! Line item table location and row parsing.

use tracing::debug;

use super::rules::parse_amount;
use super::rules::patterns::{
    AMOUNT_IN_TEXT, AMOUNT_TOKEN, CURRENCY_SYMBOL, NON_ITEM_LINE, TABLE_HEADER_LABELS,
    TABLE_HEADER_ROW, TEXT_LINE_ITEM,
};
use crate::models::config::ExtractionConfig;
use crate::models::invoice::{LineItem, LineItemSource};
use crate::ocr::{Token, TokenIndex};

/// Confidence of items parsed from table rows.
pub const TABLE_ITEM_CONFIDENCE: f32 = 0.8;
/// Confidence of items parsed from text lines.
pub const TEXT_ITEM_CONFIDENCE: f32 = 0.6;

/// Rectangle on one page holding the line item table. Bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableRegion {
    pub page: usize,
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl TableRegion {
    pub fn contains(&self, token: &Token) -> bool {
        token.page == self.page
            && (self.left..=self.right).contains(&token.bbox.left)
            && (self.top..=self.bottom).contains(&token.bbox.top)
    }
}

/// Find the table below the first description header.
///
/// The region starts at the header token, extends right to the far edge of
/// the rightmost currency token on that page and down by the configured
/// table height. Without a header or any currency token there is no table.
pub fn locate_table(index: &TokenIndex, config: &ExtractionConfig) -> Option<TableRegion> {
    let header = TABLE_HEADER_LABELS
        .iter()
        .find_map(|label| index.lookup(label).into_iter().next())?;

    let right = index
        .page_tokens(header.page)
        .iter()
        .filter(|t| t.text.contains(CURRENCY_SYMBOL))
        .map(|t| t.bbox.right())
        .max()?;

    let region = TableRegion {
        page: header.page,
        left: header.bbox.left,
        top: header.bbox.top,
        right,
        bottom: header.bbox.top + config.table_height_px,
    };
    debug!("Table region: {:?}", region);
    Some(region)
}

/// Group the region's tokens into rows, each sorted left to right.
///
/// A token joins the current row while its top edge is within `tolerance`
/// pixels of the row's first token; otherwise it starts a new row.
pub fn segment_rows<'a>(index: &'a TokenIndex, region: &TableRegion, tolerance: i32) -> Vec<Vec<&'a Token>> {
    let mut tokens: Vec<&Token> = index
        .page_tokens(region.page)
        .iter()
        .filter(|t| region.contains(t))
        .collect();
    tokens.sort_by_key(|t| (t.bbox.top, t.bbox.left));

    let mut rows: Vec<Vec<&Token>> = Vec::new();
    for token in tokens {
        match rows.last_mut() {
            Some(row) if token.bbox.top - row[0].bbox.top < tolerance => row.push(token),
            _ => rows.push(vec![token]),
        }
    }

    for row in &mut rows {
        row.sort_by_key(|t| t.bbox.left);
    }
    rows
}

/// Parse one table row into an item.
///
/// Tokens containing the currency symbol or shaped like an amount are
/// monetary; the rightmost monetary value is the line amount and the other
/// tokens form the description.
pub fn parse_row(row: &[&Token], min_description_len: usize) -> Option<LineItem> {
    let mut description = Vec::new();
    let mut amount = None;

    for token in row {
        let text = token.text.trim();
        if text.contains(CURRENCY_SYMBOL) || AMOUNT_TOKEN.is_match(text) {
            if let Some(value) = AMOUNT_IN_TEXT.find(text).and_then(|m| parse_amount(m.as_str())) {
                amount = Some(value);
            }
        } else {
            description.push(text);
        }
    }

    let amount = amount?;
    let description = description.join(" ").trim().to_string();
    if description.chars().count() < min_description_len {
        return None;
    }

    Some(LineItem::new(
        description,
        amount,
        TABLE_ITEM_CONFIDENCE,
        LineItemSource::OcrPositioned,
    ))
}

/// Items from the located table region, skipping header rows.
pub fn items_from_table(index: &TokenIndex, region: &TableRegion, config: &ExtractionConfig) -> Vec<LineItem> {
    segment_rows(index, region, config.table_row_tolerance_px)
        .iter()
        .filter(|row| {
            let text = row.iter().map(|t| t.text.as_str()).collect::<Vec<_>>().join(" ");
            !TABLE_HEADER_ROW.is_match(&text)
        })
        .filter_map(|row| parse_row(row, config.min_description_len))
        .collect()
}

/// Items from `description € amount` lines of plain text.
pub fn items_from_text(text: &str, min_description_len: usize) -> Vec<LineItem> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let caps = TEXT_LINE_ITEM.captures(line)?;
            let description = caps[1].trim();
            if NON_ITEM_LINE.is_match(description) || description.chars().count() < min_description_len {
                return None;
            }
            let amount = parse_amount(&caps[2])?;
            Some(LineItem::new(
                description,
                amount,
                TEXT_ITEM_CONFIDENCE,
                LineItemSource::TextFallback,
            ))
        })
        .collect()
}

/// Line items from the table, falling back to plain text when the table
/// is missing or yields nothing.
pub fn extract_line_items(index: &TokenIndex, text: &str, config: &ExtractionConfig) -> Vec<LineItem> {
    if let Some(region) = locate_table(index, config) {
        let items = items_from_table(index, &region, config);
        if !items.is_empty() {
            debug!("Extracted {} line items from table", items.len());
            return items;
        }
    }

    let items = items_from_text(text, config.min_description_len);
    debug!("Extracted {} line items from text", items.len());
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::BoundingBox;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn token(text: &str, left: i32, top: i32) -> Token {
        Token::new(text, 0, BoundingBox::new(left, top, 50, 12), 0.9, (top / 20) as usize, 0)
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn invoice_table() -> TokenIndex {
        TokenIndex::from_tokens(vec![
            token("Omschrijving", 50, 300),
            token("Bedrag", 400, 300),
            token("Consulting", 50, 330),
            token("work", 110, 332),
            token("€", 380, 331),
            token("1,250.00", 400, 330),
            token("Hosting", 50, 360),
            token("€60.50", 400, 358),
            token("Ab", 50, 390),
            token("€", 380, 390),
            token("5.00", 400, 390),
            token("Totaal", 50, 900),
            token("€", 380, 900),
            token("1,310.50", 400, 900),
        ])
    }

    #[test]
    fn test_locate_table() {
        let region = locate_table(&invoice_table(), &ExtractionConfig::default()).unwrap();
        assert_eq!(
            region,
            TableRegion { page: 0, left: 50, top: 300, right: 450, bottom: 700 }
        );
    }

    #[test]
    fn test_no_currency_tokens_means_no_table() {
        let index = TokenIndex::from_tokens(vec![token("Description", 50, 300), token("Widget", 50, 330)]);
        assert!(locate_table(&index, &ExtractionConfig::default()).is_none());
    }

    #[test]
    fn test_table_items() {
        let config = ExtractionConfig::default();
        let index = invoice_table();
        let region = locate_table(&index, &config).unwrap();
        let items = items_from_table(&index, &region, &config);

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].description, "Consulting work");
        assert_eq!(items[0].amount, dec("1250.00"));
        assert_eq!(items[0].quantity, 1);
        assert_eq!(items[0].rate, items[0].amount);
        assert_eq!(items[0].source, LineItemSource::OcrPositioned);
        assert_eq!(items[1].description, "Hosting");
        assert_eq!(items[1].amount, dec("60.50"));
    }

    #[test]
    fn test_row_tolerance_clusters_straddling_tokens() {
        let index = TokenIndex::from_tokens(vec![token("Support", 50, 338), token("€", 380, 342), token("80.00", 400, 341)]);
        let region = TableRegion { page: 0, left: 0, top: 0, right: 500, bottom: 500 };
        let rows = segment_rows(&index, &region, 20);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].len(), 3);
    }

    #[test]
    fn test_rightmost_amount_wins() {
        let tokens = [token("Licenses", 50, 0), token("€10.00", 250, 0), token("€30.00", 400, 0)];
        let row: Vec<&Token> = tokens.iter().collect();
        let item = parse_row(&row, 3).unwrap();
        assert_eq!(item.amount, dec("30.00"));
    }

    #[test]
    fn test_text_fallback_items() {
        let text = "Webdesign € 500.00\nAb € 1.00\nTotaal € 500.00\nBtw 21% € 105.00\nno amount here";
        let items = items_from_text(text, 3);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].description, "Webdesign");
        assert_eq!(items[0].confidence, 0.6);
        assert_eq!(items[0].source, LineItemSource::TextFallback);
    }

    #[test]
    fn test_falls_back_to_text_without_table() {
        let items = extract_line_items(&TokenIndex::default(), "Hosting € 60.50", &ExtractionConfig::default());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].amount, dec("60.50"));
    }
}
