//! Word-level token index with normalized text lookup.

use std::collections::HashMap;

use tracing::debug;

use super::{OcrPage, Token};

/// Normalize token text for lookup: trimmed, lowercased, trailing `.,;:` removed.
pub fn normalize_token(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .trim_end_matches(['.', ',', ';', ':'])
        .to_string()
}

/// All tokens of one document, ordered by page, line and left edge.
///
/// Lookups by normalized text return every matching token in document
/// order, so repeated words are never lost.
#[derive(Debug, Clone, Default)]
pub struct TokenIndex {
    pages: Vec<Vec<Token>>,
    by_text: HashMap<String, Vec<(usize, usize)>>,
}

impl TokenIndex {
    /// Build the index from per-page recognition output.
    pub fn build(pages: &[OcrPage]) -> Self {
        Self::from_tokens(pages.iter().flat_map(|p| p.tokens.iter().cloned()))
    }

    /// Build the index from loose tokens.
    pub fn from_tokens(tokens: impl IntoIterator<Item = Token>) -> Self {
        let mut pages: Vec<Vec<Token>> = Vec::new();

        for token in tokens {
            if token.text.trim().is_empty() {
                continue;
            }
            if pages.len() <= token.page {
                pages.resize_with(token.page + 1, Vec::new);
            }
            pages[token.page].push(token);
        }

        for page in &mut pages {
            page.sort_by_key(|t| (t.line, t.bbox.left));
        }

        let mut by_text: HashMap<String, Vec<(usize, usize)>> = HashMap::new();
        for (page_idx, page) in pages.iter().enumerate() {
            for (token_idx, token) in page.iter().enumerate() {
                by_text
                    .entry(normalize_token(&token.text))
                    .or_default()
                    .push((page_idx, token_idx));
            }
        }

        let index = Self { pages, by_text };
        debug!(
            "Indexed {} tokens across {} pages ({} distinct words)",
            index.len(),
            index.page_count(),
            index.by_text.len()
        );
        index
    }

    pub fn len(&self) -> usize {
        self.pages.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.iter().all(Vec::is_empty)
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// All tokens in document order.
    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.pages.iter().flatten()
    }

    /// Tokens of one page in document order.
    pub fn page_tokens(&self, page: usize) -> &[Token] {
        self.pages.get(page).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every token whose normalized text equals the normalized `word`.
    pub fn lookup(&self, word: &str) -> Vec<&Token> {
        self.by_text
            .get(&normalize_token(word))
            .map(|positions| {
                positions
                    .iter()
                    .map(|&(page, idx)| &self.pages[page][idx])
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Tokens on the anchor's page whose top edge lies strictly within
    /// `tolerance` pixels of the anchor's top edge, sorted left to right.
    pub fn row(&self, anchor: &Token, tolerance: i32) -> Vec<&Token> {
        let mut row: Vec<&Token> = self
            .page_tokens(anchor.page)
            .iter()
            .filter(|t| t.vertical_distance(anchor) < tolerance)
            .collect();
        row.sort_by_key(|t| t.bbox.left);
        row
    }

    /// Text of the row around `anchor`, tokens joined by single spaces.
    pub fn row_text(&self, anchor: &Token, tolerance: i32) -> String {
        self.row(anchor, tolerance)
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Tokens sharing the anchor's OCR line and block, sorted left to right.
    pub fn line_of(&self, anchor: &Token) -> Vec<&Token> {
        let mut line: Vec<&Token> = self
            .page_tokens(anchor.page)
            .iter()
            .filter(|t| t.line == anchor.line && t.block == anchor.block)
            .collect();
        line.sort_by_key(|t| t.bbox.left);
        line
    }

    /// Mean confidence over all tokens, 0.0 when empty.
    pub fn mean_confidence(&self) -> f32 {
        let count = self.len();
        if count == 0 {
            return 0.0;
        }
        self.tokens().map(|t| t.confidence).sum::<f32>() / count as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::BoundingBox;

    fn token(text: &str, page: usize, left: i32, top: i32, line: usize) -> Token {
        Token::new(text, page, BoundingBox::new(left, top, 40, 12), 0.9, line, 0)
    }

    #[test]
    fn test_normalize_token() {
        assert_eq!(normalize_token("Totaal:"), "totaal");
        assert_eq!(normalize_token("  B.V. "), "b.v");
        assert_eq!(normalize_token("FACTUUR"), "factuur");
    }

    #[test]
    fn test_lookup_returns_all_occurrences() {
        let index = TokenIndex::from_tokens(vec![
            token("Totaal", 0, 10, 500, 5),
            token("€", 0, 300, 500, 5),
            token("totaal:", 1, 10, 700, 2),
        ]);

        let matches = index.lookup("TOTAAL");
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].page, 0);
        assert_eq!(matches[1].page, 1);
        assert!(index.lookup("missing").is_empty());
    }

    #[test]
    fn test_document_order() {
        let index = TokenIndex::from_tokens(vec![
            token("second", 0, 200, 10, 0),
            token("third", 0, 10, 40, 1),
            token("first", 0, 10, 10, 0),
            token("fourth", 1, 10, 10, 0),
        ]);

        let words: Vec<&str> = index.tokens().map(|t| t.text.as_str()).collect();
        assert_eq!(words, vec!["first", "second", "third", "fourth"]);
        assert_eq!(index.page_count(), 2);
    }

    #[test]
    fn test_empty_tokens_are_skipped() {
        let index = TokenIndex::from_tokens(vec![token("  ", 0, 0, 0, 0)]);
        assert!(index.is_empty());
        assert_eq!(index.mean_confidence(), 0.0);
    }

    #[test]
    fn test_row_stays_on_page() {
        let index = TokenIndex::from_tokens(vec![
            token("Btw", 0, 10, 100, 0),
            token("21%", 0, 60, 105, 0),
            token("€", 0, 300, 150, 1),
            token("other", 1, 10, 100, 0),
        ]);
        let anchor = index.lookup("btw")[0];
        assert_eq!(index.row_text(anchor, 20), "Btw 21%");
    }
}
