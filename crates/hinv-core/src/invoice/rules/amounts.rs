//! Monetary amount parsing.

use rust_decimal::Decimal;
use std::str::FromStr;

/// Parse an amount such as `1,234.56`, `1.234,56`, `€ 60,50` or `100.00`.
///
/// When both separators occur, the one that comes last is the decimal
/// separator. A lone comma is treated as the decimal separator.
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();

    let normalized = match (cleaned.rfind(','), cleaned.rfind('.')) {
        (Some(c), Some(d)) if c > d => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(_), None) => cleaned.replace(',', "."),
        _ => cleaned,
    };

    Decimal::from_str(&normalized).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("100.00"), Some(dec("100.00")));
        assert_eq!(parse_amount("€ 1,234.56"), Some(dec("1234.56")));
        assert_eq!(parse_amount("1.234,56"), Some(dec("1234.56")));
        assert_eq!(parse_amount("60,50"), Some(dec("60.50")));
        assert_eq!(parse_amount("€"), None);
    }
}
