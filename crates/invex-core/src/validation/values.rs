//! Lenient parsing of amounts and dates as models write them.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use serde_json::Value;

lazy_static! {
    static ref CURRENCY: Regex = Regex::new(
        r"(?i)\b(?:INR|USD|EUR|GBP|PLN|Rs\.?)|[₹$€£¥]|zł"
    ).unwrap();

    static ref AMOUNT_BODY: Regex = Regex::new(
        r"^-?[\d\s\u{00a0}',.]*\d[\d\s\u{00a0}',.]*$"
    ).unwrap();
}

/// Formats tried in order; day-first wins over month-first.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d-%m-%Y",
    "%d/%m/%Y",
    "%d.%m.%Y",
    "%m/%d/%Y",
    "%d-%m-%y",
    "%d/%m/%y",
    "%d.%m.%y",
    "%d-%b-%Y",
    "%d-%b-%y",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%b %d %Y",
    "%B %d %Y",
];

/// Parse a monetary value: a JSON number, or a string with optional
/// currency marks and thousands separators.
pub fn parse_amount(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .ok(),
        Value::String(s) => parse_amount_text(s),
        _ => None,
    }
}

/// Parse amount text such as `"₹1,23,456.50"`, `"1 234,56 zł"` or `"USD 99"`.
pub fn parse_amount_text(s: &str) -> Option<Decimal> {
    let stripped = CURRENCY.replace_all(s, "");
    let body = stripped.trim().trim_end_matches(['/', '-']).trim();
    if !AMOUNT_BODY.is_match(body) {
        return None;
    }

    let negative = body.starts_with('-');
    let cleaned: String = body
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();

    let normalized = match (cleaned.rfind(','), cleaned.rfind('.')) {
        // Comma after the last dot is the decimal separator
        (Some(c), Some(d)) if c > d => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(c), None) => {
            let groups = cleaned.matches(',').count();
            if groups > 1 || cleaned.len() - c - 1 == 3 {
                cleaned.replace(',', "")
            } else {
                cleaned.replace(',', ".")
            }
        }
        (None, _) => cleaned,
    };

    let amount = Decimal::from_str(&normalized).ok()?;
    Some(if negative { -amount } else { amount })
}

/// Parse a date in any of the common invoice notations.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_amount_numbers() {
        assert_eq!(parse_amount(&json!(100)), Some(dec("100")));
        assert_eq!(parse_amount(&json!(12.5)), Some(dec("12.5")));
        assert_eq!(parse_amount(&json!(null)), None);
        assert_eq!(parse_amount(&json!(true)), None);
    }

    #[test]
    fn test_amount_strings() {
        assert_eq!(parse_amount_text("1,234.50"), Some(dec("1234.50")));
        assert_eq!(parse_amount_text("₹1,23,456.00"), Some(dec("123456.00")));
        assert_eq!(parse_amount_text("1 234,56 zł"), Some(dec("1234.56")));
        assert_eq!(parse_amount_text("1.234,56"), Some(dec("1234.56")));
        assert_eq!(parse_amount_text("Rs. 500"), Some(dec("500")));
        assert_eq!(parse_amount_text("USD 99.99"), Some(dec("99.99")));
        assert_eq!(parse_amount_text("12,5"), Some(dec("12.5")));
        assert_eq!(parse_amount_text("1,234"), Some(dec("1234")));
        assert_eq!(parse_amount_text("-40.00"), Some(dec("-40.00")));
    }

    #[test]
    fn test_amount_rejects_text() {
        assert_eq!(parse_amount_text("see attached"), None);
        assert_eq!(parse_amount_text("Call 555 1234"), None);
        assert_eq!(parse_amount_text(""), None);
        assert_eq!(parse_amount_text("$"), None);
    }

    #[test]
    fn test_dates() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 1);
        assert_eq!(parse_date("2024-03-01"), expected);
        assert_eq!(parse_date("01/03/2024"), expected);
        assert_eq!(parse_date("01.03.2024"), expected);
        assert_eq!(parse_date("01-Mar-2024"), expected);
        assert_eq!(parse_date("1 March 2024"), expected);
        assert_eq!(parse_date("March 1, 2024"), expected);
        assert_eq!(parse_date("2024-03-01T10:00:00Z"), expected);
        assert_eq!(parse_date("12/31/2024"), NaiveDate::from_ymd_opt(2024, 12, 31));
    }

    #[test]
    fn test_dates_rejected() {
        assert_eq!(parse_date("YYYY-MM-DD"), None);
        assert_eq!(parse_date("next Tuesday"), None);
        assert_eq!(parse_date(" "), None);
        assert_eq!(parse_date("2024-02-30"), None);
    }
}
