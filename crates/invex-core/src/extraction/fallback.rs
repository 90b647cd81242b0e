//! Invoice number discovery from document text, used when the model
//! cannot name the invoices itself.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

lazy_static! {
    // Labeled numbers: "Invoice No: ABC123", "Invoice Number: INV-001", "Invoice #: X9"
    pub static ref INVOICE_LABEL: Regex = Regex::new(
        r"(?i)\binvoice\s*(?:no\.?|number|num\.?|#)\s*[:#.]?\s*([A-Z0-9][A-Z0-9\-/]*)"
    ).unwrap();

    // "Bill No: 12345", "Bill Number - B/77"
    pub static ref BILL_LABEL: Regex = Regex::new(
        r"(?i)\bbill\s*(?:no\.?|number|num\.?|#)\s*[:#.\-]?\s*([A-Z0-9][A-Z0-9\-/]*)"
    ).unwrap();

    // "INV# 2024-17"
    pub static ref INV_HASH: Regex = Regex::new(
        r"(?i)\bINV\s*#\s*:?\s*([A-Z0-9][A-Z0-9\-/]*)"
    ).unwrap();

    // Bare identifiers such as "INV-7" or "INV/2024/01"
    pub static ref INV_STANDALONE: Regex = Regex::new(
        r"(?i)\b(INV[\-/]?\d[A-Z0-9\-/]*)"
    ).unwrap();
}

/// Find candidate invoice numbers in `text`.
///
/// Returns tokens in order of first appearance without duplicates. Tokens
/// without a digit are ignored so label words are never taken for keys.
pub fn find_candidate_keys(text: &str) -> Vec<String> {
    let patterns: [&Regex; 4] = [&INVOICE_LABEL, &BILL_LABEL, &INV_HASH, &INV_STANDALONE];

    let mut found: Vec<(usize, &str)> = patterns
        .iter()
        .flat_map(|re| re.captures_iter(text))
        .filter_map(|caps| caps.get(1))
        .map(|m| (m.start(), m.as_str().trim_end_matches(['-', '/'])))
        .filter(|(_, token)| token.chars().any(|c| c.is_ascii_digit()))
        .collect();
    found.sort_by_key(|(start, _)| *start);

    let mut keys: Vec<String> = Vec::new();
    for (_, token) in found {
        if !keys.iter().any(|k| k == token) {
            keys.push(token.to_string());
        }
    }

    debug!("Regex fallback found {} candidate keys", keys.len());
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_labeled_forms() {
        let text = "Invoice No: ABC123\nInvoice Number: INV-001\nBill No: 12345\nInvoice #: XYZ789";
        assert_eq!(
            find_candidate_keys(text),
            vec!["ABC123", "INV-001", "12345", "XYZ789"]
        );
    }

    #[test]
    fn test_label_and_standalone_match_once() {
        assert_eq!(find_candidate_keys("Invoice No: INV-7"), vec!["INV-7"]);
    }

    #[test]
    fn test_inv_hash_form() {
        assert_eq!(find_candidate_keys("Ref INV# 2024-17, thanks"), vec!["2024-17"]);
    }

    #[test]
    fn test_deduplicates_in_first_seen_order() {
        let text = "Invoice No: B-2\nInvoice No: A-1\nsee invoice no. B-2 again";
        assert_eq!(find_candidate_keys(text), vec!["B-2", "A-1"]);
    }

    #[test]
    fn test_label_words_are_not_keys() {
        let text = "INVOICE NUMBER\nDate\nTotal due";
        assert!(find_candidate_keys(text).is_empty());
    }

    #[test]
    fn test_trailing_separators_trimmed() {
        assert_eq!(find_candidate_keys("Bill No: 77/ paid"), vec!["77"]);
    }

    #[test]
    fn test_stable_across_calls() {
        let text = "Invoice No: INV/2024/01 and INV-9 and Bill # 5";
        let first = find_candidate_keys(text);
        assert_eq!(first, vec!["INV/2024/01", "INV-9", "5"]);
        assert_eq!(find_candidate_keys(text), first);
    }

    #[test]
    fn test_nothing_found() {
        assert!(find_candidate_keys("").is_empty());
        assert!(find_candidate_keys("Thank you for your business").is_empty());
    }
}
