//! Order-number extraction from free text (mail subjects and bodies).
//!
//! Heuristic and intentionally conservative: a number is only accepted when it
//! is introduced by `#` or by an order keyword, and has between
//! [`MIN_DIGITS`] and [`MAX_DIGITS`] digits.

use orderlink_core::OrderNumber;

pub const MIN_DIGITS: usize = 3;
pub const MAX_DIGITS: usize = 12;

const KEYWORDS: &[&str] = &[
    "order number",
    "order no",
    "order nr",
    "order",
    "bestellnummer",
    "bestellung",
    "auftrag",
];

/// Find the first plausible order number in `text`.
pub fn extract_order_number(text: &str) -> Option<OrderNumber> {
    let lower = text.to_lowercase();
    let haystack = lower.as_str();
    let bytes = haystack.as_bytes();

    let mut best: Option<(usize, OrderNumber)> = None;
    let mut consider = |pos: usize, digits: &str| {
        if best.as_ref().is_none_or(|(p, _)| pos < *p) {
            if let Ok(n) = OrderNumber::parse(digits) {
                best = Some((pos, n));
            }
        }
    };

    for (pos, b) in bytes.iter().enumerate() {
        if *b == b'#' {
            if let Some(digits) = digits_at(haystack, pos + 1) {
                consider(pos, digits);
            }
        }
    }

    for keyword in KEYWORDS {
        let mut from = 0;
        while let Some(found) = haystack[from..].find(keyword) {
            let start = from + found;
            let after = start + keyword.len();
            from = after;

            if start > 0 && bytes[start - 1].is_ascii_alphanumeric() {
                continue;
            }
            let value_start = skip_separators(haystack, after);
            if let Some(digits) = digits_at(haystack, value_start) {
                consider(start, digits);
            }
        }
    }

    best.map(|(_, n)| n)
}

/// Subject first, then body.
pub fn extract_order_number_from_parts(subject: Option<&str>, body: Option<&str>) -> Option<OrderNumber> {
    subject
        .and_then(extract_order_number)
        .or_else(|| body.and_then(extract_order_number))
}

fn skip_separators(s: &str, mut idx: usize) -> usize {
    let bytes = s.as_bytes();
    // Allow things like "order: #4521", "order no. 4521", "order-4521".
    while idx < bytes.len() && matches!(bytes[idx], b' ' | b'\t' | b':' | b'.' | b'#' | b'-') {
        idx += 1;
    }
    idx
}

fn digits_at(s: &str, idx: usize) -> Option<&str> {
    let bytes = s.as_bytes();
    if idx >= bytes.len() {
        return None;
    }
    let end = bytes[idx..]
        .iter()
        .position(|b| !b.is_ascii_digit())
        .map_or(bytes.len(), |off| idx + off);
    let len = end - idx;

    // Reject runs glued to letters ("#123abc") and out-of-range lengths.
    if end < bytes.len() && bytes[end].is_ascii_alphabetic() {
        return None;
    }
    (MIN_DIGITS..=MAX_DIGITS).contains(&len).then(|| &s[idx..end])
}
