//! Phone-number normalization and equivalence.

use serde::{Deserialize, Serialize};

/// A phone number as stored, plus its canonical digits-only form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedPhone {
    pub raw: String,
    pub canonical_digits: String,
}

impl NormalizedPhone {
    pub fn new(raw: &str) -> Self {
        Self {
            raw: raw.to_owned(),
            canonical_digits: canonical_digits(raw),
        }
    }

    /// See [`numbers_equivalent`].
    pub fn is_equivalent(&self, other: &NormalizedPhone, min_suffix_digits: usize) -> bool {
        numbers_equivalent(&self.canonical_digits, &other.canonical_digits, min_suffix_digits)
    }
}

/// Digits-only form of `raw`.
///
/// Punctuation, spaces, the leading `+`, and any letters are dropped.  The
/// output contains only ASCII digits, so applying it twice changes nothing.
pub fn canonical_digits(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

/// Whether two canonical forms denote the same number.
///
/// Equal non-empty forms are equivalent.  Otherwise the shorter must be a
/// suffix of the longer and at least `min_suffix_digits` long, which
/// tolerates a missing or extra country code without letting short
/// fragments match unrelated numbers.
pub fn numbers_equivalent(a: &str, b: &str, min_suffix_digits: usize) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a == b {
        return true;
    }
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    short.len() >= min_suffix_digits.max(1) && long.ends_with(short)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_formatting() {
        assert_eq!(canonical_digits("+1 (999) 999-9999"), "19999999999");
        assert_eq!(canonical_digits("999.999.9999"), "9999999999");
        assert_eq!(canonical_digits("no digits"), "");
    }

    #[test]
    fn normalization_is_idempotent() {
        for raw in ["+1 9999999999", "(020) 7946-0018", "", "tel:+44 20 7946 0018 ext. 4", "١٢٣"] {
            let once = canonical_digits(raw);
            assert_eq!(canonical_digits(&once), once, "{raw}");
        }
    }

    #[test]
    fn country_code_variance_is_equivalent() {
        let a = NormalizedPhone::new("+1 9999999999");
        let b = NormalizedPhone::new("9999999999");
        assert!(a.is_equivalent(&b, 10));
        assert!(b.is_equivalent(&a, 10));
    }

    #[test]
    fn short_suffix_is_not_enough() {
        assert!(!numbers_equivalent("15550100", "0100", 10));
        assert!(!numbers_equivalent("4420794600", "20794600", 10));
    }

    #[test]
    fn threshold_is_configurable() {
        assert!(numbers_equivalent("4420794600", "20794600", 8));
    }

    #[test]
    fn empty_never_matches() {
        assert!(!numbers_equivalent("", "", 10));
        assert!(!numbers_equivalent("", "5550100", 0));
    }

    #[test]
    fn equal_short_numbers_match() {
        assert!(numbers_equivalent("911", "911", 10));
    }
}
