//! Contact resolution.
//!
//! A human-supplied identifier (a name with inconsistent spelling, or a
//! phone number in any format) is resolved against the native contacts
//! directory.  The directory is fetched fresh for every request and never
//! persisted.

pub mod directory;
pub mod matching;
pub mod phone;
pub mod resolver;

use serde::{Deserialize, Serialize};

pub use directory::{ContactDirectory, NativeContactDirectory, StaticDirectory};
pub use matching::{MatchStage, match_names};
pub use phone::{NormalizedPhone, canonical_digits, numbers_equivalent};
pub use resolver::ContactResolver;

/// One entry of the contacts directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactRecord {
    pub display_name: String,
    /// Numbers in directory order.
    pub phone_numbers: Vec<NormalizedPhone>,
}

impl ContactRecord {
    /// Build a record, normalizing each raw number.  Numbers without any
    /// digit are dropped.
    pub fn new<I, S>(display_name: impl Into<String>, phones: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            display_name: display_name.into(),
            phone_numbers: phones
                .into_iter()
                .map(|raw| NormalizedPhone::new(raw.as_ref()))
                .filter(|phone| !phone.canonical_digits.is_empty())
                .collect(),
        }
    }

    /// Whether any stored number is equivalent to `query`.
    pub fn has_number(&self, query: &NormalizedPhone, min_suffix_digits: usize) -> bool {
        self.phone_numbers
            .iter()
            .any(|phone| phone.is_equivalent(query, min_suffix_digits))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn record_drops_numbers_without_digits() {
        let record = ContactRecord::new("Ann", ["+1 (555) 010-0000", "n/a", ""]);
        assert_eq!(record.phone_numbers.len(), 1);
        assert_eq!(record.phone_numbers[0].canonical_digits, "15550100000");
    }

    #[test]
    fn record_matches_number_with_or_without_country_code() {
        let record = ContactRecord::new("Ann", ["+1 999 999 9999"]);
        assert!(record.has_number(&NormalizedPhone::new("9999999999"), 10));
        assert!(!record.has_number(&NormalizedPhone::new("9999"), 10));
    }

    #[test]
    fn record_serializes_camel_case() {
        let json = serde_json::to_value(ContactRecord::new("Ann", ["555"])).unwrap();
        assert_eq!(json["displayName"], "Ann");
        assert_eq!(json["phoneNumbers"][0]["canonicalDigits"], "555");
        assert_eq!(json["phoneNumbers"][0]["raw"], "555");
    }
}
