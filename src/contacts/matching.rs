//! Name-matching strategy chain.
//!
//! Stages run strongest first and stop at the first stage that matches
//! anything.  Within a stage, directory order is preserved.
//!
//! The token stages compare undecorated tokens, so they still find
//! punctuation-split names (`O'Brien` for `obrien`) that the raw substring
//! stages miss.

use serde::{Deserialize, Serialize};

use super::ContactRecord;

/// Matching strategies in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStage {
    /// Whole name equals the term, ignoring case.
    Exact,
    /// Whole name equals the term once emoji and punctuation are removed.
    ExactUndecorated,
    /// Name starts with the term.
    Prefix,
    /// Name contains the term.
    Contains,
    /// First or last name token equals the term.
    NameToken,
    /// Some name token contains the term.
    TokenContains,
}

impl MatchStage {
    pub const ORDER: [MatchStage; 6] = [
        MatchStage::Exact,
        MatchStage::ExactUndecorated,
        MatchStage::Prefix,
        MatchStage::Contains,
        MatchStage::NameToken,
        MatchStage::TokenContains,
    ];

    fn matches(self, name: &str, term: &Term) -> bool {
        let lower = name.to_lowercase();
        match self {
            MatchStage::Exact => lower == term.lower,
            MatchStage::ExactUndecorated => {
                !term.undecorated.is_empty() && undecorate(&lower) == term.undecorated
            }
            MatchStage::Prefix => lower.starts_with(&term.lower),
            MatchStage::Contains => lower.contains(&term.lower),
            MatchStage::NameToken => {
                let undecorated = undecorate(&lower);
                let tokens: Vec<&str> = undecorated.split(' ').collect();
                let term = term.undecorated.as_str();
                !term.is_empty() && (tokens.first() == Some(&term) || tokens.last() == Some(&term))
            }
            MatchStage::TokenContains => {
                !term.undecorated.is_empty()
                    && undecorate(&lower)
                        .split(' ')
                        .any(|token| token.contains(&term.undecorated))
            }
        }
    }
}

struct Term {
    lower: String,
    undecorated: String,
}

/// Lowercase alphanumerics of `text`, words separated by single spaces.
fn undecorate(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            word.chars()
                .filter(|c| c.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect::<String>()
        })
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run the chain for `term` over `directory`.
///
/// Returns the stage that matched together with the matches, or `None` when
/// no stage matches or the term is blank.
pub fn match_names<'a>(
    directory: &'a [ContactRecord],
    term: &str,
) -> Option<(MatchStage, Vec<&'a ContactRecord>)> {
    let trimmed = term.trim();
    if trimmed.is_empty() {
        return None;
    }
    let term = Term {
        lower: trimmed.to_lowercase(),
        undecorated: undecorate(trimmed),
    };

    MatchStage::ORDER.iter().find_map(|stage| {
        let hits: Vec<&ContactRecord> = directory
            .iter()
            .filter(|record| stage.matches(&record.display_name, &term))
            .collect();
        (!hits.is_empty()).then_some((*stage, hits))
    })
}
