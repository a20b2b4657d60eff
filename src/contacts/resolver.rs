//! Resolves names and numbers to directory entries.

use std::sync::Arc;

use crate::error::{PimError, Result};

use super::directory::ContactDirectory;
use super::matching::match_names;
use super::phone::NormalizedPhone;
use super::ContactRecord;

/// Resolves human-supplied identifiers against a [`ContactDirectory`].
///
/// A directory fetch that times out degrades to "no matches" so an agent
/// keeps a usable tool.  Access denial and native errors are surfaced.
#[derive(Clone)]
pub struct ContactResolver {
    directory: Arc<dyn ContactDirectory>,
    min_suffix_digits: usize,
}

impl ContactResolver {
    pub fn new(directory: Arc<dyn ContactDirectory>, min_suffix_digits: usize) -> Self {
        Self {
            directory,
            min_suffix_digits,
        }
    }

    /// Entries whose name matches `term`, from the strongest matching
    /// strategy only, in directory order.
    ///
    /// A blank term returns an empty list without fetching the directory.
    pub async fn resolve(&self, term: &str) -> Result<Vec<ContactRecord>> {
        if term.trim().is_empty() {
            return Ok(Vec::new());
        }
        let Some(directory) = self.fetch().await? else {
            return Ok(Vec::new());
        };
        match match_names(&directory, term) {
            Some((stage, hits)) => {
                tracing::debug!(?stage, matches = hits.len(), "contact name resolved");
                Ok(hits.into_iter().cloned().collect())
            }
            None => Ok(Vec::new()),
        }
    }

    /// First entry holding a number equivalent to `phone`.
    ///
    /// # Errors
    ///
    /// [`PimError::InvalidInput`] when `phone` contains no digits, before
    /// any fetch.
    pub async fn resolve_by_phone(&self, phone: &str) -> Result<Option<ContactRecord>> {
        let query = NormalizedPhone::new(phone);
        if query.canonical_digits.is_empty() {
            return Err(PimError::InvalidInput(format!(
                "phone number {phone:?} contains no digits"
            )));
        }
        let Some(directory) = self.fetch().await? else {
            return Ok(None);
        };
        Ok(directory
            .into_iter()
            .find(|record| record.has_number(&query, self.min_suffix_digits)))
    }

    async fn fetch(&self) -> Result<Option<Vec<ContactRecord>>> {
        match self.directory.fetch_all().await {
            Ok(records) => Ok(Some(records)),
            Err(err) if !err.is_surfaced() => {
                tracing::warn!(error = %err, "contacts directory fetch timed out; returning no matches");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}
