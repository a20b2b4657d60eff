//! Sources of contact directory listings.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::access::AccessGate;
use crate::apps::PimApp;
use crate::error::Result;
use crate::native::NativeCommand;

use super::ContactRecord;

/// Separates fields (name, then each number) within one listing record.
pub const FIELD_SEPARATOR: char = '\u{1f}';

/// Separates records in a listing.
pub const RECORD_SEPARATOR: char = '\u{1e}';

/// Provides the full contacts directory, in enumeration order.
#[async_trait]
pub trait ContactDirectory: Send + Sync {
    /// Fetch every entry.  Called once per resolution request.
    async fn fetch_all(&self) -> Result<Vec<ContactRecord>>;
}

/// Directory backed by the Contacts application.
pub struct NativeContactDirectory {
    gate: AccessGate,
    fetch_timeout: Duration,
}

impl NativeContactDirectory {
    pub fn new(gate: AccessGate, fetch_timeout: Duration) -> Self {
        Self {
            gate,
            fetch_timeout,
        }
    }

    fn listing_command(&self) -> NativeCommand {
        let limits = self.gate.invoker().limits();
        let script = format!(
            "{prelude}\
set fieldSep to character id 31
set recordSep to character id 30
set out to {{}}
tell application \"Contacts\"
    set n to 0
    repeat with p in people
        set n to n + 1
        if n > maxItems then exit repeat
        set nm to name of p
        if nm is missing value then set nm to \"\"
        if (length of nm) > maxChars then set nm to text 1 thru maxChars of nm
        set entry to nm
        repeat with ph in phones of p
            set entry to entry & fieldSep & (value of ph)
        end repeat
        set end of out to entry
    end repeat
end tell
set AppleScript's text item delimiters to recordSep
set joined to out as text
set AppleScript's text item delimiters to \"\"
return joined",
            prelude = limits.prelude()
        );
        NativeCommand::new(PimApp::Contacts, script).with_timeout(self.fetch_timeout)
    }
}

#[async_trait]
impl ContactDirectory for NativeContactDirectory {
    async fn fetch_all(&self) -> Result<Vec<ContactRecord>> {
        self.gate.require(PimApp::Contacts).await?;
        let listing = self
            .gate
            .invoker()
            .execute(&self.listing_command())
            .await
            .into_result(PimApp::Contacts)?
            .into_text();
        let records = parse_listing(&listing);
        tracing::debug!(entries = records.len(), "fetched contacts directory");
        Ok(records)
    }
}

/// Decode a listing produced by the enumeration script.
///
/// Entries without a name are skipped.
pub fn parse_listing(listing: &str) -> Vec<ContactRecord> {
    listing
        .split(RECORD_SEPARATOR)
        .filter_map(|record| {
            let mut fields = record.split(FIELD_SEPARATOR);
            let name = fields.next()?.trim();
            if name.is_empty() {
                return None;
            }
            Some(ContactRecord::new(name, fields.map(str::trim)))
        })
        .collect()
}

/// Fixed in-memory directory.
#[derive(Default)]
pub struct StaticDirectory {
    records: Vec<ContactRecord>,
    fetches: AtomicUsize,
}

impl StaticDirectory {
    pub fn new(records: Vec<ContactRecord>) -> Self {
        Self {
            records,
            fetches: AtomicUsize::new(0),
        }
    }

    /// Number of times the directory was fetched.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContactDirectory for StaticDirectory {
    async fn fetch_all(&self) -> Result<Vec<ContactRecord>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.records.clone())
    }
}
