//! In-process [`ScriptRunner`] used by tests.
//!
//! Replies are chosen by substring rules over the script text, evaluated in
//! registration order; the first matching rule wins.  Every run is recorded
//! so tests can assert exactly which scripts were (or were not) dispatched.

use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::outcome::FailureKind;
use super::runner::{RunnerError, ScriptRunner};

/// A canned reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Succeed with this standard output.
    Ok(String),
    /// Fail with this tag and detail.
    Fail(FailureKind, String),
    /// Wait, then produce the inner reply.
    Delayed(Duration, Box<MockReply>),
    /// Never complete.
    Hang,
}

impl MockReply {
    /// Succeed with `text`.
    pub fn ok(text: impl Into<String>) -> Self {
        MockReply::Ok(text.into())
    }

    /// Fail with `kind` and `detail`.
    pub fn fail(kind: FailureKind, detail: impl Into<String>) -> Self {
        MockReply::Fail(kind, detail.into())
    }

    /// Succeed with `text` after `delay`.
    pub fn delayed(delay: Duration, text: impl Into<String>) -> Self {
        MockReply::Delayed(delay, Box::new(MockReply::ok(text)))
    }
}

struct Rule {
    pattern: String,
    reply: MockReply,
}

/// Scripted stand-in for the native automation subsystem.
pub struct MockRunner {
    rules: Mutex<Vec<Rule>>,
    fallback: Mutex<MockReply>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockRunner {
    /// A runner whose unmatched scripts fail with a native error.
    pub fn new() -> Self {
        Self {
            rules: Mutex::new(Vec::new()),
            fallback: Mutex::new(MockReply::fail(
                FailureKind::NativeError,
                "no mock reply registered for script",
            )),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Reply with `reply` to scripts containing `pattern`.
    #[must_use]
    pub fn on(self, pattern: impl Into<String>, reply: MockReply) -> Self {
        self.add_rule(pattern, reply);
        self
    }

    /// Reply with `reply` to scripts no rule matches.
    #[must_use]
    pub fn otherwise(self, reply: MockReply) -> Self {
        self.set_fallback(reply);
        self
    }

    /// Add a rule after construction.  Earlier rules keep priority.
    pub fn add_rule(&self, pattern: impl Into<String>, reply: MockReply) {
        let mut rules = self.rules.lock().unwrap_or_else(|e| e.into_inner());
        rules.push(Rule {
            pattern: pattern.into(),
            reply,
        });
    }

    /// Replace the fallback reply after construction.
    pub fn set_fallback(&self, reply: MockReply) {
        *self.fallback.lock().unwrap_or_else(|e| e.into_inner()) = reply;
    }

    /// Every script run so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of scripts run so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Number of scripts run so far that contain `pattern`.
    pub fn calls_matching(&self, pattern: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|script| script.contains(pattern))
            .count()
    }

    /// Highest number of runs observed in flight at once.
    pub fn max_concurrency(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn reply_for(&self, script: &str) -> MockReply {
        let rules = self.rules.lock().unwrap_or_else(|e| e.into_inner());
        rules
            .iter()
            .find(|rule| script.contains(&rule.pattern))
            .map(|rule| rule.reply.clone())
            .unwrap_or_else(|| {
                self.fallback
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .clone()
            })
    }
}

impl Default for MockRunner {
    fn default() -> Self {
        Self::new()
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ScriptRunner for MockRunner {
    async fn run(&self, script: &str) -> Result<String, RunnerError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(script.to_owned());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        let mut reply = self.reply_for(script);
        loop {
            match reply {
                MockReply::Ok(text) => return Ok(text),
                MockReply::Fail(kind, detail) => return Err(RunnerError::new(kind, detail)),
                MockReply::Delayed(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    reply = *inner;
                }
                MockReply::Hang => std::future::pending::<()>().await,
            }
        }
    }
}

/// Encode a contacts directory listing in the wire format the contacts
/// enumeration script produces.
pub fn directory_listing(entries: &[(&str, &[&str])]) -> String {
    use crate::contacts::directory::{FIELD_SEPARATOR, RECORD_SEPARATOR};

    entries
        .iter()
        .map(|(name, phones)| {
            let mut fields = vec![(*name).to_owned()];
            fields.extend(phones.iter().map(|p| (*p).to_owned()));
            fields.join(&FIELD_SEPARATOR.to_string())
        })
        .collect::<Vec<_>>()
        .join(&RECORD_SEPARATOR.to_string())
}
