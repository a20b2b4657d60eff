//! Script construction helpers.

use std::time::Duration;

use crate::apps::PimApp;
use crate::config::InvokerConfig;

/// Produce an AppleScript string literal for `text`.
///
/// Backslashes and double quotes are escaped; NUL characters are dropped and
/// carriage returns are normalised to line feeds.
pub fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\0' => {}
            '\r' => {
                if chars.peek() != Some(&'\n') {
                    out.push('\n');
                }
            }
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

/// Defensive bounds embedded into every generated enumeration script so the
/// native side is never asked for unbounded work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum number of items a script may enumerate.
    pub max_items: usize,
    /// Maximum characters of free text returned per item.
    pub max_content_chars: usize,
}

impl Limits {
    /// Limits taken from the invoker configuration.
    pub fn from_config(config: &InvokerConfig) -> Self {
        Self {
            max_items: config.max_items.max(1),
            max_content_chars: config.max_content_chars.max(1),
        }
    }

    /// AppleScript lines declaring `maxItems` and `maxChars`.
    pub fn prelude(&self) -> String {
        format!(
            "set maxItems to {}\nset maxChars to {}\n",
            self.max_items, self.max_content_chars
        )
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self::from_config(&InvokerConfig::default())
    }
}

/// One script addressed to one application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeCommand {
    /// The application the script drives.  Dispatches to the same
    /// application are serialized.
    pub app: PimApp,
    /// Script source.
    pub script: String,
    /// Budget override; `None` uses the invoker default.
    pub timeout: Option<Duration>,
}

impl NativeCommand {
    /// A command with the invoker's default budget.
    pub fn new(app: PimApp, script: impl Into<String>) -> Self {
        Self {
            app,
            script: script.into(),
            timeout: None,
        }
    }

    /// Override the time budget for this command.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The cheapest command that only succeeds when automation of `app` is
    /// already permitted: read the application's own name.
    pub fn identity_probe(app: PimApp) -> Self {
        Self::new(
            app,
            format!(
                "tell application {} to get name",
                quote(app.application_name())
            ),
        )
    }
}
