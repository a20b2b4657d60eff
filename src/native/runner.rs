//! The native automation boundary: one script in, text out.

use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use super::outcome::FailureKind;

/// A failed script run, tagged at the point of failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerError {
    pub kind: FailureKind,
    pub detail: String,
}

impl RunnerError {
    /// Build an error with an explicit tag.
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    /// Build an error from native error text, tagging it by the native
    /// error code it carries.
    pub fn from_native(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        Self {
            kind: classify_native_error(&detail),
            detail,
        }
    }
}

impl fmt::Display for RunnerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.detail)
    }
}

impl std::error::Error for RunnerError {}

/// Tag native error text by the Apple Event error it reports.
///
/// - `-1743` (errAEEventNotPermitted) and the "not authorized" / "not
///   allowed assistive access" wordings are access failures.  A bare
///   `-1719` is an invalid index and stays a native error.
/// - `-1712` (errAETimeout) is a native-side timeout.
/// - Everything else is an opaque native error.
pub fn classify_native_error(detail: &str) -> FailureKind {
    let lower = detail.to_ascii_lowercase();
    if lower.contains("-1743")
        || lower.contains("not authorized to send apple events")
        || lower.contains("not allowed assistive access")
        || lower.contains("not allowed to send keystrokes")
    {
        FailureKind::AccessDenied
    } else if lower.contains("-1712") || lower.contains("appleevent timed out") {
        FailureKind::Timeout
    } else {
        FailureKind::NativeError
    }
}

/// Executes one script against the host's automation subsystem.
///
/// Implementations are synchronous from the caller's point of view and may
/// be arbitrarily slow; callers bound them with a timeout.
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    /// Run `script` and return its trimmed standard output.
    async fn run(&self, script: &str) -> Result<String, RunnerError>;
}

/// Production runner that shells out to `osascript -e <script>`.
///
/// The child is spawned with `kill_on_drop(false)`: when the caller abandons
/// the run after a timeout, the script keeps running and may still apply its
/// effect.
pub struct OsascriptRunner {
    path: PathBuf,
}

impl OsascriptRunner {
    /// Create a runner using the interpreter at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The interpreter path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for OsascriptRunner {
    fn default() -> Self {
        Self::new("/usr/bin/osascript")
    }
}

#[async_trait]
impl ScriptRunner for OsascriptRunner {
    async fn run(&self, script: &str) -> Result<String, RunnerError> {
        let output = tokio::process::Command::new(&self.path)
            .arg("-e")
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(false)
            .output()
            .await
            .map_err(|e| {
                RunnerError::new(
                    FailureKind::NativeError,
                    format!("failed to spawn {}: {e}", self.path.display()),
                )
            })?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).trim().to_owned());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
        let detail = if stderr.is_empty() {
            format!(
                "script exited with code {}",
                output.status.code().unwrap_or(-1)
            )
        } else {
            stderr
        };
        Err(RunnerError::from_native(detail))
    }
}
