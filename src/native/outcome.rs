//! Classified results of a native dispatch.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::apps::PimApp;
use crate::error::PimError;

/// Why a native dispatch failed.
///
/// The tag is assigned where the failure is first observed (the runner, the
/// invoker's timer, or the sentinel parser) and is never re-derived from
/// message text afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The process is not authorized to automate the target application.
    AccessDenied,
    /// The dispatch exceeded its time budget and was abandoned.
    Timeout,
    /// Any other native-side failure.
    NativeError,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::AccessDenied => "access_denied",
            FailureKind::Timeout => "timeout",
            FailureKind::NativeError => "native_error",
        };
        f.write_str(s)
    }
}

/// Successful output of a native dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    /// Plain text output (trimmed).
    Text(String),
    /// Output that parsed as a JSON document.
    Structured(serde_json::Value),
}

impl NativeValue {
    /// Shape raw interpreter output: JSON objects/arrays become
    /// [`NativeValue::Structured`], anything else is trimmed text.
    pub fn from_output(raw: &str) -> Self {
        let trimmed = raw.trim();
        if (trimmed.starts_with('{') || trimmed.starts_with('['))
            && let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed)
        {
            return NativeValue::Structured(value);
        }
        NativeValue::Text(trimmed.to_owned())
    }

    /// The value as text.  Structured values are rendered as compact JSON.
    pub fn into_text(self) -> String {
        match self {
            NativeValue::Text(text) => text,
            NativeValue::Structured(value) => value.to_string(),
        }
    }
}

/// Result of one native dispatch.  Dispatch never raises; every outcome is
/// one of these two variants.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Success(NativeValue),
    Failure { kind: FailureKind, detail: String },
}

impl CommandOutcome {
    /// Shorthand for a failure outcome.
    pub fn failure(kind: FailureKind, detail: impl Into<String>) -> Self {
        CommandOutcome::Failure {
            kind,
            detail: detail.into(),
        }
    }

    /// Whether the dispatch succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, CommandOutcome::Success(_))
    }

    /// The failure tag, if any.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            CommandOutcome::Success(_) => None,
            CommandOutcome::Failure { kind, .. } => Some(*kind),
        }
    }

    /// Convert into a [`PimError`]-typed result for `app`.
    ///
    /// Access failures carry the full remediation text for `app`.
    pub fn into_result(self, app: PimApp) -> Result<NativeValue, PimError> {
        match self {
            CommandOutcome::Success(value) => Ok(value),
            CommandOutcome::Failure {
                kind: FailureKind::AccessDenied,
                detail,
            } => Err(PimError::AccessDenied {
                app,
                message: crate::access::denial_message(app, Some(&detail)),
            }),
            CommandOutcome::Failure {
                kind: FailureKind::Timeout,
                detail,
            } => Err(PimError::Timeout(detail)),
            CommandOutcome::Failure {
                kind: FailureKind::NativeError,
                detail,
            } => Err(PimError::NativeExecution(detail)),
        }
    }
}
