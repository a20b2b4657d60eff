//! Error types for native PIM integration.
//!
//! Each variant carries a stable error code (SCREAMING_SNAKE_CASE) exposed via
//! [`PimError::code()`] and an explicit [`ErrorKind`] tag exposed via
//! [`PimError::kind()`].  Callers classify errors by the tag, never by
//! inspecting message text.

use serde::{Deserialize, Serialize};

use crate::apps::PimApp;

/// Stable error codes for programmatic error handling.
pub mod error_codes {
    /// The process lacks automation permission for an application.
    pub const ACCESS_DENIED: &str = "ACCESS_DENIED";

    /// Empty or malformed argument, rejected before any native dispatch.
    pub const INVALID_INPUT: &str = "INVALID_INPUT";

    /// A native call exceeded its time budget and was abandoned.
    pub const TIMEOUT: &str = "TIMEOUT";

    /// Opaque failure reported by the native side.
    pub const NATIVE_ERROR: &str = "NATIVE_ERROR";

    /// An integration module failed to initialize.
    pub const MODULE_LOAD_FAILED: &str = "MODULE_LOAD_FAILED";

    /// Invalid or unreadable configuration.
    pub const CONFIG_INVALID: &str = "CONFIG_INVALID";

    /// Host protocol or I/O failure.
    pub const PROTOCOL_ERROR: &str = "PROTOCOL_ERROR";
}

/// Classification tag attached to every error at the point it is raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    AccessDenied,
    InvalidInput,
    Timeout,
    NativeError,
    ModuleLoad,
    Config,
    Protocol,
}

/// Errors produced by the PIM integration core.
#[derive(Debug, thiserror::Error)]
pub enum PimError {
    /// Permission probe failed.  `message` is the full remediation text.
    #[error("[{}] {}", error_codes::ACCESS_DENIED, .message)]
    AccessDenied { app: PimApp, message: String },

    /// Empty or malformed argument.
    #[error("[{}] {}", error_codes::INVALID_INPUT, .0)]
    InvalidInput(String),

    /// Native call abandoned after exceeding its budget.
    #[error("[{}] {}", error_codes::TIMEOUT, .0)]
    Timeout(String),

    /// Native-side failure, message passed through verbatim.
    #[error("[{}] {}", error_codes::NATIVE_ERROR, .0)]
    NativeExecution(String),

    /// An integration module failed to initialize.
    #[error("[{}] module `{}` failed to load: {}", error_codes::MODULE_LOAD_FAILED, .module, .reason)]
    ModuleLoad { module: String, reason: String },

    /// Configuration error.
    #[error("[{}] {}", error_codes::CONFIG_INVALID, .0)]
    Config(String),

    /// Host protocol failure.
    #[error("[{}] {}", error_codes::PROTOCOL_ERROR, .0)]
    Protocol(String),

    /// I/O error.
    #[error("[{}] I/O error: {}", error_codes::PROTOCOL_ERROR, .0)]
    Io(#[from] std::io::Error),
}

impl PimError {
    /// Returns the classification tag for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AccessDenied { .. } => ErrorKind::AccessDenied,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::NativeExecution(_) => ErrorKind::NativeError,
            Self::ModuleLoad { .. } => ErrorKind::ModuleLoad,
            Self::Config(_) => ErrorKind::Config,
            Self::Protocol(_) | Self::Io(_) => ErrorKind::Protocol,
        }
    }

    /// Returns the stable error code for this error.
    pub fn code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::AccessDenied => error_codes::ACCESS_DENIED,
            ErrorKind::InvalidInput => error_codes::INVALID_INPUT,
            ErrorKind::Timeout => error_codes::TIMEOUT,
            ErrorKind::NativeError => error_codes::NATIVE_ERROR,
            ErrorKind::ModuleLoad => error_codes::MODULE_LOAD_FAILED,
            ErrorKind::Config => error_codes::CONFIG_INVALID,
            ErrorKind::Protocol => error_codes::PROTOCOL_ERROR,
        }
    }

    /// Whether this error should be presented to the user as a permission
    /// problem.
    pub fn is_access_problem(&self) -> bool {
        self.kind() == ErrorKind::AccessDenied
    }

    /// Whether the error is surfaced to the caller as an explicit failure.
    ///
    /// Timeouts are swallowed into empty results by the query paths; every
    /// other kind propagates.
    pub fn is_surfaced(&self) -> bool {
        self.kind() != ErrorKind::Timeout
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, PimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code_prefix() {
        let err = PimError::InvalidInput("search term is empty".into());
        assert_eq!(err.to_string(), "[INVALID_INPUT] search term is empty");
    }

    #[test]
    fn access_denied_display_is_remediation_text() {
        let err = PimError::AccessDenied {
            app: PimApp::Notes,
            message: "grant permission".into(),
        };
        assert_eq!(err.code(), "ACCESS_DENIED");
        assert!(err.to_string().ends_with("grant permission"));
        assert!(err.is_access_problem());
    }

    #[test]
    fn module_load_display_names_module() {
        let err = PimError::ModuleLoad {
            module: "mail".into(),
            reason: "timed out".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("MODULE_LOAD_FAILED"));
        assert!(msg.contains("`mail`"));
        assert!(msg.contains("timed out"));
    }

    #[test]
    fn classification_uses_tag_not_text() {
        // A native error whose text mentions permissions is still a native error.
        let err = PimError::NativeExecution("permission to frobnicate".into());
        assert_eq!(err.kind(), ErrorKind::NativeError);
        assert!(!err.is_access_problem());
    }

    #[test]
    fn only_timeouts_are_swallowed() {
        assert!(!PimError::Timeout("slow".into()).is_surfaced());
        assert!(PimError::InvalidInput("x".into()).is_surfaced());
        assert!(PimError::NativeExecution("x".into()).is_surfaced());
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let err: PimError = io.into();
        assert_eq!(err.code(), error_codes::PROTOCOL_ERROR);
    }
}
