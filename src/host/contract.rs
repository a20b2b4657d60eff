//! Versioned command/response envelopes for the PIM host bridge.

use serde::{Deserialize, Serialize};

use crate::access::user_message;
use crate::error::PimError;

/// Contract version for host command/response envelopes.
pub const EVENT_VERSION: u32 = 1;

/// Command set accepted by the host bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommandName {
    #[serde(rename = "host.ping")]
    HostPing,
    #[serde(rename = "host.version")]
    HostVersion,
    #[serde(rename = "access.check")]
    AccessCheck,
    #[serde(rename = "module.ensure_ready")]
    ModuleEnsureReady,
    #[serde(rename = "module.status")]
    ModuleStatus,
    #[serde(rename = "contacts.resolve")]
    ContactsResolve,
    #[serde(rename = "contacts.resolve_by_phone")]
    ContactsResolveByPhone,
    #[serde(rename = "messages.send")]
    MessagesSend,
    #[serde(rename = "messages.schedule")]
    MessagesSchedule,
    #[serde(rename = "messages.scheduled")]
    MessagesScheduled,
    #[serde(rename = "messages.cancel")]
    MessagesCancel,
    #[serde(rename = "runtime.stop")]
    RuntimeStop,
}

impl CommandName {
    /// Every command, in wire order.
    pub const ALL: [CommandName; 12] = [
        Self::HostPing,
        Self::HostVersion,
        Self::AccessCheck,
        Self::ModuleEnsureReady,
        Self::ModuleStatus,
        Self::ContactsResolve,
        Self::ContactsResolveByPhone,
        Self::MessagesSend,
        Self::MessagesSchedule,
        Self::MessagesScheduled,
        Self::MessagesCancel,
        Self::RuntimeStop,
    ];

    /// Render command name to wire format.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::HostPing => "host.ping",
            Self::HostVersion => "host.version",
            Self::AccessCheck => "access.check",
            Self::ModuleEnsureReady => "module.ensure_ready",
            Self::ModuleStatus => "module.status",
            Self::ContactsResolve => "contacts.resolve",
            Self::ContactsResolveByPhone => "contacts.resolve_by_phone",
            Self::MessagesSend => "messages.send",
            Self::MessagesSchedule => "messages.schedule",
            Self::MessagesScheduled => "messages.scheduled",
            Self::MessagesCancel => "messages.cancel",
            Self::RuntimeStop => "runtime.stop",
        }
    }

    /// Parse a command name from wire format.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|cmd| cmd.as_str() == raw)
    }
}

/// A versioned response envelope from the bridge to its host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub v: u32,
    pub request_id: String,
    pub ok: bool,
    pub payload: serde_json::Value,
    pub error: Option<String>,
    /// Stable code from [`crate::error::error_codes`] when `ok` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl ResponseEnvelope {
    /// Build a successful response envelope.
    #[must_use]
    pub fn ok(request_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            v: EVENT_VERSION,
            request_id: request_id.into(),
            ok: true,
            payload,
            error: None,
            error_code: None,
        }
    }

    /// Build an error response envelope.
    #[must_use]
    pub fn error(
        request_id: impl Into<String>,
        code: &str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            v: EVENT_VERSION,
            request_id: request_id.into(),
            ok: false,
            payload: serde_json::Value::Null,
            error: Some(message.into()),
            error_code: Some(code.to_owned()),
        }
    }

    /// Build an error response for a library error.  Access problems carry
    /// their remediation text as the message.
    #[must_use]
    pub fn from_error(request_id: impl Into<String>, err: &PimError) -> Self {
        Self::error(request_id, err.code(), user_message(err))
    }
}

/// A versioned command envelope from the host to the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub v: u32,
    pub request_id: String,
    pub command: CommandName,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl CommandEnvelope {
    /// Build a v1 command envelope.
    #[must_use]
    pub fn new(
        request_id: impl Into<String>,
        command: CommandName,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            v: EVENT_VERSION,
            request_id: request_id.into(),
            command,
            payload,
        }
    }

    /// Validate envelope version and required identifiers.
    pub fn validate(&self) -> Result<(), ContractError> {
        if self.v != EVENT_VERSION {
            return Err(ContractError::new(
                ContractErrorKind::UnsupportedVersion,
                format!(
                    "unsupported contract version {}; expected {}",
                    self.v, EVENT_VERSION
                ),
            ));
        }
        if self.request_id.trim().is_empty() {
            return Err(ContractError::new(
                ContractErrorKind::InvalidEnvelope,
                "request_id cannot be empty".to_owned(),
            ));
        }
        Ok(())
    }
}

/// Contract validation error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractErrorKind {
    UnsupportedVersion,
    InvalidEnvelope,
}

/// Contract validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractError {
    pub kind: ContractErrorKind,
    pub message: String,
}

impl ContractError {
    #[must_use]
    pub fn new(kind: ContractErrorKind, message: String) -> Self {
        Self { kind, message }
    }
}

impl std::fmt::Display for ContractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ContractError {}

impl From<ContractError> for PimError {
    fn from(err: ContractError) -> Self {
        PimError::Protocol(err.to_string())
    }
}
