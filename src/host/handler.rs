//! Routes host commands to the PIM runtime.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{PimError, Result};
use crate::host::contract::{CommandEnvelope, CommandName, EVENT_VERSION, ResponseEnvelope};
use crate::runtime::PimRuntime;

/// Command router over a shared [`PimRuntime`].
#[derive(Clone)]
pub struct HostCommandHandler {
    runtime: Arc<PimRuntime>,
}

impl HostCommandHandler {
    pub fn new(runtime: Arc<PimRuntime>) -> Self {
        Self { runtime }
    }

    pub fn runtime(&self) -> &Arc<PimRuntime> {
        &self.runtime
    }

    /// Handle one envelope.  Never fails: errors become error envelopes.
    pub async fn route(&self, envelope: &CommandEnvelope) -> ResponseEnvelope {
        let result = match envelope.validate() {
            Ok(()) => self.dispatch(envelope).await,
            Err(err) => Err(err.into()),
        };
        match result {
            Ok(payload) => ResponseEnvelope::ok(envelope.request_id.clone(), payload),
            Err(err) => {
                tracing::warn!(
                    request_id = %envelope.request_id,
                    command = envelope.command.as_str(),
                    code = err.code(),
                    "host command failed"
                );
                ResponseEnvelope::from_error(envelope.request_id.clone(), &err)
            }
        }
    }

    async fn dispatch(&self, envelope: &CommandEnvelope) -> Result<serde_json::Value> {
        let payload = &envelope.payload;
        let command = envelope.command;
        match command {
            CommandName::HostPing => Ok(serde_json::json!({"pong": true})),
            CommandName::HostVersion => Ok(serde_json::json!({
                "contract_version": EVENT_VERSION,
                "package_version": env!("CARGO_PKG_VERSION"),
            })),
            CommandName::AccessCheck => {
                let app = required_str(payload, "app", command)?;
                to_json(&self.runtime.check_access(app).await?)
            }
            CommandName::ModuleEnsureReady => {
                let module = required_str(payload, "module", command)?;
                self.runtime.ensure_module_ready(module).await?;
                Ok(serde_json::json!({"module": module, "ready": true}))
            }
            CommandName::ModuleStatus => to_json(&self.runtime.module_status()),
            CommandName::ContactsResolve => {
                let term = required_str(payload, "term", command)?;
                let contacts = self.runtime.resolve_contact(term).await?;
                Ok(serde_json::json!({"contacts": to_json(&contacts)?}))
            }
            CommandName::ContactsResolveByPhone => {
                let phone = required_str(payload, "phone", command)?;
                let contact = self.runtime.resolve_contact_by_phone(phone).await?;
                Ok(serde_json::json!({"contact": to_json(&contact)?}))
            }
            CommandName::MessagesSend => {
                let target = required_str(payload, "target", command)?;
                let body = required_str(payload, "body", command)?;
                to_json(&self.runtime.send_message(target, body).await?)
            }
            CommandName::MessagesSchedule => {
                let target = required_str(payload, "target", command)?;
                let body = required_str(payload, "body", command)?;
                let fire_at = parse_fire_at(required_str(payload, "fire_at", command)?)?;
                to_json(&self.runtime.schedule_message(target, body, fire_at).await?)
            }
            CommandName::MessagesScheduled => Ok(serde_json::json!({
                "actions": to_json(&self.runtime.scheduled_messages())?
            })),
            CommandName::MessagesCancel => {
                let raw = required_str(payload, "id", command)?;
                let id = Uuid::parse_str(raw.trim()).map_err(|e| {
                    PimError::InvalidInput(format!("invalid scheduled action id `{raw}`: {e}"))
                })?;
                Ok(serde_json::json!({
                    "id": id,
                    "cancelled": self.runtime.cancel_scheduled_message(id)
                }))
            }
            CommandName::RuntimeStop => Ok(serde_json::json!({"stopping": true})),
        }
    }
}

fn required_str<'a>(
    payload: &'a serde_json::Value,
    key: &str,
    command: CommandName,
) -> Result<&'a str> {
    payload
        .get(key)
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| {
            PimError::InvalidInput(format!("{} requires payload.{key}", command.as_str()))
        })
}

fn parse_fire_at(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            PimError::InvalidInput(format!("fire_at must be an RFC 3339 timestamp: {e}"))
        })
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<serde_json::Value> {
    serde_json::to_value(value)
        .map_err(|e| PimError::Protocol(format!("failed to serialize response payload: {e}")))
}
