//! Immediate message sends through the Messages application.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::access::AccessGate;
use crate::apps::PimApp;
use crate::error::{PimError, Result};
use crate::native::{CommandOutcome, FailureKind, NativeCommand, quote};

/// Outcome of a send that did not fail outright.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "detail")]
pub enum SendReceipt {
    /// Messages confirmed the send.
    Delivered(String),
    /// The dispatch timed out.  The message may still go out.
    Unconfirmed(String),
}

/// Sends one message to one recipient.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, target: &str, payload: &str) -> Result<SendReceipt>;
}

/// Reject blank recipients and bodies.
pub(crate) fn validate(target: &str, payload: &str) -> Result<()> {
    if target.trim().is_empty() {
        return Err(PimError::InvalidInput("recipient cannot be empty".to_owned()));
    }
    if payload.trim().is_empty() {
        return Err(PimError::InvalidInput("message body cannot be empty".to_owned()));
    }
    Ok(())
}

/// Sender backed by the Messages application.
pub struct NativeMessageSender {
    gate: AccessGate,
}

impl NativeMessageSender {
    pub fn new(gate: AccessGate) -> Self {
        Self { gate }
    }

    fn send_command(target: &str, payload: &str) -> NativeCommand {
        let target = quote(target.trim());
        let payload = quote(payload);
        let script = format!(
            "try
    tell application \"Messages\"
        set targetService to 1st account whose service type = iMessage
        set targetBuddy to participant {target} of targetService
        send {payload} to targetBuddy
    end tell
    return \"SUCCESS:sent to \" & {target}
on error errMsg number errNum
    return \"ERROR:\" & errMsg & \" (\" & errNum & \")\"
end try"
        );
        NativeCommand::new(PimApp::Messages, script)
    }
}

#[async_trait]
impl MessageSender for NativeMessageSender {
    async fn send(&self, target: &str, payload: &str) -> Result<SendReceipt> {
        validate(target, payload)?;
        self.gate.require(PimApp::Messages).await?;

        let outcome = self
            .gate
            .invoker()
            .execute_sentinel(&Self::send_command(target, payload))
            .await;
        match outcome {
            CommandOutcome::Failure {
                kind: FailureKind::Timeout,
                detail,
            } => {
                tracing::warn!(%detail, "message send unconfirmed after timeout");
                Ok(SendReceipt::Unconfirmed(detail))
            }
            other => {
                let detail = other.into_result(PimApp::Messages)?.into_text();
                tracing::info!("message sent");
                Ok(SendReceipt::Delivered(detail))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::config::InvokerConfig;
    use crate::error::ErrorKind;
    use crate::native::mock::{MockReply, MockRunner};
    use crate::native::{Invoker, ScriptRunner};
    use std::sync::Arc;
    use std::time::Duration;

    fn sender(runner: MockRunner) -> (Arc<MockRunner>, NativeMessageSender) {
        let runner = Arc::new(runner);
        let config = InvokerConfig {
            timeout_ms: 1_000,
            ..InvokerConfig::default()
        };
        let invoker = Arc::new(Invoker::new(
            Arc::clone(&runner) as Arc<dyn ScriptRunner>,
            &config,
        ));
        let gate = AccessGate::new(invoker, Duration::from_millis(500));
        (runner, NativeMessageSender::new(gate))
    }

    #[tokio::test]
    async fn delivered_on_success_sentinel() {
        let (runner, sender) = sender(
            MockRunner::new()
                .on("to get name", MockReply::ok("Messages"))
                .on("send ", MockReply::ok("SUCCESS:sent to +15550100")),
        );
        let receipt = sender.send("+15550100", "hi \"there\"").await.unwrap();
        assert_eq!(receipt, SendReceipt::Delivered("sent to +15550100".into()));
        let script = runner.calls().pop().unwrap();
        assert!(script.contains(r#"send "hi \"there\"" to targetBuddy"#));
    }

    #[tokio::test]
    async fn error_sentinel_is_native_error() {
        let (_, sender) = sender(
            MockRunner::new()
                .on("to get name", MockReply::ok("Messages"))
                .on("send ", MockReply::ok("ERROR:buddy not found (-1728)")),
        );
        let err = sender.send("nobody", "hi").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NativeError);
        assert!(err.to_string().contains("buddy not found"));
    }

    #[tokio::test]
    async fn missing_imessage_account_is_not_a_permission_problem() {
        let detail = "Can’t get account 1 whose service type = iMessage. Invalid index. (-1719)";
        let (_, sender) = sender(
            MockRunner::new()
                .on("to get name", MockReply::ok("Messages"))
                .on("send ", MockReply::ok(format!("ERROR:{detail}"))),
        );
        let err = sender.send("+15550100", "hi").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NativeError);
        assert!(!err.is_access_problem());
        assert!(err.to_string().contains(detail));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_unconfirmed() {
        let (_, sender) = sender(
            MockRunner::new()
                .on("to get name", MockReply::ok("Messages"))
                .on("send ", MockReply::Hang),
        );
        let receipt = sender.send("+15550100", "hi").await.unwrap();
        assert!(matches!(receipt, SendReceipt::Unconfirmed(_)));
    }

    #[tokio::test]
    async fn blank_input_is_rejected_without_dispatch() {
        let (runner, sender) = sender(MockRunner::new().otherwise(MockReply::ok("SUCCESS:")));
        assert_eq!(
            sender.send(" ", "hi").await.unwrap_err().kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(
            sender.send("+15550100", "\n").await.unwrap_err().kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(runner.call_count(), 0);
    }

    #[tokio::test]
    async fn denied_access_stops_before_send() {
        let (runner, sender) = sender(
            MockRunner::new().otherwise(MockReply::fail(FailureKind::AccessDenied, "(-1743)")),
        );
        let err = sender.send("+15550100", "hi").await.unwrap_err();
        assert!(err.is_access_problem());
        assert_eq!(runner.calls_matching("send "), 0);
    }
}
