//! Access gating for native PIM applications.
//!
//! Before any application-level operation issues its real command it calls
//! [`AccessGate::require`], which probes whether the process currently holds
//! automation permission for the target application.  The probe is the
//! cheapest command that can only succeed with permission: reading the
//! application's own name.
//!
//! Results are never cached.  Permission can be granted or revoked in System
//! Settings at any time, outside this process.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::apps::PimApp;
use crate::error::{ErrorKind, PimError, Result};
use crate::native::{CommandOutcome, Invoker, NativeCommand};

/// Word every access-denial message contains.  Host surfaces key their
/// "permission problem" presentation off [`PimError::is_access_problem`];
/// the marker keeps the wording recognisable to users and agents.
pub const PERMISSION_MARKER: &str = "permission";

/// Outcome of a single permission probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessCheckResult {
    pub has_access: bool,
    /// Confirmation on success; full remediation text on failure (never
    /// empty).
    pub message: String,
}

impl AccessCheckResult {
    fn granted(app: PimApp) -> Self {
        Self {
            has_access: true,
            message: format!("{app} is accessible."),
        }
    }

    fn denied(app: PimApp, detail: Option<&str>) -> Self {
        Self {
            has_access: false,
            message: denial_message(app, detail),
        }
    }
}

/// Remediation text for a missing automation permission.
///
/// Names the application, gives the settings path, asks for a session
/// restart, and explains how to re-trigger the system prompt.  `detail`,
/// when present, is appended for diagnostics.
pub fn denial_message(app: PimApp, detail: Option<&str>) -> String {
    let mut message = format!(
        "Cannot access {app}: automation {PERMISSION_MARKER} has not been granted.\n\
         To fix this:\n\
         1. Open System Settings > Privacy & Security > Automation.\n\
         2. Find the terminal or host application running this tool and enable {app} under it.\n\
         3. Restart your terminal session (or the host application) so the new {PERMISSION_MARKER} takes effect.\n\
         4. If {app} is not listed yet, run this request again: macOS shows the {PERMISSION_MARKER} prompt the first time access is attempted."
    );
    if let Some(detail) = detail.map(str::trim).filter(|d| !d.is_empty()) {
        message.push_str("\nDetails: ");
        message.push_str(detail);
    }
    message
}

/// Probes and enforces automation permission per application.
#[derive(Clone)]
pub struct AccessGate {
    invoker: Arc<Invoker>,
    probe_timeout: Duration,
}

impl AccessGate {
    /// Create a gate dispatching probes through `invoker`, each bounded by
    /// `probe_timeout`.
    pub fn new(invoker: Arc<Invoker>, probe_timeout: Duration) -> Self {
        Self {
            invoker,
            probe_timeout,
        }
    }

    /// The invoker probes are dispatched through.
    pub fn invoker(&self) -> &Arc<Invoker> {
        &self.invoker
    }

    /// Probe whether the process can currently automate `app`.
    ///
    /// Any probe failure counts as missing access.  A probe that times out
    /// is commonly the system permission dialog blocking the script, so it
    /// gets the same remediation text.
    pub async fn probe(&self, app: PimApp) -> AccessCheckResult {
        let command = NativeCommand::identity_probe(app).with_timeout(self.probe_timeout);
        match self.invoker.execute(&command).await {
            CommandOutcome::Success(_) => AccessCheckResult::granted(app),
            CommandOutcome::Failure { kind, detail } => {
                tracing::warn!(app = %app, kind = %kind, "access probe failed");
                AccessCheckResult::denied(app, Some(&detail))
            }
        }
    }

    /// Probe `app` and fail with [`PimError::AccessDenied`] when access is
    /// missing.
    pub async fn require(&self, app: PimApp) -> Result<()> {
        let result = self.probe(app).await;
        if result.has_access {
            Ok(())
        } else {
            Err(PimError::AccessDenied {
                app,
                message: result.message,
            })
        }
    }

    /// Probe by application name, as supplied by the tool layer.
    ///
    /// # Errors
    ///
    /// Returns [`PimError::InvalidInput`] for an empty or unknown name,
    /// before any dispatch.
    pub async fn check_access(&self, app_name: &str) -> Result<AccessCheckResult> {
        if app_name.trim().is_empty() {
            return Err(PimError::InvalidInput(
                "application name cannot be empty".to_owned(),
            ));
        }
        let app: PimApp = app_name.parse()?;
        Ok(self.probe(app).await)
    }
}

/// Kind of `err` for user-facing presentation.
///
/// Reads the tag attached where the error was raised, so an access problem
/// surfacing from a contacts fetch and one from a message send present the
/// same way.
pub fn classify(err: &PimError) -> ErrorKind {
    err.kind()
}

/// Text to show a user for `err`.
///
/// Access problems are shown as their remediation text alone, regardless of
/// which operation raised them; other errors keep their coded form.
pub fn user_message(err: &PimError) -> String {
    match (classify(err), err) {
        (ErrorKind::AccessDenied, PimError::AccessDenied { message, .. }) => message.clone(),
        _ => err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::config::InvokerConfig;
    use crate::native::mock::{MockReply, MockRunner};
    use crate::native::{FailureKind, ScriptRunner};

    fn gate(runner: MockRunner) -> (Arc<MockRunner>, AccessGate) {
        let runner = Arc::new(runner);
        let invoker = Arc::new(Invoker::new(
            Arc::clone(&runner) as Arc<dyn ScriptRunner>,
            &InvokerConfig::default(),
        ));
        (runner, AccessGate::new(invoker, Duration::from_millis(500)))
    }

    #[test]
    fn denial_message_names_app_path_restart_and_retry() {
        let msg = denial_message(PimApp::Calendar, None);
        assert!(msg.contains("Calendar"));
        assert!(msg.contains("System Settings > Privacy & Security > Automation"));
        assert!(msg.contains("Restart your terminal"));
        assert!(msg.contains("run this request again"));
        assert!(msg.contains(PERMISSION_MARKER));
    }

    #[test]
    fn denial_message_appends_detail() {
        let msg = denial_message(PimApp::Mail, Some("  (-1743) "));
        assert!(msg.ends_with("Details: (-1743)"));
        let bare = denial_message(PimApp::Mail, Some("   "));
        assert!(!bare.contains("Details"));
    }

    #[tokio::test]
    async fn probe_success_grants() {
        let (runner, gate) = gate(MockRunner::new().otherwise(MockReply::ok("Contacts")));
        let result = gate.probe(PimApp::Contacts).await;
        assert!(result.has_access);
        assert!(!result.message.is_empty());
        assert_eq!(runner.calls_matching("to get name"), 1);
    }

    #[tokio::test]
    async fn probe_is_not_cached() {
        let (runner, gate) = gate(MockRunner::new().otherwise(MockReply::ok("Notes")));
        gate.probe(PimApp::Notes).await;
        gate.probe(PimApp::Notes).await;
        assert_eq!(runner.call_count(), 2);
    }

    #[tokio::test]
    async fn every_failure_kind_denies_with_remediation() {
        for kind in [
            FailureKind::AccessDenied,
            FailureKind::NativeError,
            FailureKind::Timeout,
        ] {
            let (_, gate) = gate(MockRunner::new().otherwise(MockReply::fail(kind, "boom")));
            let result = gate.probe(PimApp::Reminders).await;
            assert!(!result.has_access);
            assert!(result.message.contains(PERMISSION_MARKER), "{kind}");
            assert!(result.message.contains("Reminders"));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn hung_probe_denies_within_budget() {
        let (_, gate) = gate(MockRunner::new().otherwise(MockReply::Hang));
        let result = gate.probe(PimApp::Mail).await;
        assert!(!result.has_access);
        assert!(result.message.contains("500 ms"));
    }

    #[tokio::test]
    async fn require_fails_with_typed_access_denied() {
        let (_, gate) = gate(
            MockRunner::new().otherwise(MockReply::fail(FailureKind::AccessDenied, "(-1743)")),
        );
        let err = gate.require(PimApp::Messages).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AccessDenied);
        assert!(user_message(&err).starts_with("Cannot access Messages"));
    }

    #[tokio::test]
    async fn check_access_rejects_bad_names_without_dispatch() {
        let (runner, gate) = gate(MockRunner::new().otherwise(MockReply::ok("x")));
        let empty = gate.check_access("  ").await.unwrap_err();
        assert_eq!(empty.kind(), ErrorKind::InvalidInput);
        let unknown = gate.check_access("Photos").await.unwrap_err();
        assert_eq!(unknown.kind(), ErrorKind::InvalidInput);
        assert_eq!(runner.call_count(), 0);
    }

    #[tokio::test]
    async fn check_access_parses_name() {
        let (_, gate) = gate(MockRunner::new().otherwise(MockReply::ok("Maps")));
        let result = gate.check_access("maps").await.unwrap();
        assert!(result.has_access);
        assert!(result.message.contains("Maps"));
    }

    #[test]
    fn classify_reads_the_tag_not_the_text() {
        let native = PimError::NativeExecution("missing permission somewhere".into());
        assert_eq!(classify(&native), ErrorKind::NativeError);
        let denied = PimError::AccessDenied {
            app: PimApp::Contacts,
            message: denial_message(PimApp::Contacts, None),
        };
        assert_eq!(classify(&denied), ErrorKind::AccessDenied);
        assert_eq!(user_message(&denied), denial_message(PimApp::Contacts, None));
    }

    #[test]
    fn access_check_result_serializes_camel_case() {
        let json = serde_json::to_value(AccessCheckResult::granted(PimApp::Notes)).unwrap();
        assert_eq!(json["hasAccess"], serde_json::json!(true));
    }
}
