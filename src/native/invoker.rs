//! Bounded, per-application serialized dispatch.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::apps::PimApp;
use crate::config::InvokerConfig;

use super::outcome::{CommandOutcome, FailureKind, NativeValue};
use super::runner::ScriptRunner;
use super::script::{Limits, NativeCommand};
use super::sentinel::SentinelReply;

/// Dispatches [`NativeCommand`]s through a [`ScriptRunner`].
///
/// - Every dispatch is bounded by a time budget (the command's own, or the
///   configured default).  The budget covers waiting for the application's
///   dispatch slot as well as the run itself.
/// - Dispatches to the same application never overlap; different
///   applications run independently.
/// - Dispatch never raises.  Timeouts and native errors come back as
///   [`CommandOutcome::Failure`] and the caller decides whether to retry,
///   degrade to an empty result, or surface the error.
///
/// A failed or timed-out dispatch may still have changed application state;
/// see the module-level notes in [`crate::native`].
pub struct Invoker {
    runner: Arc<dyn ScriptRunner>,
    default_timeout: Duration,
    limits: Limits,
    app_slots: HashMap<PimApp, Mutex<()>>,
    dispatches: AtomicU64,
}

impl Invoker {
    /// Create an invoker over `runner` with settings from `config`.
    pub fn new(runner: Arc<dyn ScriptRunner>, config: &InvokerConfig) -> Self {
        let app_slots = PimApp::all()
            .iter()
            .map(|app| (*app, Mutex::new(())))
            .collect();
        Self {
            runner,
            default_timeout: config.timeout(),
            limits: Limits::from_config(config),
            app_slots,
            dispatches: AtomicU64::new(0),
        }
    }

    /// Defensive limits every generated enumeration script must embed.
    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// The default per-call budget.
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Number of scripts handed to the runner so far.
    pub fn dispatch_count(&self) -> u64 {
        self.dispatches.load(Ordering::Relaxed)
    }

    /// Dispatch `command` and classify the result.
    pub async fn execute(&self, command: &NativeCommand) -> CommandOutcome {
        let budget = command.timeout.unwrap_or(self.default_timeout);
        let app = command.app;
        let started = Instant::now();

        let dispatch = async {
            let _slot = match self.app_slots.get(&app) {
                Some(slot) => Some(slot.lock().await),
                None => None,
            };
            self.dispatches.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(app = %app, "dispatching native command");
            self.runner.run(&command.script).await
        };

        match tokio::time::timeout(budget, dispatch).await {
            Ok(Ok(stdout)) => {
                tracing::debug!(
                    app = %app,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "native command succeeded"
                );
                CommandOutcome::Success(NativeValue::from_output(&stdout))
            }
            Ok(Err(err)) => {
                tracing::warn!(
                    app = %app,
                    kind = %err.kind,
                    detail = %err.detail,
                    "native command failed"
                );
                CommandOutcome::Failure {
                    kind: err.kind,
                    detail: err.detail,
                }
            }
            Err(_) => {
                tracing::warn!(
                    app = %app,
                    budget_ms = budget.as_millis() as u64,
                    "native command abandoned after timeout; the script may still complete"
                );
                CommandOutcome::failure(
                    FailureKind::Timeout,
                    format!(
                        "{app} did not respond within {} ms",
                        budget.as_millis()
                    ),
                )
            }
        }
    }

    /// Dispatch a script that reports through `SUCCESS:` / `ERROR:` and parse
    /// the reply immediately.
    pub async fn execute_sentinel(&self, command: &NativeCommand) -> CommandOutcome {
        match self.execute(command).await {
            CommandOutcome::Success(value) => {
                SentinelReply::parse(&value.into_text()).into_outcome()
            }
            failure => failure,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::native::mock::{MockReply, MockRunner};

    fn invoker(runner: MockRunner, timeout_ms: u64) -> (Arc<MockRunner>, Invoker) {
        let runner = Arc::new(runner);
        let config = InvokerConfig {
            timeout_ms,
            ..InvokerConfig::default()
        };
        let invoker = Invoker::new(Arc::clone(&runner) as Arc<dyn ScriptRunner>, &config);
        (runner, invoker)
    }

    #[tokio::test]
    async fn success_is_classified() {
        let (_, invoker) = invoker(MockRunner::new().otherwise(MockReply::ok("Notes")), 1_000);
        let outcome = invoker
            .execute(&NativeCommand::identity_probe(PimApp::Notes))
            .await;
        assert_eq!(outcome, CommandOutcome::Success(NativeValue::Text("Notes".into())));
        assert_eq!(invoker.dispatch_count(), 1);
    }

    #[tokio::test]
    async fn runner_failure_keeps_its_tag() {
        let (_, invoker) = invoker(
            MockRunner::new().otherwise(MockReply::fail(FailureKind::AccessDenied, "(-1743)")),
            1_000,
        );
        let outcome = invoker
            .execute(&NativeCommand::identity_probe(PimApp::Mail))
            .await;
        assert_eq!(outcome.failure_kind(), Some(FailureKind::AccessDenied));
    }

    #[tokio::test(start_paused = true)]
    async fn hung_script_times_out_instead_of_raising() {
        let (_, invoker) = invoker(MockRunner::new().otherwise(MockReply::Hang), 500);
        let outcome = invoker
            .execute(&NativeCommand::identity_probe(PimApp::Calendar))
            .await;
        match outcome {
            CommandOutcome::Failure {
                kind: FailureKind::Timeout,
                detail,
            } => assert!(detail.contains("Calendar")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn command_timeout_overrides_default() {
        let (_, invoker) = invoker(
            MockRunner::new().otherwise(MockReply::delayed(Duration::from_millis(300), "ok")),
            100,
        );
        let cmd = NativeCommand::new(PimApp::Maps, "return 1")
            .with_timeout(Duration::from_millis(1_000));
        assert!(invoker.execute(&cmd).await.is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn same_app_dispatches_do_not_overlap() {
        let (runner, invoker) = invoker(
            MockRunner::new().otherwise(MockReply::delayed(Duration::from_millis(100), "ok")),
            10_000,
        );
        let a = NativeCommand::new(PimApp::Notes, "first");
        let b = NativeCommand::new(PimApp::Notes, "second");
        let (ra, rb) = tokio::join!(invoker.execute(&a), invoker.execute(&b));
        assert!(ra.is_success() && rb.is_success());
        assert_eq!(runner.max_concurrency(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn different_apps_dispatch_concurrently() {
        let (runner, invoker) = invoker(
            MockRunner::new().otherwise(MockReply::delayed(Duration::from_millis(100), "ok")),
            10_000,
        );
        let a = NativeCommand::new(PimApp::Notes, "first");
        let b = NativeCommand::new(PimApp::Mail, "second");
        let (ra, rb) = tokio::join!(invoker.execute(&a), invoker.execute(&b));
        assert!(ra.is_success() && rb.is_success());
        assert_eq!(runner.max_concurrency(), 2);
    }

    #[tokio::test]
    async fn sentinel_success_is_parsed() {
        let (_, invoker) = invoker(MockRunner::new().otherwise(MockReply::ok("SUCCESS:sent")), 1_000);
        let outcome = invoker
            .execute_sentinel(&NativeCommand::new(PimApp::Messages, "send"))
            .await;
        assert_eq!(outcome, CommandOutcome::Success(NativeValue::Text("sent".into())));
    }

    #[tokio::test]
    async fn sentinel_garbage_is_failure() {
        let (_, invoker) = invoker(MockRunner::new().otherwise(MockReply::ok("missing value")), 1_000);
        let outcome = invoker
            .execute_sentinel(&NativeCommand::new(PimApp::Messages, "send"))
            .await;
        assert_eq!(outcome.failure_kind(), Some(FailureKind::NativeError));
    }

    #[tokio::test]
    async fn limits_follow_config() {
        let config = InvokerConfig {
            max_items: 12,
            max_content_chars: 34,
            ..InvokerConfig::default()
        };
        let invoker = Invoker::new(Arc::new(MockRunner::new()), &config);
        assert_eq!(invoker.limits().max_items, 12);
        assert_eq!(invoker.limits().max_content_chars, 34);
    }
}
