//! Integration tests for eager/safe-mode module loading through the runtime.
//!
//! Application warm-ups are scripted through the mock runner so one
//! application can hang while the others answer.
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use fae_pim::config::PimConfig;
use fae_pim::error::ErrorKind;
use fae_pim::loader::{LoaderPhase, ModuleState};
use fae_pim::native::mock::{MockReply, MockRunner};
use fae_pim::native::{FailureKind, ScriptRunner};
use fae_pim::runtime::PimRuntime;

fn runtime_with(runner: MockRunner, eager_ms: u64) -> (Arc<MockRunner>, Arc<PimRuntime>) {
    let runner = Arc::new(runner);
    let mut config = PimConfig::default();
    config.startup.eager_timeout_ms = eager_ms;
    config.startup.module_load_timeout_ms = 60_000;
    config.invoker.probe_timeout_ms = 30_000;
    let runtime = PimRuntime::new(config, Arc::clone(&runner) as Arc<dyn ScriptRunner>);
    (runner, Arc::new(runtime))
}

#[tokio::test(start_paused = true)]
async fn healthy_apps_reach_ready_without_later_load_latency() {
    let (runner, runtime) = runtime_with(MockRunner::new().otherwise(MockReply::ok("ok")), 5_000);
    assert_eq!(runtime.start().await.unwrap(), LoaderPhase::Ready);
    let warmups = runner.call_count();
    assert_eq!(warmups, fae_pim::PimApp::all().len());

    let before = tokio::time::Instant::now();
    runtime.ensure_module_ready("calendar").await.unwrap();
    runtime.ensure_module_ready("maps").await.unwrap();
    assert_eq!(before.elapsed(), Duration::ZERO);
    assert_eq!(runner.call_count(), warmups);
}

#[tokio::test(start_paused = true)]
async fn one_hung_app_puts_loader_in_safe_mode() {
    let runner = MockRunner::new()
        .on("\"Mail\"", MockReply::delayed(Duration::from_secs(20), "Mail"))
        .otherwise(MockReply::ok("ok"));
    let (_, runtime) = runtime_with(runner, 5_000);

    assert_eq!(runtime.start().await.unwrap(), LoaderPhase::SafeMode);
    let status = runtime.module_status();
    for handle in &status.modules {
        let expected = if handle.name == "mail" {
            ModuleState::NotLoaded
        } else {
            ModuleState::Ready
        };
        assert_eq!(handle.state, expected, "{}", handle.name);
    }
}

#[tokio::test(start_paused = true)]
async fn first_call_after_safe_mode_loads_that_module_once() {
    let runner = MockRunner::new()
        .on("\"Notes\"", MockReply::delayed(Duration::from_secs(10), "Notes"))
        .otherwise(MockReply::ok("ok"));
    let (runner, runtime) = runtime_with(runner, 1_000);
    assert_eq!(runtime.start().await.unwrap(), LoaderPhase::SafeMode);
    let eager_attempts = runner.calls_matching("\"Notes\"");

    let a = Arc::clone(&runtime);
    let b = Arc::clone(&runtime);
    let first = tokio::spawn(async move { a.ensure_module_ready("notes").await });
    let second = tokio::spawn(async move { b.ensure_module_ready("notes").await });
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(runtime.loader().state("notes"), Some(ModuleState::Loading));

    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();
    assert_eq!(runtime.loader().state("notes"), Some(ModuleState::Ready));
    assert_eq!(runner.calls_matching("\"Notes\"") - eager_attempts, 1);
    assert_eq!(runtime.loader().phase(), LoaderPhase::SafeMode);
}

#[tokio::test(start_paused = true)]
async fn failed_module_reports_typed_error_without_retry() {
    let runner = MockRunner::new()
        .on("\"Maps\"", MockReply::fail(FailureKind::NativeError, "Maps is not running"))
        .otherwise(MockReply::ok("ok"));
    let (runner, runtime) = runtime_with(runner, 5_000);
    assert_eq!(runtime.start().await.unwrap(), LoaderPhase::SafeMode);

    let err = runtime.ensure_module_ready("maps").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ModuleLoad);
    let attempts = runner.calls_matching("\"Maps\"");

    let again = runtime.ensure_module_ready("maps").await.unwrap_err();
    assert_eq!(again.kind(), ErrorKind::ModuleLoad);
    assert_eq!(runner.calls_matching("\"Maps\""), attempts);

    // Other modules are unaffected.
    runtime.ensure_module_ready("reminders").await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn requests_during_eager_phase_wait_for_it() {
    let runner = MockRunner::new().otherwise(MockReply::delayed(Duration::from_millis(300), "ok"));
    let (runner, runtime) = runtime_with(runner, 5_000);
    let eager = runtime.start();
    runtime.ensure_module_ready("contacts").await.unwrap();
    assert_eq!(eager.await.unwrap(), LoaderPhase::Ready);
    assert_eq!(runner.calls_matching("\"Contacts\""), 1);
}

#[tokio::test]
async fn unknown_module_is_invalid_input() {
    let (runner, runtime) = runtime_with(MockRunner::new(), 5_000);
    let err = runtime.ensure_module_ready("photos").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert_eq!(runner.call_count(), 0);
}
