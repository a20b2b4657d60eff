//! Application-integration modules registered with the safe-mode loader.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::apps::PimApp;
use crate::loader::ModuleInitializer;
use crate::native::{CommandOutcome, FailureKind, Invoker, NativeCommand};

/// Loader entry for one [`PimApp`].
///
/// Initialization is a warm-up dispatch of the application's identity
/// query.  That launches the application if needed and surfaces a hung or
/// modal application as a load failure.
///
/// An access denial is *not* a load failure: permission is re-checked on
/// every call and the user may grant it later without restarting.
pub struct AppModule {
    app: PimApp,
    invoker: Arc<Invoker>,
    warmup_timeout: Option<Duration>,
}

impl AppModule {
    pub fn new(app: PimApp, invoker: Arc<Invoker>) -> Self {
        Self {
            app,
            invoker,
            warmup_timeout: None,
        }
    }

    /// Bound the warm-up dispatch separately from the invoker default.
    #[must_use]
    pub fn with_warmup_timeout(mut self, timeout: Duration) -> Self {
        self.warmup_timeout = Some(timeout);
        self
    }

    pub fn app(&self) -> PimApp {
        self.app
    }

    /// One module per supported application, in [`PimApp::all`] order,
    /// each warming up within `warmup_timeout`.
    pub fn for_all_apps(
        invoker: &Arc<Invoker>,
        warmup_timeout: Duration,
    ) -> Vec<Arc<dyn ModuleInitializer>> {
        PimApp::all()
            .iter()
            .map(|app| {
                let module =
                    AppModule::new(*app, Arc::clone(invoker)).with_warmup_timeout(warmup_timeout);
                Arc::new(module) as Arc<dyn ModuleInitializer>
            })
            .collect()
    }
}

#[async_trait]
impl ModuleInitializer for AppModule {
    fn name(&self) -> &str {
        self.app.module_name()
    }

    async fn initialize(&self) -> Result<(), String> {
        let mut command = NativeCommand::identity_probe(self.app);
        if let Some(timeout) = self.warmup_timeout {
            command = command.with_timeout(timeout);
        }
        match self.invoker.execute(&command).await {
            CommandOutcome::Success(_) => Ok(()),
            CommandOutcome::Failure {
                kind: FailureKind::AccessDenied,
                detail,
            } => {
                tracing::warn!(
                    app = %self.app,
                    %detail,
                    "module loaded without automation permission; calls will report access denied"
                );
                Ok(())
            }
            CommandOutcome::Failure { kind, detail } => Err(format!("{kind}: {detail}")),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::config::InvokerConfig;
    use crate::native::ScriptRunner;
    use crate::native::mock::{MockReply, MockRunner};

    fn invoker(runner: MockRunner) -> Arc<Invoker> {
        Arc::new(Invoker::new(
            Arc::new(runner) as Arc<dyn ScriptRunner>,
            &InvokerConfig::default(),
        ))
    }

    #[tokio::test]
    async fn success_loads() {
        let module = AppModule::new(PimApp::Notes, invoker(MockRunner::new().otherwise(MockReply::ok("Notes"))));
        assert_eq!(module.name(), "notes");
        module.initialize().await.unwrap();
    }

    #[tokio::test]
    async fn access_denied_still_loads() {
        let module = AppModule::new(
            PimApp::Mail,
            invoker(MockRunner::new().otherwise(MockReply::fail(FailureKind::AccessDenied, "(-1743)"))),
        );
        module.initialize().await.unwrap();
    }

    #[tokio::test]
    async fn native_error_fails_load() {
        let module = AppModule::new(
            PimApp::Maps,
            invoker(MockRunner::new().otherwise(MockReply::fail(FailureKind::NativeError, "crashed"))),
        );
        let reason = module.initialize().await.unwrap_err();
        assert!(reason.contains("crashed"));
    }

    #[tokio::test(start_paused = true)]
    async fn hung_app_fails_load_within_warmup_budget() {
        let module = AppModule::new(PimApp::Calendar, invoker(MockRunner::new().otherwise(MockReply::Hang)))
            .with_warmup_timeout(Duration::from_millis(250));
        let reason = module.initialize().await.unwrap_err();
        assert!(reason.starts_with("timeout"));
        assert!(reason.contains("250 ms"));
    }

    #[test]
    fn one_module_per_app() {
        let modules = AppModule::for_all_apps(&invoker(MockRunner::new()), Duration::from_secs(1));
        let names: Vec<&str> = modules.iter().map(|m| m.name()).collect();
        assert_eq!(names.len(), PimApp::all().len());
        assert!(names.contains(&"contacts"));
        assert!(names.contains(&"messages"));
    }
}
