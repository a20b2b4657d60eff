//! Process-wide wiring of the PIM integration and its tool-facing boundary.
//!
//! Every contact and message operation first makes sure its module is ready
//! through the safe-mode loader, then goes through the access gate before
//! any real native command is issued.  Argument validation runs before
//! either, so malformed requests never reach the native layer.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::access::{AccessCheckResult, AccessGate};
use crate::apps::PimApp;
use crate::config::PimConfig;
use crate::contacts::{
    ContactDirectory, ContactRecord, ContactResolver, NativeContactDirectory, canonical_digits,
};
use crate::error::{PimError, Result};
use crate::loader::{LoaderPhase, ModuleHandle, SafeModeLoader};
use crate::messages::sender::validate;
use crate::messages::{
    MessageScheduler, MessageSender, NativeMessageSender, ScheduledAction, SendReceipt,
};
use crate::modules::AppModule;
use crate::native::{Invoker, OsascriptRunner, ScriptRunner};

/// Loader phase plus every module's state.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ModuleStatus {
    pub phase: LoaderPhase,
    pub modules: Vec<ModuleHandle>,
}

/// Owns the invoker, access gate, loader and application services.
pub struct PimRuntime {
    config: PimConfig,
    invoker: Arc<Invoker>,
    gate: AccessGate,
    loader: Arc<SafeModeLoader>,
    resolver: ContactResolver,
    sender: Arc<dyn MessageSender>,
    scheduler: MessageScheduler,
}

impl PimRuntime {
    /// Wire a runtime over `runner`.
    pub fn new(config: PimConfig, runner: Arc<dyn ScriptRunner>) -> Self {
        let invoker = Arc::new(Invoker::new(runner, &config.invoker));
        let gate = AccessGate::new(Arc::clone(&invoker), config.invoker.probe_timeout());
        let loader = Arc::new(SafeModeLoader::new(
            AppModule::for_all_apps(&invoker, config.invoker.probe_timeout()),
            config.startup.eager_timeout(),
            config.startup.module_load_timeout(),
        ));
        let directory: Arc<dyn ContactDirectory> = Arc::new(NativeContactDirectory::new(
            gate.clone(),
            config.contacts.fetch_timeout(),
        ));
        let resolver = ContactResolver::new(directory, config.contacts.min_suffix_digits);
        let sender: Arc<dyn MessageSender> = Arc::new(NativeMessageSender::new(gate.clone()));
        let scheduler = MessageScheduler::new(Arc::clone(&sender));

        Self {
            config,
            invoker,
            gate,
            loader,
            resolver,
            sender,
            scheduler,
        }
    }

    /// Wire a runtime driving the real `osascript` binary.
    pub fn with_osascript(config: PimConfig) -> Self {
        let runner = Arc::new(OsascriptRunner::new(config.invoker.osascript_path.clone()));
        Self::new(config, runner)
    }

    pub fn config(&self) -> &PimConfig {
        &self.config
    }

    pub fn invoker(&self) -> &Arc<Invoker> {
        &self.invoker
    }

    pub fn loader(&self) -> &Arc<SafeModeLoader> {
        &self.loader
    }

    /// Begin eager module initialization in the background.
    pub fn start(&self) -> JoinHandle<LoaderPhase> {
        self.loader.start_eager()
    }

    /// Make sure module `name` is usable.
    pub async fn ensure_module_ready(&self, name: &str) -> Result<()> {
        self.loader.ensure_ready(name).await
    }

    /// Loader phase and per-module states.
    pub fn module_status(&self) -> ModuleStatus {
        ModuleStatus {
            phase: self.loader.phase(),
            modules: self.loader.modules(),
        }
    }

    /// Probe automation permission for an application by name.
    pub async fn check_access(&self, app_name: &str) -> Result<AccessCheckResult> {
        self.gate.check_access(app_name).await
    }

    /// Contacts whose name matches `term`.
    pub async fn resolve_contact(&self, term: &str) -> Result<Vec<ContactRecord>> {
        if term.trim().is_empty() {
            return Ok(Vec::new());
        }
        self.ensure_module_ready(PimApp::Contacts.module_name()).await?;
        self.resolver.resolve(term).await
    }

    /// The contact holding `phone`, if any.
    pub async fn resolve_contact_by_phone(&self, phone: &str) -> Result<Option<ContactRecord>> {
        if canonical_digits(phone).is_empty() {
            return Err(PimError::InvalidInput(format!(
                "phone number {phone:?} contains no digits"
            )));
        }
        self.ensure_module_ready(PimApp::Contacts.module_name()).await?;
        self.resolver.resolve_by_phone(phone).await
    }

    /// Send a message now.
    pub async fn send_message(&self, target: &str, payload: &str) -> Result<SendReceipt> {
        validate(target, payload)?;
        self.ensure_module_ready(PimApp::Messages.module_name()).await?;
        self.sender.send(target, payload).await
    }

    /// Schedule a message for `fire_at`.
    ///
    /// A fire time that is not strictly in the future is rejected before the
    /// Messages module is touched and before any timer exists.
    pub async fn schedule_message(
        &self,
        target: &str,
        payload: &str,
        fire_at: DateTime<Utc>,
    ) -> Result<ScheduledAction> {
        MessageScheduler::check(target, payload, fire_at)?;
        self.ensure_module_ready(PimApp::Messages.module_name()).await?;
        self.scheduler.schedule(target, payload, fire_at)
    }

    /// Scheduled messages that have not fired yet.
    pub fn scheduled_messages(&self) -> Vec<ScheduledAction> {
        self.scheduler.pending()
    }

    /// Cancel a scheduled message.
    pub fn cancel_scheduled_message(&self, id: Uuid) -> bool {
        self.scheduler.cancel(id)
    }
}
