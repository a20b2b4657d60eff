//! Safe-mode module loader.
//!
//! Owns process-wide readiness for every application-integration module so
//! that a single hung or modal application can never keep the whole host
//! from answering requests for the healthy ones.
//!
//! # Phases
//!
//! ```text
//! Uninitialized ──start──▶ EagerLoading ──all ok in budget──▶ Ready
//!                               │
//!                               └──budget elapsed / any failure──▶ SafeMode
//! ```
//!
//! - **EagerLoading** initializes every module concurrently, racing one
//!   fixed budget.  Callers of [`SafeModeLoader::ensure_ready`] wait for the
//!   phase to settle.
//! - **Ready**: every module is ready; `ensure_ready` returns immediately.
//! - **SafeMode** is terminal; bulk loading is never attempted again.
//!   Modules that finished during the eager phase are ready.  Every other
//!   module loads on first use, one module at a time:
//!   `NotLoaded → Loading → Ready | Failed`.  Concurrent callers for a module
//!   that is `Loading` attach to the in-flight attempt (single-flight).
//!   `Failed` is reported to every later caller without retrying.
//!
//! An `Uninitialized` loader (eager phase never started) behaves like safe
//! mode.  Module states only ever move forward.

use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use futures_util::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::{PimError, Result};

/// Initializes one application-integration module.
#[async_trait]
pub trait ModuleInitializer: Send + Sync {
    /// Loader key of the module (e.g. `"contacts"`).
    fn name(&self) -> &str;

    /// Bring the module to a usable state.  The error is a human-readable
    /// reason.
    async fn initialize(&self) -> std::result::Result<(), String>;
}

/// Process-wide readiness phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoaderPhase {
    Uninitialized,
    EagerLoading,
    Ready,
    SafeMode,
}

/// Per-module readiness, as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "reason")]
pub enum ModuleState {
    NotLoaded,
    Loading,
    Ready,
    Failed(String),
}

/// A module and its current state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleHandle {
    pub name: String,
    #[serde(flatten)]
    pub state: ModuleState,
}

type LoadFuture = Shared<BoxFuture<'static, std::result::Result<(), String>>>;

enum Slot {
    NotLoaded,
    Loading(LoadFuture),
    Ready,
    Failed(String),
}

impl Slot {
    fn state(&self) -> ModuleState {
        match self {
            Slot::NotLoaded => ModuleState::NotLoaded,
            Slot::Loading(_) => ModuleState::Loading,
            Slot::Ready => ModuleState::Ready,
            Slot::Failed(reason) => ModuleState::Failed(reason.clone()),
        }
    }
}

struct Registry {
    phase: LoaderPhase,
    slots: BTreeMap<String, Slot>,
}

/// Readiness registry and loader for integration modules.
pub struct SafeModeLoader {
    initializers: BTreeMap<String, Arc<dyn ModuleInitializer>>,
    registry: Mutex<Registry>,
    phase_tx: watch::Sender<LoaderPhase>,
    eager_timeout: Duration,
    module_load_timeout: Duration,
}

impl SafeModeLoader {
    /// Create a loader for `modules`.
    ///
    /// `eager_timeout` bounds the bulk phase; `module_load_timeout` bounds
    /// each on-demand load.  A module registered twice keeps the last
    /// initializer.
    pub fn new(
        modules: Vec<Arc<dyn ModuleInitializer>>,
        eager_timeout: Duration,
        module_load_timeout: Duration,
    ) -> Self {
        let initializers: BTreeMap<String, Arc<dyn ModuleInitializer>> = modules
            .into_iter()
            .map(|m| (m.name().to_owned(), m))
            .collect();
        let slots = initializers
            .keys()
            .map(|name| (name.clone(), Slot::NotLoaded))
            .collect();
        let (phase_tx, _) = watch::channel(LoaderPhase::Uninitialized);
        Self {
            initializers,
            registry: Mutex::new(Registry {
                phase: LoaderPhase::Uninitialized,
                slots,
            }),
            phase_tx,
            eager_timeout,
            module_load_timeout,
        }
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        // State transitions are single assignments, so a poisoned guard
        // still holds a consistent registry.
        self.registry.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_phase(&self, registry: &mut Registry, phase: LoaderPhase) {
        registry.phase = phase;
        self.phase_tx.send_replace(phase);
    }

    /// Current phase.
    pub fn phase(&self) -> LoaderPhase {
        self.registry().phase
    }

    /// Current state of `name`, or `None` for an unknown module.
    pub fn state(&self, name: &str) -> Option<ModuleState> {
        self.registry().slots.get(name).map(Slot::state)
    }

    /// Snapshot of every module, sorted by name.
    pub fn modules(&self) -> Vec<ModuleHandle> {
        self.registry()
            .slots
            .iter()
            .map(|(name, slot)| ModuleHandle {
                name: name.clone(),
                state: slot.state(),
            })
            .collect()
    }

    /// Start the eager phase on a background task and return its handle.
    ///
    /// The phase becomes `EagerLoading` before this returns, so requests
    /// arriving immediately afterwards wait for the eager outcome instead of
    /// starting their own loads.
    pub fn start_eager(self: &Arc<Self>) -> JoinHandle<LoaderPhase> {
        let batch = self.begin_eager();
        let loader = Arc::clone(self);
        tokio::spawn(async move { loader.finish_eager(batch).await })
    }

    /// Run the eager phase to completion on the current task.
    ///
    /// Returns the settled phase.  If the eager phase has already been
    /// started, returns the current phase without doing anything.
    pub async fn run_eager(&self) -> LoaderPhase {
        let batch = self.begin_eager();
        self.finish_eager(batch).await
    }

    fn begin_eager(&self) -> Option<EagerBatch> {
        let mut registry = self.registry();
        if registry.phase != LoaderPhase::Uninitialized {
            return None;
        }

        let mut members = Vec::new();
        let mut blocked = false;
        for (name, slot) in &registry.slots {
            match slot {
                Slot::NotLoaded => {
                    if let Some(init) = self.initializers.get(name) {
                        members.push(Arc::clone(init));
                    }
                }
                Slot::Ready => {}
                // Already loading on demand, or already failed: the batch
                // cannot complete as a whole.
                Slot::Loading(_) | Slot::Failed(_) => blocked = true,
            }
        }

        self.set_phase(&mut registry, LoaderPhase::EagerLoading);
        tracing::info!(
            modules = members.len(),
            budget_ms = self.eager_timeout.as_millis() as u64,
            "eager module initialization started"
        );
        Some(EagerBatch { members, blocked })
    }

    async fn finish_eager(&self, batch: Option<EagerBatch>) -> LoaderPhase {
        let Some(batch) = batch else {
            return self.phase();
        };

        let unsettled = UnsettledEager { loader: self };
        let started = Instant::now();
        let mut pending: FuturesUnordered<_> = batch
            .members
            .into_iter()
            .map(|init| async move {
                let result = init.initialize().await;
                (init.name().to_owned(), result)
            })
            .collect();

        let race = tokio::time::timeout(self.eager_timeout, async {
            let mut all_ok = true;
            while let Some((name, result)) = pending.next().await {
                match result {
                    Ok(()) => self.promote_eager(&name),
                    Err(reason) => {
                        tracing::warn!(module = %name, %reason, "eager initialization failed");
                        all_ok = false;
                    }
                }
            }
            all_ok
        })
        .await;

        let phase = match race {
            Ok(true) if !batch.blocked => LoaderPhase::Ready,
            Ok(_) => {
                tracing::warn!("eager initialization incomplete; entering safe mode");
                LoaderPhase::SafeMode
            }
            Err(_) => {
                tracing::warn!(
                    budget_ms = self.eager_timeout.as_millis() as u64,
                    "eager initialization exceeded its budget; entering safe mode"
                );
                LoaderPhase::SafeMode
            }
        };

        unsettled.settle(phase);
        tracing::info!(
            phase = ?phase,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "eager module initialization settled"
        );
        phase
    }

    fn promote_eager(&self, name: &str) {
        let mut registry = self.registry();
        if let Some(slot) = registry.slots.get_mut(name)
            && matches!(slot, Slot::NotLoaded)
        {
            *slot = Slot::Ready;
            tracing::debug!(module = %name, "module ready (eager)");
        }
    }

    /// Make sure module `name` is ready, loading it on demand if needed.
    ///
    /// # Errors
    ///
    /// - [`PimError::InvalidInput`] for an unknown module name.
    /// - [`PimError::ModuleLoad`] when the module failed to initialize, now
    ///   or earlier.  Failed modules are not retried.
    pub async fn ensure_ready(&self, name: &str) -> Result<()> {
        self.wait_for_eager().await;

        let load = {
            let mut registry = self.registry();
            let Some(slot) = registry.slots.get_mut(name) else {
                return Err(PimError::InvalidInput(format!("unknown module: {name:?}")));
            };
            match slot {
                Slot::Ready => return Ok(()),
                Slot::Failed(reason) => {
                    return Err(PimError::ModuleLoad {
                        module: name.to_owned(),
                        reason: reason.clone(),
                    });
                }
                Slot::Loading(load) => {
                    tracing::debug!(module = %name, "joining in-flight module load");
                    load.clone()
                }
                Slot::NotLoaded => {
                    let Some(init) = self.initializers.get(name) else {
                        return Err(PimError::InvalidInput(format!("unknown module: {name:?}")));
                    };
                    let load = self.load_future(Arc::clone(init));
                    *slot = Slot::Loading(load.clone());
                    tracing::info!(module = %name, "loading module on demand");
                    load
                }
            }
        };

        let result = load.await;

        let mut registry = self.registry();
        if let Some(slot) = registry.slots.get_mut(name)
            && matches!(slot, Slot::Loading(_))
        {
            match &result {
                Ok(()) => {
                    *slot = Slot::Ready;
                    tracing::info!(module = %name, "module ready");
                }
                Err(reason) => {
                    *slot = Slot::Failed(reason.clone());
                    tracing::warn!(module = %name, %reason, "module failed to load");
                }
            }
        }

        result.map_err(|reason| PimError::ModuleLoad {
            module: name.to_owned(),
            reason,
        })
    }

    fn load_future(&self, init: Arc<dyn ModuleInitializer>) -> LoadFuture {
        let budget = self.module_load_timeout;
        async move {
            match tokio::time::timeout(budget, init.initialize()).await {
                Ok(result) => result,
                Err(_) => Err(format!(
                    "initialization did not finish within {} ms",
                    budget.as_millis()
                )),
            }
        }
        .boxed()
        .shared()
    }

    async fn wait_for_eager(&self) {
        let mut rx = self.phase_tx.subscribe();
        // The sender lives as long as `self`, so this only returns once the
        // phase has left `EagerLoading`.
        let _ = rx
            .wait_for(|phase| *phase != LoaderPhase::EagerLoading)
            .await;
    }
}

struct EagerBatch {
    members: Vec<Arc<dyn ModuleInitializer>>,
    blocked: bool,
}

/// Holds the eager phase open.  Dropped without [`settle`](Self::settle)
/// (a panicking initializer, an aborted task) it falls back to safe mode so
/// waiters in `ensure_ready` are released.
struct UnsettledEager<'a> {
    loader: &'a SafeModeLoader,
}

impl UnsettledEager<'_> {
    fn settle(self, phase: LoaderPhase) {
        let mut registry = self.loader.registry();
        self.loader.set_phase(&mut registry, phase);
    }
}

impl Drop for UnsettledEager<'_> {
    fn drop(&mut self) {
        let mut registry = self.loader.registry();
        if registry.phase == LoaderPhase::EagerLoading {
            tracing::error!("eager initialization ended abnormally; entering safe mode");
            self.loader.set_phase(&mut registry, LoaderPhase::SafeMode);
        }
    }
}
