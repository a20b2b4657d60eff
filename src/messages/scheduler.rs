//! Timer-backed scheduled sends.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::{PimError, Result};

use super::ScheduledAction;
use super::sender::{MessageSender, validate};

struct Entry {
    action: ScheduledAction,
    task: Option<JoinHandle<()>>,
}

type Pending = Arc<Mutex<HashMap<Uuid, Entry>>>;

fn lock(pending: &Pending) -> MutexGuard<'_, HashMap<Uuid, Entry>> {
    pending.lock().unwrap_or_else(|e| e.into_inner())
}

/// Registers sends to fire at a later time.
///
/// Each action is a tokio timer task.  Nothing is persisted: actions still
/// pending when the process exits are lost.
pub struct MessageScheduler {
    sender: Arc<dyn MessageSender>,
    pending: Pending,
}

impl MessageScheduler {
    pub fn new(sender: Arc<dyn MessageSender>) -> Self {
        Self {
            sender,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Schedule `payload` to `target` at `fire_at`.
    ///
    /// # Errors
    ///
    /// [`PimError::InvalidInput`] for a blank target or payload, or when
    /// `fire_at` is not strictly in the future.  Nothing is registered in
    /// that case.
    pub fn schedule(
        &self,
        target: &str,
        payload: &str,
        fire_at: DateTime<Utc>,
    ) -> Result<ScheduledAction> {
        let delay = Self::check(target, payload, fire_at)?;

        let action = ScheduledAction {
            id: Uuid::new_v4(),
            target_address: target.trim().to_owned(),
            payload: payload.to_owned(),
            fire_at,
        };
        lock(&self.pending).insert(
            action.id,
            Entry {
                action: action.clone(),
                task: None,
            },
        );

        let sender = Arc::clone(&self.sender);
        let pending = Arc::clone(&self.pending);
        let fired = action.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            lock(&pending).remove(&fired.id);
            match sender.send(&fired.target_address, &fired.payload).await {
                Ok(receipt) => {
                    tracing::info!(id = %fired.id, ?receipt, "scheduled message fired");
                }
                Err(err) => {
                    tracing::warn!(id = %fired.id, error = %err, "scheduled message failed");
                }
            }
        });

        // The task may already have fired and removed its entry.
        if let Some(entry) = lock(&self.pending).get_mut(&action.id) {
            entry.task = Some(task);
        }
        tracing::info!(
            id = %action.id,
            fire_at = %action.fire_at.to_rfc3339(),
            "message scheduled"
        );
        Ok(action)
    }

    /// Validate a request without registering anything.  Returns the delay
    /// until `fire_at`.
    pub fn check(target: &str, payload: &str, fire_at: DateTime<Utc>) -> Result<Duration> {
        validate(target, payload)?;
        let now = Utc::now();
        (fire_at - now)
            .to_std()
            .ok()
            .filter(|delay| !delay.is_zero())
            .ok_or_else(|| {
                PimError::InvalidInput(format!(
                    "fire time {} is not in the future (now {})",
                    fire_at.to_rfc3339(),
                    now.to_rfc3339()
                ))
            })
    }

    /// Actions that have not fired yet, soonest first.
    pub fn pending(&self) -> Vec<ScheduledAction> {
        let mut actions: Vec<ScheduledAction> = lock(&self.pending)
            .values()
            .map(|entry| entry.action.clone())
            .collect();
        actions.sort_by(|a, b| a.fire_at.cmp(&b.fire_at).then(a.id.cmp(&b.id)));
        actions
    }

    /// Cancel a pending action.  Returns `false` if it is unknown or has
    /// already fired.
    pub fn cancel(&self, id: Uuid) -> bool {
        match lock(&self.pending).remove(&id) {
            Some(entry) => {
                if let Some(task) = entry.task {
                    task.abort();
                }
                tracing::info!(%id, "scheduled message cancelled");
                true
            }
            None => false,
        }
    }
}

impl Drop for MessageScheduler {
    fn drop(&mut self) {
        for (_, entry) in lock(&self.pending).drain() {
            if let Some(task) = entry.task {
                task.abort();
            }
        }
    }
}
