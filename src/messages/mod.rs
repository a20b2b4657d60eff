//! Message sending and in-process scheduled sends.

pub mod scheduler;
pub mod sender;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use scheduler::MessageScheduler;
pub use sender::{MessageSender, NativeMessageSender, SendReceipt};

/// A send registered to fire later.
///
/// Lives only in process memory.  If the process exits first, the send is
/// lost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledAction {
    pub id: Uuid,
    pub target_address: String,
    pub payload: String,
    pub fire_at: DateTime<Utc>,
}
