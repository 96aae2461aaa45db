//! The signal bus: best-effort, in-order-per-entity status-change
//! publication to outside subscribers (§4.6 "Signals", §5 "Ordering", §9
//! "Signal bus" design note).
//!
//! Built on an explicit `tokio::sync::broadcast` channel rather than a
//! process-local observer registry. Only the single scheduling loop ever
//! publishes; subscribers that lag behind simply miss old events
//! (`broadcast`'s documented behavior) rather than blocking the loop,
//! matching "delivery is best-effort" and "subscribers must not hold the
//! state-store lock."

use cosmos_core::{ExecutionId, ExecutionStatus, StageId, StageStatus, TaskId, TaskStatus};
use tokio::sync::broadcast;

#[derive(Clone, Debug)]
pub enum ExecutorSignal {
    TaskStatusChanged {
        task_id: TaskId,
        status: TaskStatus,
    },
    StageStatusChanged {
        stage_id: StageId,
        status: StageStatus,
    },
    ExecutionStatusChanged {
        execution_id: ExecutionId,
        status: ExecutionStatus,
    },
}

/// A single named channel every entity's transitions publish onto, in
/// transition order (§5: "Status signals for a given entity are delivered
/// in the order of their underlying transitions") — guaranteed here simply
/// because the scheduling loop is the sole, single-threaded publisher.
pub struct SignalBus {
    sender: broadcast::Sender<ExecutorSignal>,
}

impl SignalBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExecutorSignal> {
        self.sender.subscribe()
    }

    /// Publication never blocks or errors the caller: `send` only fails
    /// when there are zero subscribers, which is not a condition the
    /// scheduling loop needs to care about.
    pub fn publish(&self, signal: ExecutorSignal) {
        let _ = self.sender.send(signal);
    }
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new(256)
    }
}
