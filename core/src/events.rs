//! Typed pub/sub surface for `agent:launched`, `agent:completed`,
//! `scope:violations`, `handoff:created`. At-most-once delivery per
//! subscriber, synchronous dispatch; callers must never hold a lock across
//! `emit`.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::models::Handoff;
use crate::scope_control::Violation;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Event {
    AgentLaunched {
        task_id: String,
        workflow_id: String,
        agent_type: String,
    },
    AgentCompleted {
        task_id: String,
        workflow_id: String,
        agent_id: String,
        result: String,
    },
    ScopeViolations {
        task_id: String,
        violations: Vec<Violation>,
    },
    HandoffCreated {
        #[serde(skip_serializing, skip_deserializing)]
        handoff: Option<Handoff>,
        handoff_id: String,
        workflow_id: String,
    },
}

/// Thin wrapper around a broadcast channel so subscribers that are slow or
/// absent never block a publisher.
pub struct EventEmitter {
    sender: broadcast::Sender<Event>,
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventEmitter {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        EventEmitter { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    /// Best-effort publish: a `SendError` only means there are currently no
    /// subscribers, which is not an error condition for the emitter.
    pub fn emit(&self, event: Event) {
        let _ = self.sender.send(event);
    }
}
