//! Trace event emission for observability.
//!
//! Emits [`TraceEvent`]s via a [`tokio::sync::broadcast`] channel so external
//! observers (trace stores, previews, loggers) can follow execution progress
//! without coupling to the engine internals. Every brick-level event carries
//! the `(run_id, instance_id, branch_path)` tuple that identifies the exact
//! nested position in the pipeline tree.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Events emitted during pipeline execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TraceEvent {
    PipelineStarted {
        run_id: String,
        /// Owning mod-component identity; `None` for preview runs.
        component_id: Option<String>,
        step_count: usize,
    },
    PipelineCompleted {
        run_id: String,
        component_id: Option<String>,
        duration_ms: u64,
    },
    PipelineFailed {
        run_id: String,
        component_id: Option<String>,
        error: String,
    },
    BrickStarted {
        run_id: String,
        instance_id: Option<String>,
        branch: String,
        brick_id: String,
    },
    BrickCompleted {
        run_id: String,
        instance_id: Option<String>,
        branch: String,
        brick_id: String,
        /// Evaluated arguments; present only when the run has value-logging
        /// enabled.
        args: Option<Value>,
        /// Present only when the run has value-logging enabled.
        output: Option<Value>,
        duration_ms: u64,
    },
    BrickFailed {
        run_id: String,
        instance_id: Option<String>,
        branch: String,
        brick_id: String,
        args: Option<Value>,
        error: String,
    },
    BrickSkipped {
        run_id: String,
        instance_id: Option<String>,
        branch: String,
        brick_id: String,
    },
}

impl TraceEvent {
    /// The brick id for brick-level events; `None` for pipeline-level ones.
    pub fn brick_id(&self) -> Option<&str> {
        match self {
            TraceEvent::BrickStarted { brick_id, .. }
            | TraceEvent::BrickCompleted { brick_id, .. }
            | TraceEvent::BrickFailed { brick_id, .. }
            | TraceEvent::BrickSkipped { brick_id, .. } => Some(brick_id),
            _ => None,
        }
    }

    /// The rendered branch path for brick-level events.
    pub fn branch(&self) -> Option<&str> {
        match self {
            TraceEvent::BrickStarted { branch, .. }
            | TraceEvent::BrickCompleted { branch, .. }
            | TraceEvent::BrickFailed { branch, .. }
            | TraceEvent::BrickSkipped { branch, .. } => Some(branch),
            _ => None,
        }
    }
}

/// Trace emitter wrapping a broadcast sender.
#[derive(Clone)]
pub struct TraceEmitter {
    sender: tokio::sync::broadcast::Sender<TraceEvent>,
}

impl TraceEmitter {
    /// Create a new emitter with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = tokio::sync::broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all current subscribers.
    ///
    /// If there are no active receivers the event is silently dropped.
    pub fn emit(&self, event: TraceEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<TraceEvent> {
        self.sender.subscribe()
    }
}

impl Default for TraceEmitter {
    fn default() -> Self {
        Self::new(1024)
    }
}
