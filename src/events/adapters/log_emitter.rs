//! Emitter that forwards events to `tracing`.

use crate::events::{EngineEvent, EventEmitter};

/// Writes each event as a structured `info` record on the `drover::events`
/// target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventEmitter;

impl EventEmitter for TracingEventEmitter {
    fn emit(&self, event: EngineEvent) {
        tracing::info!(
            target: "drover::events",
            event_type = event.event_type.as_str(),
            occurred_at = %event.occurred_at,
            payload = %event.payload,
            "engine event"
        );
    }
}
