//! Recording emitter for tests and local runs.

use crate::events::{EngineEvent, EventEmitter, EventType};
use std::sync::{Arc, RwLock};

/// Emitter that keeps every event in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventEmitter {
    events: Arc<RwLock<Vec<EngineEvent>>>,
}

impl InMemoryEventEmitter {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every recorded event, oldest first.
    ///
    /// A poisoned lock yields an empty list.
    #[must_use]
    pub fn events(&self) -> Vec<EngineEvent> {
        self.events
            .read()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Returns the recorded events of one type, oldest first.
    #[must_use]
    pub fn events_of(&self, event_type: EventType) -> Vec<EngineEvent> {
        self.events()
            .into_iter()
            .filter(|event| event.event_type == event_type)
            .collect()
    }
}

impl EventEmitter for InMemoryEventEmitter {
    fn emit(&self, event: EngineEvent) {
        if let Ok(mut events) = self.events.write() {
            events.push(event);
        }
    }
}
