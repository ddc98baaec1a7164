//! Event emitter port.

use super::EngineEvent;

/// Fire-and-forget sink for engine events.
///
/// Implementations must not block and must swallow their own failures.
pub trait EventEmitter: Send + Sync {
    /// Emits one event.
    fn emit(&self, event: EngineEvent);
}
