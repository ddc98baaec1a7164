//! Event emitter adapters.

mod log_emitter;
mod memory;

pub use log_emitter::TracingEventEmitter;
pub use memory::InMemoryEventEmitter;
