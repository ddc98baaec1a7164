//! Audit and broadcast events emitted on every engine transition.
//!
//! Emission is best-effort and at-most-once: the engine never waits on an
//! emitter and never fails an operation because an event was lost.
//!
//! - Event vocabulary in [`domain`]
//! - Emitter contract in [`ports`]
//! - Recording and logging emitters in [`adapters`]

pub mod adapters;
pub mod domain;
pub mod ports;

pub use domain::{EngineEvent, EventType};
pub use ports::EventEmitter;
