//! Task lifecycle for the engine.
//!
//! Tasks move through `waiting`, `queued`, `running`, and `awaiting_review`
//! before settling in `completed`, `failed`, or `cancelled`. Settled tasks
//! stay put until explicitly replayed, either alone (rerun) or together with
//! everything downstream of them in their group (restart-from).
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
