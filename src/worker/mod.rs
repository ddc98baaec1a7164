//! Worker registration, heartbeat reconciliation, and administration.
//!
//! Workers report their own status with every heartbeat while operators
//! change it through administrative calls. Both paths write with a
//! compare-and-swap on the stored status; heartbeats retry a bounded number
//! of times, administrative calls fail fast.
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;
