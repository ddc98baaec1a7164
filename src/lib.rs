//! Drover: task lifecycle and worker coordination engine.
//!
//! This crate tracks units of AI-agent work through a persistent status
//! machine, keeps a registry of remote workers in step with their
//! heartbeats, and assigns queued tasks to idle workers on a timer.
//!
//! # Architecture
//!
//! Drover follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for external interactions
//! - **Adapters**: Concrete implementations of ports (database, VCS, etc.)
//!
//! Every status change is written as a compare-and-swap against the status
//! the caller observed, so concurrent writers never overwrite each other.
//!
//! # Modules
//!
//! - [`task`]: Task state machine, dependency groups, review and replay
//! - [`worker`]: Worker registry and heartbeat reconciliation
//! - [`scheduler`]: Promotion of ready tasks and binding to idle workers
//! - [`events`]: Audit events emitted on every transition
//! - [`config`]: Engine settings loaded from TOML

pub mod config;
pub mod events;
pub mod scheduler;
pub mod store;
pub mod task;
pub mod worker;
