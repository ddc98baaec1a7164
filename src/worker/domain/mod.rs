//! Domain model for worker coordination.
//!
//! Workers report their own status through heartbeats while operators change
//! it administratively; the domain decides which of the two wins.

mod capabilities;
mod error;
mod heartbeat;
mod ids;
mod status;
mod worker;

pub use capabilities::{AuthStatus, WorkerCapabilities, WorkerTelemetry};
pub use error::{ParseWorkerStatusError, WorkerDomainError};
pub use heartbeat::{HeartbeatReport, resolve_current_task, resolve_status};
pub use ids::WorkerId;
pub use status::{WorkerMode, WorkerStatus};
pub use worker::{PersistedWorkerData, Worker};
