//! Application services for worker coordination.

mod admin;
mod heartbeat;

pub use admin::{RegisterWorkerRequest, WorkerAdminError, WorkerAdminResult, WorkerAdminService};
pub use heartbeat::{HeartbeatCoordinator, HeartbeatError, HeartbeatResult};
