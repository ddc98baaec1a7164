//! Application services for task lifecycle orchestration.

mod lifecycle;
mod restart;
mod review;

pub use lifecycle::{
    NewTaskRequest, TaskLifecycleError, TaskLifecycleResult, TaskLifecycleService,
};
pub use restart::RestartFromReport;
pub use review::ApproveRequest;
