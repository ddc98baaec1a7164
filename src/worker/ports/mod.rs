//! Port contracts for worker coordination.

pub mod repository;

pub use repository::{WorkerRepository, WorkerRepositoryError, WorkerRepositoryResult};
