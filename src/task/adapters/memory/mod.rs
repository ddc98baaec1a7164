//! In-memory adapters for task lifecycle ports.

mod task;
mod vcs;

pub use task::InMemoryTaskRepository;
pub use vcs::InMemoryVcsClient;
