//! In-memory adapters for worker ports.

mod repository;

pub use repository::InMemoryWorkerRepository;
