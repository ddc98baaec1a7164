//! `PostgreSQL` adapters for worker persistence.

mod models;
mod repository;
mod schema;

pub use repository::PostgresWorkerRepository;
