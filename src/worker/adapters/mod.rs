//! Adapter implementations for worker ports.

pub mod memory;
pub mod postgres;
