//! Step definitions for restart-from scenarios.

pub mod given;
pub mod then;
pub mod when;
