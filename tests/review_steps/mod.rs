//! Step definitions for review scenarios.

pub mod given;
pub mod when;
