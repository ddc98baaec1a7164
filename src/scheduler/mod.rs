//! Timer-driven assignment of queued tasks to idle workers.
//!
//! A tick first promotes waiting tasks whose dependencies have completed,
//! then binds queued tasks to eligible idle workers. Both sides of a binding
//! are compare-and-swap writes, so a tick racing with heartbeats or operator
//! actions skips the pairing instead of overwriting anything.

mod selection;
mod state;
mod tick;

pub use selection::{WorkerLoad, is_eligible, running_load, select_worker};
pub use state::{SchedulerState, TickGuard};
pub use tick::{
    Assignment, MIN_TICK_INTERVAL, Scheduler, SchedulerError, SchedulerResult, TickOutcome,
    TickReport,
};

#[cfg(test)]
mod tests;
