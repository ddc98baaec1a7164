//! Engine-owned scheduler state.

use chrono::{DateTime, Utc};
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};

/// State shared by every tick of one scheduler.
///
/// Created once at process start and never reset. Pass it by reference (or
/// inside an `Arc`) to each scheduler that should share the re-entrancy
/// guard.
#[derive(Debug, Default)]
pub struct SchedulerState {
    in_flight: AtomicBool,
    last_tick_at: RwLock<Option<DateTime<Utc>>>,
}

impl SchedulerState {
    /// Creates state for a scheduler that has never ticked.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns when the last tick completed.
    #[must_use]
    pub fn last_tick_at(&self) -> Option<DateTime<Utc>> {
        self.last_tick_at.read().ok().and_then(|guard| *guard)
    }

    /// Returns whether a tick is currently running.
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Marks a tick as started, unless one already is.
    ///
    /// The returned guard clears the flag when dropped, including when the
    /// tick fails part-way.
    #[must_use]
    pub fn try_begin(&self) -> Option<TickGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| TickGuard { state: self })
    }

    fn record_completion(&self, at: DateTime<Utc>) {
        if let Ok(mut last) = self.last_tick_at.write() {
            *last = Some(at);
        }
    }
}

/// Proof that the caller owns the in-flight slot.
#[derive(Debug)]
pub struct TickGuard<'a> {
    state: &'a SchedulerState,
}

impl TickGuard<'_> {
    /// Records a successful tick before the slot is released.
    pub fn complete(self, at: DateTime<Utc>) {
        self.state.record_completion(at);
    }
}

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.state.in_flight.store(false, Ordering::Release);
    }
}
