//! Retry budget tracking for replayed and rejected tasks.

use serde::{Deserialize, Serialize};

/// Retry counters carried by every task.
///
/// The window only ever grows: advancing it bumps `retry_count` and widens
/// `max_retries` so the counter never exceeds the ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RetryWindow {
    retry_count: u32,
    max_retries: u32,
}

impl RetryWindow {
    /// Creates a window from raw counters.
    #[must_use]
    pub const fn new(retry_count: u32, max_retries: u32) -> Self {
        Self {
            retry_count,
            max_retries,
        }
    }

    /// Creates a fresh window with no attempts consumed.
    #[must_use]
    pub const fn with_max_retries(max_retries: u32) -> Self {
        Self::new(0, max_retries)
    }

    /// Returns the number of retries consumed so far.
    #[must_use]
    pub const fn retry_count(self) -> u32 {
        self.retry_count
    }

    /// Returns the retry ceiling.
    #[must_use]
    pub const fn max_retries(self) -> u32 {
        self.max_retries
    }

    /// Returns the window after consuming one retry when `should_increment`
    /// is set, or an unchanged copy otherwise.
    #[must_use]
    pub fn advance(self, should_increment: bool) -> Self {
        let (retry_count, max_retries) =
            compute_retry_window(self.retry_count, self.max_retries, should_increment);
        Self::new(retry_count, max_retries)
    }

    /// Returns whether `next` consumed more retries than this window allowed.
    ///
    /// Automatic rejections compare against the ceiling from before the
    /// widening applied by [`RetryWindow::advance`].
    #[must_use]
    pub const fn is_exhausted_by(self, next: Self) -> bool {
        next.retry_count > self.max_retries
    }
}

/// Computes the next `(retry_count, max_retries)` pair.
///
/// With `should_increment` unset the inputs are returned unchanged. Otherwise
/// the retry count grows by one and the ceiling is raised to at least the new
/// count, so a manual replay is never blocked by a stale limit.
#[must_use]
pub fn compute_retry_window(
    retry_count: u32,
    max_retries: u32,
    should_increment: bool,
) -> (u32, u32) {
    if !should_increment {
        return (retry_count, max_retries);
    }
    let next_retry_count = retry_count.saturating_add(1);
    (next_retry_count, max_retries.max(next_retry_count))
}
