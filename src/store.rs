//! Shared vocabulary for conditional row writes.

/// Result of an update guarded by the row's previously observed status.
///
/// Every mutating repository call is a compare-and-swap: it only applies
/// when the stored status still matches what the caller read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteOutcome {
    /// The row matched and was updated.
    Applied,
    /// The row changed since it was read; nothing was written.
    Stale,
}

impl WriteOutcome {
    /// Returns whether the write took effect.
    #[must_use]
    pub const fn is_applied(self) -> bool {
        matches!(self, Self::Applied)
    }

    /// Builds an outcome from an affected-row count.
    #[must_use]
    pub const fn from_affected_rows(rows: usize) -> Self {
        if rows == 0 { Self::Stale } else { Self::Applied }
    }
}
