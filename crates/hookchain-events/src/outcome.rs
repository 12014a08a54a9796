//! How a single trigger call ended.

/// Result of one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<R> {
    /// Every callback in the chain ran.
    Completed(Vec<R>),
    /// A callback halted the chain; holds the values collected before the halt.
    Halted(Vec<R>),
    /// A callback failed. The failure was contained and routed to the
    /// exception handler or the log.
    Failed,
}

impl<R> Outcome<R> {
    /// Returns the collected values; a failed dispatch yields none.
    pub fn into_values(self) -> Vec<R> {
        match self {
            Outcome::Completed(values) | Outcome::Halted(values) => values,
            Outcome::Failed => Vec::new(),
        }
    }

    /// Borrows the collected values.
    pub fn values(&self) -> &[R] {
        match self {
            Outcome::Completed(values) | Outcome::Halted(values) => values,
            Outcome::Failed => &[],
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Outcome::Completed(_))
    }

    pub fn is_halted(&self) -> bool {
        matches!(self, Outcome::Halted(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed)
    }
}
