//! Registration filtering for debug dumps.

use hookchain_core::{BatchId, Priority};

use crate::registry::RegistrationInfo;

/// Filter criteria for listing registrations.
#[derive(Debug, Clone, Default)]
pub struct RegistrationFilter {
    /// Filter by exact event name.
    pub event: Option<String>,
    /// Filter by minimum priority.
    pub priority_min: Option<Priority>,
    /// Filter by registration batch.
    pub batch: Option<BatchId>,
}

impl RegistrationFilter {
    /// Creates a new empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the event name filter.
    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    /// Sets the minimum priority filter.
    pub fn with_priority_min(mut self, priority: Priority) -> Self {
        self.priority_min = Some(priority);
        self
    }

    /// Sets the batch filter.
    pub fn with_batch(mut self, batch: BatchId) -> Self {
        self.batch = Some(batch);
        self
    }

    /// Returns true if the registration matches this filter.
    pub fn matches(&self, info: &RegistrationInfo) -> bool {
        if let Some(ref event) = self.event {
            if info.event != *event {
                return false;
            }
        }

        if let Some(priority_min) = self.priority_min {
            if info.priority < priority_min {
                return false;
            }
        }

        if let Some(batch) = self.batch {
            if info.batch != batch {
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hookchain_core::EntryId;

    fn make_info(event: &str, priority: Priority, batch: u64) -> RegistrationInfo {
        RegistrationInfo {
            event: event.to_string(),
            priority,
            position: 0,
            entry: EntryId::new(1),
            batch: BatchId::new(batch),
        }
    }

    #[test]
    fn test_empty_filter_matches_all() {
        let filter = RegistrationFilter::new();
        assert!(filter.matches(&make_info("saved", 0, 1)));
    }

    #[test]
    fn test_filter_by_event() {
        let filter = RegistrationFilter::new().with_event("saved");

        assert!(filter.matches(&make_info("saved", 0, 1)));
        assert!(!filter.matches(&make_info("loaded", 0, 1)));
    }

    #[test]
    fn test_filter_by_priority_min() {
        let filter = RegistrationFilter::new().with_priority_min(0);

        assert!(filter.matches(&make_info("saved", 1000, 1)));
        assert!(filter.matches(&make_info("saved", 0, 1))); // 0 >= 0
        assert!(!filter.matches(&make_info("saved", -500, 1)));
    }

    #[test]
    fn test_combined_filters() {
        let filter = RegistrationFilter::new()
            .with_event("saved")
            .with_batch(BatchId::new(2));

        assert!(filter.matches(&make_info("saved", 0, 2)));
        assert!(!filter.matches(&make_info("saved", 0, 1))); // wrong batch
        assert!(!filter.matches(&make_info("loaded", 0, 2))); // wrong event
    }
}
