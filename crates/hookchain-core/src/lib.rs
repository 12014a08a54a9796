//! Hookchain Core - process-wide state shared by every event hub.
//!
//! This crate holds the pieces of hookchain that are not tied to a single
//! object instance:
//!
//! - **config**: Process defaults (method bridging) and their environment overrides
//! - **ids**: Identifier newtypes for hubs, registration batches and entries
//! - **priority**: The priority alias table and event-name prefix resolution

pub mod config;
pub mod ids;
pub mod priority;

// Re-export commonly used items for convenience
pub use config::{default_enable_methods, set_default_enable_methods, HubOptions, ENABLE_METHODS_ENV};
pub use ids::{BatchId, EntryId, HubId};
pub use priority::{
    priority_alias, priority_aliases, register_priority_alias, resolve_priority, Priority,
    AFTER, BEFORE, DEFAULT_PRIORITY, EXT_AFTER, EXT_BEFORE,
};
