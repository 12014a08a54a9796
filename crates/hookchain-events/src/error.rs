//! Error types for event hub operations.
//!
//! Callback failures never show up here: they are contained by the
//! dispatch loop and routed to the exception handler or the log.

use hookchain_core::HubId;
use thiserror::Error;

/// Errors that can occur during event hub operations.
#[derive(Error, Debug)]
pub enum EventError {
    /// The class never declared an event-method with this name.
    #[error("unknown event method: {0}")]
    UnknownMethod(String),

    /// An event-method body failed while called outside the dispatch chain.
    #[error("event method `{method}` failed: {source}")]
    MethodFailed {
        method: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A continuation was resumed against a hub that did not produce it.
    #[error("continuation for `{event}` belongs to hub {owner}, not {target}")]
    ForeignContinuation {
        event: String,
        owner: HubId,
        target: HubId,
    },
}

/// Result type alias for event hub operations.
pub type Result<T> = std::result::Result<T, EventError>;
