//! Prioritized, reentrant in-process event dispatch.
//!
//! This crate provides the `EventHub` an object embeds to expose named
//! events:
//! - Priority-ordered callback chains, with `before_`/`after_` style
//!   aliases resolved through `hookchain_core::priority`
//! - Scoped registration batches owned by a `RegistrationHandle`
//! - Failure containment: a failing callback ends its chain, never the caller
//! - Chain control from inside callbacks (self-unregister, halt and resume)
//! - An optional method bridge that runs class event-methods in the same chain
//!
//! # Example
//!
//! ```
//! use std::cell::RefCell;
//!
//! use hookchain_events::{Callback, EventHub, EventSource};
//!
//! struct Counter {
//!     hub: EventHub<Counter>,
//!     seen: RefCell<Vec<i64>>,
//! }
//!
//! impl EventSource for Counter {
//!     type Args = i64;
//!     type Output = i64;
//!
//!     fn hub(&self) -> &EventHub<Self> {
//!         &self.hub
//!     }
//! }
//!
//! let counter = Counter {
//!     hub: EventHub::new(),
//!     seen: RefCell::new(Vec::new()),
//! };
//!
//! // Registrations live as long as the handle
//! let _log = counter.hub().on(
//!     "before_add",
//!     Callback::inspect(|c: &Counter, n: &i64| c.seen.borrow_mut().push(*n)),
//! );
//! let _double = counter
//!     .hub()
//!     .on("add", Callback::new(|_, n: &i64| Ok(vec![n * 2])));
//!
//! assert_eq!(counter.trigger("add", 21), vec![42]);
//! assert_eq!(*counter.seen.borrow(), vec![21]);
//! ```

pub mod bridge;
pub mod callback;
pub mod context;
pub mod error;
pub mod filter;
pub mod handle;
pub mod hub;
pub mod outcome;
pub mod registry;
pub mod source;

pub use bridge::{Bridged, ClassDecl, EventComponent, HandDown, MethodBody};
pub use callback::{Binding, Callback, CallbackResult, EventSpec, ExceptionHandler};
pub use context::Continuation;
pub use error::{EventError, Result};
pub use filter::RegistrationFilter;
pub use handle::RegistrationHandle;
pub use hub::{EventHub, Unregister};
pub use outcome::Outcome;
pub use registry::RegistrationInfo;
pub use source::EventSource;

pub use hookchain_core::{register_priority_alias, resolve_priority, HubOptions, Priority};
