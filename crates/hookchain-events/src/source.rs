//! The trait implemented by objects that expose events.

use std::fmt;

use crate::hub::EventHub;
use crate::outcome::Outcome;

/// An object with named events.
///
/// Implementors embed an [`EventHub`] and hand it out through
/// [`hub`](EventSource::hub). Every callback receives the object itself,
/// so callbacks can reach the object's state and the chain control
/// operations of its hub.
///
/// # Example
///
/// ```
/// use hookchain_events::{Callback, EventHub, EventSource};
///
/// struct Door {
///     hub: EventHub<Door>,
/// }
///
/// impl EventSource for Door {
///     type Args = &'static str;
///     type Output = String;
///
///     fn hub(&self) -> &EventHub<Self> {
///         &self.hub
///     }
/// }
///
/// let door = Door { hub: EventHub::new() };
/// let _greeting = door.hub().on(
///     "opened",
///     Callback::new(|_, who| Ok(vec![format!("welcome, {who}")])),
/// );
///
/// assert_eq!(door.trigger("opened", "ada"), vec!["welcome, ada".to_string()]);
/// ```
pub trait EventSource: Sized + 'static {
    /// Arguments passed to every callback of a trigger call.
    type Args: fmt::Debug + 'static;

    /// Values callbacks contribute to the trigger result.
    type Output: 'static;

    /// The hub holding this object's registrations.
    fn hub(&self) -> &EventHub<Self>;

    /// Runs every callback registered for `event` and returns their
    /// concatenated results. See [`EventHub::trigger`].
    fn trigger(&self, event: &str, args: Self::Args) -> Vec<Self::Output> {
        self.hub().trigger(self, event, args)
    }

    /// Like [`trigger`](EventSource::trigger) but reports how the chain ended.
    fn emit(&self, event: &str, args: Self::Args) -> Outcome<Self::Output> {
        self.hub().emit(self, event, args)
    }
}
