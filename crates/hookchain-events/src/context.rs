//! Per-trigger dispatch state and the continuations produced by halting.

use std::fmt;
use std::rc::Rc;

use hookchain_core::{EntryId, HubId};

use crate::callback::Callback;
use crate::error::{EventError, Result};
use crate::registry::Entry;
use crate::source::EventSource;

/// State of one active trigger call.
///
/// `chain` is the snapshot taken when the trigger started and never
/// changes; `cursor` is the index of the next entry to run and `end`
/// bounds the entries still pending. Halting pulls `end` down to `cursor`.
pub(crate) struct DispatchContext<T: EventSource> {
    pub(crate) event: String,
    pub(crate) args: Rc<T::Args>,
    chain: Vec<Entry<T>>,
    cursor: usize,
    end: usize,
    halted: bool,
}

impl<T: EventSource> DispatchContext<T> {
    pub(crate) fn new(event: String, args: Rc<T::Args>, chain: Vec<Entry<T>>) -> Self {
        let end = chain.len();
        Self {
            event,
            args,
            chain,
            cursor: 0,
            end,
            halted: false,
        }
    }

    /// Moves to the next pending entry and returns its callback.
    pub(crate) fn advance(&mut self) -> Option<Callback<T>> {
        if self.cursor >= self.end {
            return None;
        }
        let callback = self.chain[self.cursor].callback.clone();
        self.cursor += 1;
        Some(callback)
    }

    /// The registration whose callback is running right now.
    pub(crate) fn current_entry(&self) -> Option<EntryId> {
        self.cursor
            .checked_sub(1)
            .and_then(|index| self.chain.get(index))
            .map(|entry| entry.id)
    }

    /// Stops the chain and hands back the entries that did not run.
    pub(crate) fn halt(&mut self) -> Vec<Entry<T>> {
        let pending = self.chain[self.cursor..self.end].to_vec();
        self.end = self.cursor;
        self.halted = true;
        pending
    }

    pub(crate) fn is_halted(&self) -> bool {
        self.halted
    }
}

/// The unrun remainder of a halted chain.
///
/// Produced by [`EventHub::halt_current_chain`](crate::EventHub::halt_current_chain).
/// Resuming runs the remaining callbacks, in their original order and with
/// the original arguments, as a new trigger call on the same object.
/// Registrations removed after the halt still run when resumed; the
/// continuation owns its own copy of the chain.
pub struct Continuation<T: EventSource> {
    hub: HubId,
    event: String,
    args: Rc<T::Args>,
    entries: Vec<Entry<T>>,
}

impl<T: EventSource> Continuation<T> {
    pub(crate) fn new(hub: HubId, event: String, args: Rc<T::Args>, entries: Vec<Entry<T>>) -> Self {
        Self {
            hub,
            event,
            args,
            entries,
        }
    }

    /// The event whose chain was halted.
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Arguments the remaining callbacks will receive.
    pub fn args(&self) -> &T::Args {
        &self.args
    }

    /// Number of callbacks still to run.
    pub fn remaining(&self) -> usize {
        self.entries.len()
    }

    /// Runs the remaining callbacks against `target` and returns their
    /// concatenated results.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::ForeignContinuation`] if `target` is not the
    /// object whose chain was halted. Callback failures are contained as
    /// in any trigger call.
    pub fn resume(self, target: &T) -> Result<Vec<T::Output>> {
        let hub = target.hub();
        if hub.id() != self.hub {
            return Err(EventError::ForeignContinuation {
                event: self.event,
                owner: self.hub,
                target: hub.id(),
            });
        }

        tracing::debug!(hub = %self.hub, event = %self.event, remaining = self.entries.len(), "resuming halted chain");
        Ok(hub
            .dispatch(target, self.event, self.args, self.entries)
            .into_values())
    }
}

impl<T: EventSource> fmt::Debug for Continuation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Continuation")
            .field("hub", &self.hub)
            .field("event", &self.event)
            .field("args", &self.args)
            .field("remaining", &self.entries.len())
            .finish()
    }
}
