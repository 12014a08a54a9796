//! Callbacks and the bindings used to register them.

use std::fmt;
use std::rc::Rc;

use hookchain_core::{resolve_priority, Priority};

use crate::source::EventSource;

/// What a callback returns: zero or more values appended to the trigger
/// result, or a failure that stops the rest of the chain.
pub type CallbackResult<R> = anyhow::Result<Vec<R>>;

type CallbackFn<T> =
    dyn Fn(&T, &<T as EventSource>::Args) -> CallbackResult<<T as EventSource>::Output>;

/// A registered callback.
///
/// Cloning is cheap and keeps the identity: two `Callback`s compare equal
/// with [`Callback::ptr_eq`] only if one was cloned from the other. That
/// identity is what [`EventHub::unregister`](crate::EventHub::unregister)
/// matches on.
pub struct Callback<T: EventSource>(Rc<CallbackFn<T>>);

impl<T: EventSource> Callback<T> {
    /// Wraps a fallible callback that may contribute values.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&T, &T::Args) -> CallbackResult<T::Output> + 'static,
    {
        Self(Rc::new(f))
    }

    /// Wraps an infallible callback that contributes no values.
    pub fn inspect<F>(f: F) -> Self
    where
        F: Fn(&T, &T::Args) + 'static,
    {
        Self::new(move |target, args| {
            f(target, args);
            Ok(Vec::new())
        })
    }

    /// Returns true if both callbacks share the same identity.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn call(&self, target: &T, args: &T::Args) -> CallbackResult<T::Output> {
        (self.0)(target, args)
    }
}

impl<T: EventSource> Clone for Callback<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T: EventSource> fmt::Debug for Callback<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callback({:p})", Rc::as_ptr(&self.0) as *const ())
    }
}

/// Called with a contained callback failure and the event it happened in.
pub type ExceptionHandler<T> = Rc<dyn Fn(&T, &anyhow::Error, &str)>;

/// The event part of a registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventSpec {
    /// A raw name, possibly carrying an alias prefix like `before_`.
    Name(String),
    /// A bare name with an explicit priority; no prefix parsing happens.
    Explicit(String, Priority),
}

impl EventSpec {
    /// Resolves the spec to a bare event name and its priority.
    pub fn resolve(&self) -> (String, Priority) {
        match self {
            EventSpec::Name(raw) => resolve_priority(raw),
            EventSpec::Explicit(name, priority) => (name.clone(), *priority),
        }
    }
}

impl From<&str> for EventSpec {
    fn from(raw: &str) -> Self {
        EventSpec::Name(raw.to_string())
    }
}

impl From<String> for EventSpec {
    fn from(raw: String) -> Self {
        EventSpec::Name(raw)
    }
}

impl From<(&str, Priority)> for EventSpec {
    fn from((name, priority): (&str, Priority)) -> Self {
        EventSpec::Explicit(name.to_string(), priority)
    }
}

impl From<(String, Priority)> for EventSpec {
    fn from((name, priority): (String, Priority)) -> Self {
        EventSpec::Explicit(name, priority)
    }
}

/// One `(event, callback)` pair of a registration batch.
pub struct Binding<T: EventSource> {
    pub(crate) spec: EventSpec,
    pub(crate) priority: Option<Priority>,
    pub(crate) callback: Callback<T>,
}

impl<T: EventSource> Binding<T> {
    /// Binds a callback to an event spec.
    pub fn new(spec: impl Into<EventSpec>, callback: Callback<T>) -> Self {
        Self {
            spec: spec.into(),
            priority: None,
            callback,
        }
    }

    /// Binds a callback with an explicit priority.
    ///
    /// The explicit priority wins over anything the spec carries, and a
    /// name spec is taken literally (no alias prefix is stripped).
    pub fn with_priority(spec: impl Into<EventSpec>, priority: Priority, callback: Callback<T>) -> Self {
        Self {
            spec: spec.into(),
            priority: Some(priority),
            callback,
        }
    }

    /// Resolves the bare event name and the priority this binding registers at.
    pub fn resolve(&self) -> (String, Priority) {
        match (&self.spec, self.priority) {
            (EventSpec::Name(name), Some(priority)) => (name.clone(), priority),
            (EventSpec::Explicit(name, _), Some(priority)) => (name.clone(), priority),
            (spec, None) => spec.resolve(),
        }
    }
}

impl<T: EventSource, S: Into<EventSpec>> From<(S, Callback<T>)> for Binding<T> {
    fn from((spec, callback): (S, Callback<T>)) -> Self {
        Binding::new(spec, callback)
    }
}

impl<T: EventSource, S: Into<EventSpec>> From<(S, Priority, Callback<T>)> for Binding<T> {
    fn from((spec, priority, callback): (S, Priority, Callback<T>)) -> Self {
        Binding::with_priority(spec, priority, callback)
    }
}
