//! EventHub - per-instance registry and reentrant dispatch engine.
//!
//! Single-threaded by construction: all state lives in `Cell`/`RefCell`
//! and the hub is `!Send`. No internal borrow is held while a callback
//! runs, so callbacks can register, unregister, trigger (on this or any
//! other hub) and drop handles freely.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use hookchain_core::{HubId, HubOptions, DEFAULT_PRIORITY};
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::bridge::{self, Bridged, MethodBody};
use crate::callback::{Binding, Callback, EventSpec, ExceptionHandler};
use crate::context::{Continuation, DispatchContext};
use crate::filter::RegistrationFilter;
use crate::handle::RegistrationHandle;
use crate::outcome::Outcome;
use crate::registry::{Entry, Registry, RegistrationInfo};
use crate::source::EventSource;

/// Installed by [`EventHub::bridged`]; activates the method bridge for an
/// event before its chain is snapshotted.
type BridgeHook<T> = fn(&T, &str);

/// Event registry and dispatcher for one object.
///
/// # Dispatch
///
/// [`trigger`](EventHub::trigger) snapshots the chain registered for the
/// event, then runs it highest priority first (registration order within a
/// priority). Mutating the registry while a chain runs affects later
/// triggers only; the running chain can be changed solely through the
/// chain control operations ([`unregister_current`](EventHub::unregister_current),
/// [`halt_current_chain`](EventHub::halt_current_chain)).
///
/// # Failures
///
/// A callback returning `Err` stops the rest of its chain. The failure
/// never reaches the caller of `trigger`: it goes to the exception handler
/// if one is set and not already running, otherwise it is logged as a
/// warning.
///
/// # Reentrancy
///
/// Every trigger call pushes its own dispatch context. Nested triggers,
/// including triggers of the same event, get their own context and leave
/// the outer one untouched.
pub struct EventHub<T: EventSource> {
    id: HubId,
    options: HubOptions,
    registry: Rc<Registry<T>>,
    contexts: RefCell<Vec<DispatchContext<T>>>,
    handler: RefCell<Option<ExceptionHandler<T>>>,
    in_handler: Cell<bool>,
    bridge: Option<BridgeHook<T>>,
    /// Events whose class method bodies are registered on this instance.
    bridged: RefCell<HashSet<String>>,
}

impl<T: EventSource> EventHub<T> {
    /// Creates a hub with the process default options.
    pub fn new() -> Self {
        Self::with_options(HubOptions::default())
    }

    /// Creates a hub with explicit options.
    ///
    /// Method bridging needs [`EventHub::bridged`]; on a hub created here
    /// `enable_methods` has no effect.
    pub fn with_options(options: HubOptions) -> Self {
        Self {
            id: HubId::new(),
            options,
            registry: Rc::new(Registry::new()),
            contexts: RefCell::new(Vec::new()),
            handler: RefCell::new(None),
            in_handler: Cell::new(false),
            bridge: None,
            bridged: RefCell::new(HashSet::new()),
        }
    }

    pub fn id(&self) -> HubId {
        self.id
    }

    pub fn options(&self) -> HubOptions {
        self.options
    }

    /// Sets the handler that receives contained callback failures.
    ///
    /// The failed chain has already ended when the handler runs. Chain
    /// control called from the handler acts on the enclosing dispatch, so
    /// after a failure in a nested trigger `halt_current_chain` halts the
    /// outer chain.
    pub fn set_exception_handler<F>(&self, handler: F)
    where
        F: Fn(&T, &anyhow::Error, &str) + 'static,
    {
        *self.handler.borrow_mut() = Some(Rc::new(handler));
    }

    /// Removes the exception handler; failures are logged from now on.
    pub fn clear_exception_handler(&self) {
        *self.handler.borrow_mut() = None;
    }

    pub fn has_exception_handler(&self) -> bool {
        self.handler.borrow().is_some()
    }

    /// Registers a batch of callbacks and returns the handle owning them.
    ///
    /// Each item is a [`Binding`] or converts into one: `(spec, callback)`
    /// or `(spec, priority, callback)`. A name spec like `"before_save"`
    /// is resolved through the priority alias table; an explicit
    /// `(name, priority)` spec or an explicit priority bypasses it.
    ///
    /// # Example
    ///
    /// ```
    /// use hookchain_events::{Callback, EventHub, EventSource};
    ///
    /// struct Doc {
    ///     hub: EventHub<Doc>,
    /// }
    ///
    /// impl EventSource for Doc {
    ///     type Args = ();
    ///     type Output = &'static str;
    ///
    ///     fn hub(&self) -> &EventHub<Self> {
    ///         &self.hub
    ///     }
    /// }
    ///
    /// type DocCallback = Callback<Doc>;
    ///
    /// let doc = Doc { hub: EventHub::new() };
    /// let handle = doc.hub().register_batch([
    ///     ("after_save", DocCallback::new(|_, _| Ok(vec!["after"]))),
    ///     ("save", DocCallback::new(|_, _| Ok(vec!["save"]))),
    ///     ("before_save", DocCallback::new(|_, _| Ok(vec!["before"]))),
    /// ]);
    ///
    /// assert_eq!(doc.trigger("save", ()), vec!["before", "save", "after"]);
    ///
    /// handle.release();
    /// assert!(doc.trigger("save", ()).is_empty());
    /// ```
    pub fn register_batch<I, B>(&self, bindings: I) -> RegistrationHandle
    where
        I: IntoIterator<Item = B>,
        B: Into<Binding<T>>,
    {
        let batch = self.registry.next_batch();
        for binding in bindings {
            let binding = binding.into();
            let (event, priority) = binding.resolve();
            let entry = self
                .registry
                .insert(&event, priority, binding.callback, batch);
            debug!(hub = %self.id, event = %event, priority, entry = %entry, batch = %batch, "callback registered");
        }

        let registry = Rc::downgrade(&self.registry);
        RegistrationHandle::new(registry, self.id, batch)
    }

    /// Registers a single callback. Shorthand for a batch of one.
    pub fn on(&self, spec: impl Into<EventSpec>, callback: Callback<T>) -> RegistrationHandle {
        self.register_batch([Binding::new(spec, callback)])
    }

    /// Removes registrations by handle or by callback identity.
    ///
    /// A callback is removed from every event it is registered for on this
    /// hub. Returns the number of registrations removed.
    pub fn unregister<K: Unregister<T> + ?Sized>(&self, key: &K) -> usize {
        key.unregister_from(self)
    }

    /// Removes every registration, including bridged method bodies (they
    /// are registered again on the next bridged dispatch).
    pub fn remove_all_registrations(&self) -> usize {
        let removed = self.registry.clear();
        self.bridged.borrow_mut().clear();
        debug!(hub = %self.id, removed, "all registrations removed");
        removed
    }

    /// Runs the chain for `event` and returns the concatenated results of
    /// every callback that ran. A contained failure yields no values.
    pub fn trigger(&self, target: &T, event: &str, args: T::Args) -> Vec<T::Output> {
        self.emit(target, event, args).into_values()
    }

    /// Runs the chain for `event` and reports how it ended.
    ///
    /// `target` must be the object that owns this hub. Any other target is
    /// refused with a warning and [`Outcome::Failed`], since chain control
    /// from its callbacks would land on the wrong hub.
    pub fn emit(&self, target: &T, event: &str, args: T::Args) -> Outcome<T::Output> {
        let owner = target.hub().id();
        if owner != self.id {
            warn!(hub = %self.id, target = %owner, event = %event, "trigger target does not own this hub");
            return Outcome::Failed;
        }

        if let Some(activate) = self.bridge {
            activate(target, event);
        }

        let chain = self.registry.snapshot(event);
        self.dispatch(target, event.to_string(), Rc::new(args), chain)
    }

    pub(crate) fn dispatch(
        &self,
        target: &T,
        event: String,
        args: Rc<T::Args>,
        chain: Vec<Entry<T>>,
    ) -> Outcome<T::Output> {
        let depth = {
            let mut contexts = self.contexts.borrow_mut();
            contexts.push(DispatchContext::new(event.clone(), Rc::clone(&args), chain));
            contexts.len() - 1
        };
        let guard = ContextGuard {
            contexts: &self.contexts,
            depth,
        };
        trace!(hub = %self.id, event = %event, depth, "dispatch started");

        let mut values = Vec::new();
        while let Some(callback) = self.next_callback(depth) {
            match callback.call(target, &args) {
                Ok(mut produced) => values.append(&mut produced),
                Err(error) => {
                    drop(guard);
                    self.route_failure(target, &event, &args, error);
                    return Outcome::Failed;
                }
            }
        }

        let halted = self
            .contexts
            .borrow()
            .get(depth)
            .is_some_and(DispatchContext::is_halted);
        drop(guard);

        trace!(hub = %self.id, event = %event, halted, values = values.len(), "dispatch finished");
        if halted {
            Outcome::Halted(values)
        } else {
            Outcome::Completed(values)
        }
    }

    fn next_callback(&self, depth: usize) -> Option<Callback<T>> {
        self.contexts
            .borrow_mut()
            .get_mut(depth)
            .and_then(DispatchContext::advance)
    }

    fn route_failure(&self, target: &T, event: &str, args: &T::Args, error: anyhow::Error) {
        let handler = self.handler.borrow().clone();
        let error_text = format!("{error:#}");
        match handler {
            Some(handler) if !self.in_handler.get() => {
                debug!(hub = %self.id, event = %event, error = %error_text, "routing callback failure to exception handler");
                let _flag = HandlerFlag::raise(&self.in_handler);
                handler(target, &error, event);
            }
            Some(_) => {
                warn!(
                    hub = %self.id,
                    event = %event,
                    args = ?args,
                    error = %error_text,
                    "callback failed while the exception handler was running"
                );
            }
            None => {
                warn!(
                    hub = %self.id,
                    event = %event,
                    args = ?args,
                    error = %error_text,
                    "unhandled callback failure"
                );
            }
        }
    }

    /// Name of the event whose chain is running innermost, if any.
    pub fn current_event_name(&self) -> Option<String> {
        self.contexts.borrow().last().map(|context| context.event.clone())
    }

    /// Removes the registration of the callback that is running right now.
    ///
    /// The rest of the running chain is unaffected. Returns false when no
    /// dispatch is active or the registration is already gone.
    pub fn unregister_current(&self) -> bool {
        let current = self
            .contexts
            .borrow()
            .last()
            .and_then(DispatchContext::current_entry);

        match current {
            Some(entry) => {
                let removed = self.registry.remove_entry(entry) > 0;
                debug!(hub = %self.id, entry = %entry, removed, "running callback unregistered");
                removed
            }
            None => false,
        }
    }

    /// Stops the innermost running chain after the current callback.
    ///
    /// Returns a [`Continuation`] holding the callbacks that did not run;
    /// drop it to discard them. Returns `None` when no dispatch is active.
    /// Later triggers of the same event run the full chain again.
    pub fn halt_current_chain(&self) -> Option<Continuation<T>> {
        let mut contexts = self.contexts.borrow_mut();
        let context = contexts.last_mut()?;
        let pending = context.halt();
        debug!(hub = %self.id, event = %context.event, pending = pending.len(), "chain halted");
        Some(Continuation::new(
            self.id,
            context.event.clone(),
            Rc::clone(&context.args),
            pending,
        ))
    }

    /// True while at least one trigger call is running on this hub.
    pub fn is_dispatching(&self) -> bool {
        !self.contexts.borrow().is_empty()
    }

    /// Number of nested trigger calls currently running.
    pub fn dispatch_depth(&self) -> usize {
        self.contexts.borrow().len()
    }

    pub fn has_registrations(&self, event: &str) -> bool {
        self.registry.contains(event)
    }

    pub fn registration_count(&self) -> usize {
        self.registry.len()
    }

    /// Lists the registrations matching `filter`, grouped by event name,
    /// each group in dispatch order.
    pub fn registrations(&self, filter: &RegistrationFilter) -> Vec<RegistrationInfo> {
        self.registry.infos(filter)
    }

    /// Renders all registrations as pretty JSON. For debugging only; the
    /// format is not stable.
    pub fn dump_registrations(&self) -> String {
        self.dump_registrations_filtered(&RegistrationFilter::new())
    }

    /// Like [`dump_registrations`](EventHub::dump_registrations), limited
    /// to the registrations matching `filter`.
    pub fn dump_registrations_filtered(&self, filter: &RegistrationFilter) -> String {
        let mut bridged_methods: Vec<String> = self.bridged.borrow().iter().cloned().collect();
        bridged_methods.sort();

        let dump = Dump {
            hub: self.id,
            dispatch_depth: self.dispatch_depth(),
            enable_methods: self.options.enable_methods,
            bridged_methods,
            registrations: self.registrations(filter),
        };

        serde_json::to_string_pretty(&dump)
            .unwrap_or_else(|e| format!("{{\"hub\": \"{}\", \"error\": \"{}\"}}", self.id, e))
    }

    pub(crate) fn has_bridge(&self) -> bool {
        self.bridge.is_some()
    }

    /// Registers the class method bodies for `event` as this instance's
    /// priority-0 callbacks, once per instance.
    pub(crate) fn install_method_bodies(&self, event: &str, bodies: &[MethodBody<T>]) {
        let fresh = self.bridged.borrow_mut().insert(event.to_string());
        if !fresh {
            return;
        }

        let batch = self.registry.next_batch();
        for body in bodies {
            let body = body.clone();
            self.registry.insert(
                event,
                DEFAULT_PRIORITY,
                Callback::new(move |target, args| body(target, args)),
                batch,
            );
        }
        debug!(hub = %self.id, event = %event, bodies = bodies.len(), batch = %batch, "method bodies registered");
    }
}

impl<T: Bridged> EventHub<T> {
    /// Creates a hub for a [`Bridged`] class.
    ///
    /// With `enable_methods` set, the first trigger or method call of an
    /// event the class declares bridges it: the class bodies join the
    /// chain at priority 0 and both entry points run the same chain.
    pub fn bridged(options: HubOptions) -> Self {
        Self {
            bridge: Some(bridge::activate::<T> as BridgeHook<T>),
            ..Self::with_options(options)
        }
    }
}

impl<T: EventSource> Default for EventHub<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: EventSource> fmt::Debug for EventHub<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHub")
            .field("id", &self.id)
            .field("options", &self.options)
            .field("registrations", &self.registry.len())
            .field("dispatch_depth", &self.dispatch_depth())
            .finish()
    }
}

/// Something that identifies registrations to remove: a
/// [`RegistrationHandle`] or a [`Callback`].
pub trait Unregister<T: EventSource> {
    fn unregister_from(&self, hub: &EventHub<T>) -> usize;
}

impl<T: EventSource> Unregister<T> for Callback<T> {
    fn unregister_from(&self, hub: &EventHub<T>) -> usize {
        let removed = hub.registry.remove_callback(self);
        debug!(hub = %hub.id, callback = ?self, removed, "callback unregistered");
        removed
    }
}

impl<T: EventSource> Unregister<T> for RegistrationHandle {
    fn unregister_from(&self, hub: &EventHub<T>) -> usize {
        if self.hub() != hub.id {
            warn!(hub = %hub.id, owner = %self.hub(), batch = %self.batch(), "handle belongs to another hub");
            return 0;
        }
        self.release_counted()
    }
}

#[derive(Serialize)]
struct Dump {
    hub: HubId,
    dispatch_depth: usize,
    enable_methods: bool,
    bridged_methods: Vec<String>,
    registrations: Vec<RegistrationInfo>,
}

/// Pops a dispatch context, and anything left above it, on every exit path.
struct ContextGuard<'a, T: EventSource> {
    contexts: &'a RefCell<Vec<DispatchContext<T>>>,
    depth: usize,
}

impl<T: EventSource> Drop for ContextGuard<'_, T> {
    fn drop(&mut self) {
        let popped: Vec<DispatchContext<T>> = {
            let mut contexts = self.contexts.borrow_mut();
            if contexts.len() > self.depth {
                contexts.drain(self.depth..).collect()
            } else {
                Vec::new()
            }
        };
        drop(popped);
    }
}

/// Marks the exception handler as running until dropped.
struct HandlerFlag<'a>(&'a Cell<bool>);

impl<'a> HandlerFlag<'a> {
    fn raise(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for HandlerFlag<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}
