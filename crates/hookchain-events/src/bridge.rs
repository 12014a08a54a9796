//! Method bridge - one chain for method calls and explicit triggers.
//!
//! A [`Bridged`] class declares event-methods: default bodies keyed by
//! event name. Each class gets one table, built from
//! [`Bridged::declare`] the first time the class is bridged and kept for
//! the life of the process.
//!
//! Per `(class, event)` the bridge moves one way from unbridged to
//! bridged. The move happens the first time an instance with
//! `enable_methods` set triggers the event or calls the method. From then
//! on every instance of the class routes [`Bridged::call`] through the
//! dispatch chain, with the class bodies registered once per instance as
//! priority-0 callbacks.
//!
//! Bodies can come from ancestor components. A component lists the
//! event-methods it hands down ([`EventComponent::hand_down`]); a class
//! picks the components it inherits from ([`ClassDecl::inherit`]). The
//! inherited bodies run in inheritance order, before the class's own
//! override.

use std::any::{type_name, Any, TypeId};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, OnceLock, RwLock};

use tracing::debug;

use crate::callback::CallbackResult;
use crate::error::{EventError, Result};
use crate::source::EventSource;

/// A class-level event-method body.
pub type MethodBody<T> = Arc<
    dyn Fn(&T, &<T as EventSource>::Args) -> CallbackResult<<T as EventSource>::Output>
        + Send
        + Sync,
>;

/// A class whose event-methods can be bridged into the dispatch chain.
///
/// # Example
///
/// ```
/// use hookchain_core::HubOptions;
/// use hookchain_events::{Bridged, Callback, ClassDecl, EventHub, EventSource};
///
/// struct Kettle {
///     hub: EventHub<Kettle>,
/// }
///
/// impl EventSource for Kettle {
///     type Args = u32;
///     type Output = String;
///
///     fn hub(&self) -> &EventHub<Self> {
///         &self.hub
///     }
/// }
///
/// impl Bridged for Kettle {
///     fn declare(class: &mut ClassDecl<Self>) {
///         class.method("boil", |_, degrees| Ok(vec![format!("boiling at {degrees}")]));
///     }
/// }
///
/// let kettle = Kettle {
///     hub: EventHub::bridged(HubOptions::new().enable_methods(true)),
/// };
/// let _whistle = kettle
///     .hub()
///     .on("after_boil", Callback::new(|_, _| Ok(vec!["whistle".to_string()])));
///
/// let called = kettle.call("boil", 100).unwrap();
/// let triggered = kettle.trigger("boil", 100);
/// assert_eq!(called, vec!["boiling at 100", "whistle"]);
/// assert_eq!(called, triggered);
/// ```
pub trait Bridged: EventSource {
    /// Declares the class's own event-methods and the components it
    /// inherits from. Called once per class.
    fn declare(class: &mut ClassDecl<Self>);

    /// Invokes an event-method by name.
    ///
    /// Once the method is bridged (see the module docs) this is the same
    /// as [`EventSource::trigger`]. Before that, on an instance without
    /// `enable_methods`, the class bodies run directly and a failing body
    /// is returned as [`EventError::MethodFailed`].
    ///
    /// # Errors
    ///
    /// [`EventError::UnknownMethod`] if the class declares no such method.
    fn call(&self, method: &str, args: Self::Args) -> Result<Vec<Self::Output>> {
        call(self, method, args)
    }
}

/// A component whose event-methods can be inherited by host classes.
///
/// Bodies receive the host object, so they can reach the component
/// through the host (for example with `AsRef`) and use the host's hub.
pub trait EventComponent<T: EventSource> {
    /// Lists the event-methods this component hands down.
    fn hand_down(methods: &mut HandDown<T>);
}

/// Collects the event-methods a component hands down.
pub struct HandDown<T: EventSource> {
    methods: Vec<(String, MethodBody<T>)>,
}

impl<T: EventSource> HandDown<T> {
    fn new() -> Self {
        Self {
            methods: Vec::new(),
        }
    }

    /// Hands down one event-method.
    pub fn method<F>(&mut self, name: &str, body: F) -> &mut Self
    where
        F: Fn(&T, &T::Args) -> CallbackResult<T::Output> + Send + Sync + 'static,
    {
        self.methods.push((name.to_string(), Arc::new(body)));
        self
    }
}

/// Declaration of one class's event-methods.
pub struct ClassDecl<T: EventSource> {
    inherited: Vec<(&'static str, Vec<(String, MethodBody<T>)>)>,
    own: Vec<(String, MethodBody<T>)>,
}

impl<T: EventSource> ClassDecl<T> {
    fn new() -> Self {
        Self {
            inherited: Vec::new(),
            own: Vec::new(),
        }
    }

    /// Declares (or re-declares) the class's own body for an event-method.
    ///
    /// The own body runs after every inherited body of the same name.
    pub fn method<F>(&mut self, name: &str, body: F) -> &mut Self
    where
        F: Fn(&T, &T::Args) -> CallbackResult<T::Output> + Send + Sync + 'static,
    {
        self.own.retain(|(existing, _)| existing != name);
        self.own.push((name.to_string(), Arc::new(body)));
        self
    }

    /// Inherits the event-methods component `C` hands down.
    ///
    /// Components are grouped in the order they are inherited; inheriting
    /// the same component twice has no further effect.
    pub fn inherit<C: EventComponent<T> + ?Sized>(&mut self) -> &mut Self {
        let component = type_name::<C>();
        if self.inherited.iter().any(|(name, _)| *name == component) {
            return self;
        }

        let mut methods = HandDown::new();
        C::hand_down(&mut methods);
        self.inherited.push((component, methods.methods));
        self
    }

    fn into_table(self) -> ClassTable<T> {
        let mut methods: BTreeMap<String, Vec<MethodBody<T>>> = BTreeMap::new();
        let mut ancestors = Vec::with_capacity(self.inherited.len());

        for (component, bodies) in self.inherited {
            ancestors.push(component);
            for (name, body) in bodies {
                methods.entry(name).or_default().push(body);
            }
        }
        for (name, body) in self.own {
            methods.entry(name).or_default().push(body);
        }

        ClassTable {
            class: type_name::<T>(),
            methods,
            ancestors,
            bridged: RwLock::new(HashSet::new()),
        }
    }
}

/// Process-wide bridge state of one class.
pub(crate) struct ClassTable<T: EventSource> {
    class: &'static str,
    methods: BTreeMap<String, Vec<MethodBody<T>>>,
    ancestors: Vec<&'static str>,
    bridged: RwLock<HashSet<String>>,
}

impl<T: EventSource> ClassTable<T> {
    fn is_bridged(&self, event: &str) -> bool {
        self.bridged
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(event)
    }

    /// Marks the event bridged; true only for the first caller.
    fn mark_bridged(&self, event: &str) -> bool {
        self.bridged
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(event.to_string())
    }
}

type AnyTable = Arc<dyn Any + Send + Sync>;

static CLASSES: OnceLock<RwLock<HashMap<TypeId, AnyTable>>> = OnceLock::new();

fn build_table<T: Bridged>() -> ClassTable<T> {
    let mut decl = ClassDecl::new();
    T::declare(&mut decl);
    let table = decl.into_table();
    debug!(
        class = table.class,
        methods = table.methods.len(),
        ancestors = ?table.ancestors,
        "class bridge table built"
    );
    table
}

/// Returns the table of class `T`, building it on first use.
///
/// `declare` runs without any lock held, so it may look at other classes.
/// If two threads race, the first stored table wins.
fn class_table<T: Bridged>() -> Arc<ClassTable<T>> {
    let classes = CLASSES.get_or_init(Default::default);
    let key = TypeId::of::<T>();

    let cached = classes
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .get(&key)
        .cloned();

    let table = match cached {
        Some(table) => table,
        None => {
            let built: AnyTable = Arc::new(build_table::<T>());
            classes
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .entry(key)
                .or_insert(built)
                .clone()
        }
    };

    table
        .downcast::<ClassTable<T>>()
        .expect("class table stored under another class's TypeId")
}

/// Bridge hook installed by [`EventHub::bridged`](crate::EventHub::bridged).
pub(crate) fn activate<T: Bridged>(target: &T, event: &str) {
    let hub = target.hub();
    let table = class_table::<T>();
    let Some(bodies) = table.methods.get(event) else {
        return;
    };

    if !table.is_bridged(event) {
        if !hub.options().enable_methods {
            return;
        }
        if table.mark_bridged(event) {
            debug!(class = table.class, event = %event, hub = %hub.id(), "event method bridged");
        }
    }

    hub.install_method_bodies(event, bodies);
}

fn call<T: Bridged>(target: &T, method: &str, args: T::Args) -> Result<Vec<T::Output>> {
    let table = class_table::<T>();
    let bodies = table
        .methods
        .get(method)
        .ok_or_else(|| EventError::UnknownMethod(method.to_string()))?;

    let hub = target.hub();
    if hub.has_bridge() && (hub.options().enable_methods || table.is_bridged(method)) {
        return Ok(hub.trigger(target, method, args));
    }

    let mut values = Vec::new();
    for body in bodies {
        let produced = body(target, &args).map_err(|e| EventError::MethodFailed {
            method: method.to_string(),
            source: e.into(),
        })?;
        values.extend(produced);
    }
    Ok(values)
}

/// Returns true once `event` is bridged for class `T`.
pub fn is_bridged<T: Bridged>(event: &str) -> bool {
    class_table::<T>().is_bridged(event)
}

/// Names of the event-methods class `T` declares, own and inherited.
pub fn declared_methods<T: Bridged>() -> Vec<String> {
    class_table::<T>().methods.keys().cloned().collect()
}

/// Components class `T` inherits from, in inheritance order.
pub fn ancestors<T: Bridged>() -> Vec<&'static str> {
    class_table::<T>().ancestors.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::EventHub;
    use hookchain_core::HubOptions;

    // Class tables are process-wide, so every test uses its own types.

    struct Lamp {
        hub: EventHub<Lamp>,
    }

    impl EventSource for Lamp {
        type Args = ();
        type Output = &'static str;

        fn hub(&self) -> &EventHub<Self> {
            &self.hub
        }
    }

    impl Bridged for Lamp {
        fn declare(class: &mut ClassDecl<Self>) {
            class
                .method("switch", |_, _| Ok(vec!["first"]))
                .method("switch", |_, _| Ok(vec!["lamp"]))
                .method("break", |_, _| Err(anyhow::anyhow!("bulb blew")));
        }
    }

    struct Glow;

    impl<T: EventSource<Output = &'static str>> EventComponent<T> for Glow {
        fn hand_down(methods: &mut HandDown<T>) {
            methods.method("switch", |_, _| Ok(vec!["glow"]));
        }
    }

    struct Shade {
        hub: EventHub<Shade>,
    }

    impl EventSource for Shade {
        type Args = ();
        type Output = &'static str;

        fn hub(&self) -> &EventHub<Self> {
            &self.hub
        }
    }

    impl Bridged for Shade {
        fn declare(class: &mut ClassDecl<Self>) {
            class
                .inherit::<Glow>()
                .inherit::<Glow>()
                .method("switch", |_, _| Ok(vec!["shade"]));
        }
    }

    #[test]
    fn test_redeclared_method_replaces_own_body() {
        let lamp = Lamp {
            hub: EventHub::bridged(HubOptions::new().enable_methods(false)),
        };
        assert_eq!(lamp.call("switch", ()).unwrap(), vec!["lamp"]);
    }

    #[test]
    fn test_unknown_method() {
        let lamp = Lamp {
            hub: EventHub::bridged(HubOptions::new().enable_methods(false)),
        };
        let result = lamp.call("dim", ());
        assert!(matches!(result, Err(EventError::UnknownMethod(name)) if name == "dim"));
    }

    #[test]
    fn test_direct_call_failure_is_returned() {
        let lamp = Lamp {
            hub: EventHub::bridged(HubOptions::new().enable_methods(false)),
        };
        let result = lamp.call("break", ());
        assert!(matches!(result, Err(EventError::MethodFailed { ref method, .. }) if method == "break"));
        assert!(!is_bridged::<Lamp>("break"));
    }

    #[test]
    fn test_inherited_bodies_run_before_own_and_dedupe() {
        assert_eq!(ancestors::<Shade>().len(), 1);
        assert_eq!(declared_methods::<Shade>(), vec!["switch".to_string()]);

        let shade = Shade {
            hub: EventHub::bridged(HubOptions::new().enable_methods(true)),
        };
        assert_eq!(shade.call("switch", ()).unwrap(), vec!["glow", "shade"]);
        assert!(is_bridged::<Shade>("switch"));
    }

    #[test]
    fn test_class_table_is_built_once_per_class() {
        let first = class_table::<Lamp>();
        let again = class_table::<Lamp>();
        assert!(Arc::ptr_eq(&first, &again));

        let shade = class_table::<Shade>();
        assert_eq!(shade.class, type_name::<Shade>());
        assert_eq!(first.class, type_name::<Lamp>());
    }
}
