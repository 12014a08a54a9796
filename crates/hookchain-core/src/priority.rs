//! Priority aliases and event-name prefix resolution.
//!
//! Event names given at registration time may carry an alias prefix such
//! as `before_` or `after_`. The alias maps to an integer priority and is
//! stripped from the name:
//!
//! ```
//! use hookchain_core::resolve_priority;
//!
//! assert_eq!(resolve_priority("before_save"), ("save".to_string(), 1000));
//! assert_eq!(resolve_priority("save"), ("save".to_string(), 0));
//! ```
//!
//! The alias table is process-wide. Changes affect every later resolution
//! on every hub, but never registrations that already exist.

use std::collections::BTreeMap;
use std::sync::{OnceLock, RwLock};

/// Integer priority of a registration; higher runs earlier.
pub type Priority = i32;

/// Priority of names without a recognised alias prefix.
pub const DEFAULT_PRIORITY: Priority = 0;

/// Built-in `before` alias.
pub const BEFORE: Priority = 1000;

/// Built-in `ext_before` alias.
pub const EXT_BEFORE: Priority = 500;

/// Built-in `ext_after` alias.
pub const EXT_AFTER: Priority = -500;

/// Built-in `after` alias.
pub const AFTER: Priority = -1000;

static ALIASES: OnceLock<RwLock<BTreeMap<String, Priority>>> = OnceLock::new();

fn aliases() -> &'static RwLock<BTreeMap<String, Priority>> {
    ALIASES.get_or_init(|| {
        let builtins = [
            ("before", BEFORE),
            ("ext_before", EXT_BEFORE),
            ("ext_after", EXT_AFTER),
            ("after", AFTER),
        ];
        RwLock::new(
            builtins
                .into_iter()
                .map(|(name, priority)| (name.to_string(), priority))
                .collect(),
        )
    })
}

/// Registers, replaces or removes a priority alias.
///
/// Passing `None` removes the alias. Returns the priority the alias had
/// before the call, if any.
pub fn register_priority_alias(name: &str, priority: Option<Priority>) -> Option<Priority> {
    let mut table = aliases()
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    let previous = match priority {
        Some(priority) => table.insert(name.to_string(), priority),
        None => table.remove(name),
    };

    tracing::debug!(alias = %name, priority = ?priority, previous = ?previous, "priority alias updated");
    previous
}

/// Looks up a single alias.
pub fn priority_alias(name: &str) -> Option<Priority> {
    aliases()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .get(name)
        .copied()
}

/// Returns a copy of the whole alias table, sorted by alias name.
pub fn priority_aliases() -> Vec<(String, Priority)> {
    aliases()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .iter()
        .map(|(name, priority)| (name.clone(), *priority))
        .collect()
}

/// Splits a raw event name into its bare name and priority.
///
/// At most one prefix of the form `<alias>_` is stripped. When several
/// aliases match, the longest alias wins. A prefix that would leave an
/// empty name is not stripped, and unknown prefixes are kept as part of
/// the name. Resolution never fails.
pub fn resolve_priority(raw: &str) -> (String, Priority) {
    let table = aliases()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    let best = table
        .iter()
        .filter_map(|(alias, priority)| {
            let rest = raw.strip_prefix(alias.as_str())?.strip_prefix('_')?;
            (!rest.is_empty()).then_some((alias.len(), rest, *priority))
        })
        .max_by_key(|(len, _, _)| *len);

    match best {
        Some((_, rest, priority)) => (rest.to_string(), priority),
        None => (raw.to_string(), DEFAULT_PRIORITY),
    }
}
