//! Process-wide configuration for hookchain.
//!
//! Provides the defaults new event hubs are constructed with and the
//! environment variables that seed them.
//!
//! # Environment Variables
//!
//! - `HOOKCHAIN_ENABLE_METHODS`: Default for [`HubOptions::enable_methods`]
//!   (`1`, `true`, `yes`, `on` enable it; `0`, `false`, `no`, `off` disable it)
//!
//! The environment is read once, the first time a default is needed.
//! [`set_default_enable_methods`] overrides it for the rest of the process.

use std::sync::{OnceLock, RwLock};

use serde::{Deserialize, Serialize};

/// Environment variable for the process default of method bridging.
pub const ENABLE_METHODS_ENV: &str = "HOOKCHAIN_ENABLE_METHODS";

// Value read from the environment, cached on first use
static ENV_ENABLE_METHODS: OnceLock<bool> = OnceLock::new();

// Runtime override set through `set_default_enable_methods`
static ENABLE_METHODS_OVERRIDE: RwLock<Option<bool>> = RwLock::new(None);

/// Parses a boolean flag the way the environment variables are documented.
///
/// Returns `None` for anything that is not a recognised spelling.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

fn env_enable_methods() -> bool {
    *ENV_ENABLE_METHODS.get_or_init(|| match std::env::var(ENABLE_METHODS_ENV) {
        Ok(raw) => parse_flag(&raw).unwrap_or_else(|| {
            tracing::warn!(
                var = ENABLE_METHODS_ENV,
                value = %raw,
                "unrecognised flag value, method bridging stays disabled"
            );
            false
        }),
        Err(_) => false,
    })
}

/// Get the process default for method bridging.
///
/// The default is determined by:
/// 1. The last value passed to [`set_default_enable_methods`]
/// 2. `HOOKCHAIN_ENABLE_METHODS` if set
/// 3. `false`
pub fn default_enable_methods() -> bool {
    let overridden = ENABLE_METHODS_OVERRIDE
        .read()
        .map(|guard| *guard)
        .unwrap_or_else(|poisoned| *poisoned.into_inner());

    overridden.unwrap_or_else(env_enable_methods)
}

/// Sets the process default for method bridging.
///
/// Only hubs constructed afterwards are affected.
pub fn set_default_enable_methods(enabled: bool) {
    let mut guard = ENABLE_METHODS_OVERRIDE
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = Some(enabled);
}

/// Construction options for an event hub.
///
/// Deserializes from an embedder's own configuration; missing fields fall
/// back to the process defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubOptions {
    /// Route method-call invocations through the dispatch chain.
    pub enable_methods: bool,
}

impl HubOptions {
    /// Creates options from the current process defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether method bridging is enabled.
    pub fn enable_methods(mut self, enabled: bool) -> Self {
        self.enable_methods = enabled;
        self
    }
}

impl Default for HubOptions {
    fn default() -> Self {
        Self {
            enable_methods: default_enable_methods(),
        }
    }
}
