// src/env_source.rs
//
// Read-only view of the ambient process environment.  The locator and the
// importer never call `std::env` themselves; they receive an `EnvSource`
// so tests can hand them a fake one.

#[cfg(test)]
use std::collections::BTreeMap;

pub trait EnvSource {
    /// Value of `name`, `None` when unset or not valid unicode.
    fn var(&self, name: &str) -> Option<String>;
}

// ─── Real environment ─────────────────────────────────────────────────────────

/// Environment provider backed by `std::env`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemEnv;

impl EnvSource for SystemEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

// ─── Fixed map ────────────────────────────────────────────────────────────────

/// Environment provider with a fixed set of variables.
#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct MapEnv {
    vars: BTreeMap<String, String>,
}

#[cfg(test)]
impl MapEnv {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.vars.insert(name.to_owned(), value.to_owned());
        self
    }
}

#[cfg(test)]
impl EnvSource for MapEnv {
    fn var(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }
}
