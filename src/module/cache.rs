//! Loaded-module cache and presentation settings.

use indexmap::IndexMap;
use serde::Serialize;

use super::host::Handle;

/// Auto-print settings read by the presenter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PrintSettings {
    pub auto_print: bool,
    /// Truncation threshold in characters
    pub print_limit: usize,
}

impl Default for PrintSettings {
    fn default() -> Self {
        PrintSettings {
            auto_print: true,
            print_limit: crate::config::DEFAULT_PRINT_LIMIT,
        }
    }
}

/// Read-only snapshot of cache state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Info {
    pub cache_size: usize,
    /// Cache keys in insertion order
    pub cached_modules: Vec<String>,
    pub auto_print: bool,
    pub print_limit: usize,
}

/// Handles keyed by alias or requested name. Unbounded; nothing is evicted.
#[derive(Debug, Default)]
pub struct ModuleCache {
    entries: IndexMap<String, Handle>,
    settings: PrintSettings,
}

impl ModuleCache {
    pub fn new(settings: PrintSettings) -> Self {
        ModuleCache {
            entries: IndexMap::new(),
            settings,
        }
    }

    pub fn get(&self, key: &str) -> Option<Handle> {
        self.entries.get(key).cloned()
    }

    /// Store a handle, replacing any previous entry in place.
    pub fn put(&mut self, key: &str, handle: Handle) {
        self.entries.insert(key.to_string(), handle);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn settings(&self) -> PrintSettings {
        self.settings
    }

    pub fn settings_mut(&mut self) -> &mut PrintSettings {
        &mut self.settings
    }

    pub fn snapshot(&self) -> Info {
        Info {
            cache_size: self.entries.len(),
            cached_modules: self.entries.keys().cloned().collect(),
            auto_print: self.settings.auto_print,
            print_limit: self.settings.print_limit,
        }
    }
}
