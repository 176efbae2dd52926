//! Purpose: Per-mutation options and store-wide configuration.
//! Exports: `SetOptions`, `StoreConfig`.
//! Role: Plain data handed to `Store::set_with`; the last options used for a path are kept.
//! Invariants: `SetOptions::default()` notifies, persists, and records history.

use crate::core::notify::ListenerKey;

pub const DEFAULT_ROOT: &str = "app";

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SetOptions {
    /// Fire listeners for this change.
    ///
    /// `false` silences every listener, the persistor's included: the write
    /// stays in memory only and is lost on reload unless a later persisted
    /// change covers the same path.
    pub notify: bool,
    /// Paths whose own listeners are skipped for this change.
    pub exclude_notification_paths: Vec<String>,
    /// Listener keys skipped for this change, wherever they are registered.
    pub exclude_notification_listeners: Vec<ListenerKey>,
    /// Persist containers as one record instead of flattening them.
    pub immutable: bool,
    pub persist: bool,
    pub save_history: bool,
}

impl SetOptions {
    pub fn new() -> Self {
        Self {
            notify: true,
            exclude_notification_paths: Vec::new(),
            exclude_notification_listeners: Vec::new(),
            immutable: false,
            persist: true,
            save_history: true,
        }
    }

    pub fn with_notify(mut self, notify: bool) -> Self {
        self.notify = notify;
        self
    }

    pub fn excluding_path(mut self, path: impl Into<String>) -> Self {
        self.exclude_notification_paths.push(path.into());
        self
    }

    pub fn excluding_listener(mut self, key: ListenerKey) -> Self {
        self.exclude_notification_listeners.push(key);
        self
    }

    pub fn with_immutable(mut self, immutable: bool) -> Self {
        self.immutable = immutable;
        self
    }

    pub fn with_persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    pub fn with_save_history(mut self, save_history: bool) -> Self {
        self.save_history = save_history;
        self
    }

    pub(crate) fn excludes_path(&self, path: &str) -> bool {
        self.exclude_notification_paths.iter().any(|p| p == path)
    }

    pub(crate) fn excludes_listener(&self, key: ListenerKey) -> bool {
        self.exclude_notification_listeners.contains(&key)
    }
}

impl Default for SetOptions {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StoreConfig {
    /// Name of the fixed top-level node; it can never be removed.
    pub root: String,
}

impl StoreConfig {
    pub fn new(root: impl Into<String>) -> Self {
        Self { root: root.into() }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new(DEFAULT_ROOT)
    }
}
