//! Purpose: Register change listeners and dispatch notifications through the tree.
//! Exports: `ListenerKey`, `Change`, `Callback`.
//! Role: Three-phase fan-out (ancestors, the path itself, descendants) with alias expansion.
//! Invariants: Listener keys are never reused within one store.
//! Invariants: Listeners observe the tree read-only; dispatch never mutates state.
//! Notes: `Dispatch` borrows the store's parts explicitly so callbacks can be
//! invoked mutably while the tree, aliases, and history stay shared.

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;
use tracing::warn;

use crate::core::alias::AliasTable;
use crate::core::history::History;
use crate::core::options::SetOptions;
use crate::core::path::{Key, join, parse_path};
use crate::core::tree::lookup_path;

/// Opaque handle returned by `Store::listen`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ListenerKey(u64);

impl ListenerKey {
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a listener sees when it fires.
#[derive(Debug)]
pub struct Change<'a> {
    /// Path the listener was registered on.
    pub path: &'a str,
    /// Path that was actually written (equals `path` for direct and alias hits).
    pub modified: &'a str,
    /// Alias-free path the triggering write or removal went to.
    pub target: &'a str,
    pub current: Option<&'a Value>,
    /// Top of `path`'s own history stack.
    pub previous: Option<&'a Value>,
    pub options: &'a SetOptions,
}

pub type Callback = Box<dyn FnMut(&Change<'_>)>;

struct Registration {
    key: ListenerKey,
    callback: Callback,
}

#[derive(Default)]
pub(crate) struct Listeners {
    last_key: u64,
    by_path: HashMap<String, Vec<Registration>>,
}

impl Listeners {
    pub(crate) fn add(&mut self, path: &str, callback: Callback) -> ListenerKey {
        self.last_key += 1;
        let key = ListenerKey(self.last_key);
        self.by_path
            .entry(path.to_string())
            .or_default()
            .push(Registration { key, callback });
        key
    }

    pub(crate) fn remove(&mut self, path: &str, key: ListenerKey) -> bool {
        let Some(registrations) = self.by_path.get_mut(path) else {
            return false;
        };
        let before = registrations.len();
        registrations.retain(|registration| registration.key != key);
        let removed = registrations.len() != before;
        if registrations.is_empty() {
            self.by_path.remove(path);
        }
        removed
    }

    pub(crate) fn count(&self, path: &str) -> usize {
        self.by_path.get(path).map_or(0, Vec::len)
    }

    fn has(&self, path: &str) -> bool {
        self.by_path.contains_key(path)
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("last_key", &self.last_key)
            .field("paths", &self.by_path.keys().collect::<Vec<_>>())
            .finish()
    }
}

pub(crate) struct Dispatch<'a> {
    pub(crate) tree: &'a Value,
    pub(crate) aliases: &'a AliasTable,
    pub(crate) history: &'a History,
    pub(crate) listeners: &'a mut Listeners,
    pub(crate) options: &'a SetOptions,
    pub(crate) target: &'a str,
}

impl Dispatch<'_> {
    pub(crate) fn run(&mut self, path: &str, explicit: bool) {
        if !explicit {
            self.notify_up(path);
        }
        self.notify_explicit(path);
        if !explicit {
            self.notify_down(path);
        }
    }

    /// Root first, immediate parent last.
    fn notify_up(&mut self, path: &str) {
        let Ok(mut nodes) = parse_path(path) else {
            return;
        };
        nodes.pop();
        for node in &nodes {
            self.fan_out(&node.path);
            if self.options.excludes_path(&node.path) {
                continue;
            }
            self.fire(&node.path, path);
        }
    }

    fn notify_explicit(&mut self, path: &str) {
        self.fan_out(path);
        if self.options.excludes_path(path) {
            return;
        }
        self.fire(path, path);
    }

    fn notify_down(&mut self, path: &str) {
        let children: Vec<Key> = match self.value_at(path) {
            Some(Value::Object(map)) => map.keys().cloned().map(Key::Name).collect(),
            Some(Value::Array(items)) => (0..items.len()).map(Key::Index).collect(),
            _ => return,
        };
        for key in children {
            let child = join(path, &key);
            self.fan_out(&child);
            if !self.options.excludes_path(&child) {
                self.fire(&child, path);
            }
            self.notify_down(&child);
        }
    }

    fn fan_out(&mut self, path: &str) {
        if self.aliases.is_empty() {
            return;
        }
        for alias in self.aliases.reverse_aliases_of(path) {
            if !self.listeners.has(&alias) || self.options.excludes_path(&alias) {
                continue;
            }
            self.fire(&alias, &alias);
        }
    }

    fn fire(&mut self, path: &str, modified: &str) {
        let Some(registrations) = self.listeners.by_path.get_mut(path) else {
            return;
        };
        let resolved = match self.aliases.dereference(path) {
            Ok(resolved) => resolved,
            Err(err) => {
                warn!(path = %path, error = %err, "notifying with unresolved path");
                path.to_string()
            }
        };
        let change = Change {
            path,
            modified,
            target: self.target,
            current: lookup_path(self.tree, &resolved),
            previous: self.history.latest(&resolved),
            options: self.options,
        };
        for registration in registrations.iter_mut() {
            if self.options.excludes_listener(registration.key) {
                continue;
            }
            (registration.callback)(&change);
        }
    }

    fn value_at(&self, path: &str) -> Option<&Value> {
        let resolved = self.aliases.dereference(path).ok()?;
        lookup_path(self.tree, &resolved)
    }
}
