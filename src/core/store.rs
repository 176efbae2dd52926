//! Purpose: Own the state tree and route every read and mutation through aliases.
//! Exports: `Store`, `NotificationPause`, `ASSIGN_MAX_GAP`.
//! Role: Public entry point of the core; persistence and the CLI only talk to this type.
//! Invariants: Tree access always uses the dereferenced path; listeners see the post-write tree.
//! Invariants: The configured root node always exists and is never removed.
//! Invariants: History entries are owned values moved out of the tree, never shared.
//! Notes: Callbacks receive read-only views and cannot re-enter the store.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

use serde_json::{Map, Value};
use tracing::debug;

use crate::core::alias::AliasTable;
use crate::core::error::{Error, ErrorKind};
use crate::core::flatten::{Record, flatten};
use crate::core::history::History;
use crate::core::notify::{Change, Dispatch, ListenerKey, Listeners};
use crate::core::options::{SetOptions, StoreConfig};
use crate::core::path::{Node, parse_path, relative};
use crate::core::tree::{self, Gaps};

/// Default bound on the `null` padding a single `assign` may add to an array.
pub const ASSIGN_MAX_GAP: usize = 4096;

#[derive(Debug)]
pub struct Store {
    config: StoreConfig,
    tree: Value,
    aliases: AliasTable,
    history: History,
    listeners: Listeners,
    options: HashMap<String, SetOptions>,
    notifications_enabled: bool,
}

impl Store {
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Self {
        let mut tree = Map::new();
        tree.insert(config.root.clone(), Value::Object(Map::new()));
        Self {
            config,
            tree: Value::Object(tree),
            aliases: AliasTable::new(),
            history: History::new(),
            listeners: Listeners::default(),
            options: HashMap::new(),
            notifications_enabled: true,
        }
    }

    pub fn root(&self) -> &str {
        &self.config.root
    }

    /// The whole tree, keyed by top-level name.
    pub fn tree(&self) -> &Value {
        &self.tree
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    pub fn get(&self, path: &str) -> Result<Option<&Value>, Error> {
        let resolved = self.aliases.dereference(path)?;
        let nodes = parse_path(&resolved)?;
        Ok(tree::lookup(&self.tree, &nodes))
    }

    /// Existing value (any defined value, `null` included), or write `default` and return it.
    pub fn get_or_set(
        &mut self,
        path: &str,
        default: Value,
        options: SetOptions,
    ) -> Result<&Value, Error> {
        if self.get(path)?.is_none() {
            self.set_with(path, default, options)?;
        }
        self.get(path)?.ok_or_else(|| {
            Error::new(ErrorKind::Internal)
                .with_message("value missing right after it was written")
                .with_state_path(path)
        })
    }

    pub fn set(&mut self, path: &str, value: Value) -> Result<(), Error> {
        self.set_with(path, value, SetOptions::default())
    }

    pub fn set_with(&mut self, path: &str, value: Value, options: SetOptions) -> Result<(), Error> {
        let resolved = self.aliases.dereference(path)?;
        let nodes = parse_path(&resolved)?;
        let replaced = tree::assign(&mut self.tree, &nodes, value, Gaps::Reject)?;

        if let Some(previous) = replaced.filter(|_| options.save_history) {
            self.history.push(&resolved, previous);
        }
        self.options.insert(resolved.clone(), options.clone());
        self.dispatch(&resolved, &resolved, false, &options);
        Ok(())
    }

    /// Raw write for loaders: no alias resolution, history, option record, or notification.
    /// Array gaps are padded with `null` so records can arrive in any order.
    pub fn assign(&mut self, path: &str, value: Value) -> Result<(), Error> {
        self.assign_padded(path, value, ASSIGN_MAX_GAP)
    }

    /// `assign` with an explicit limit on how many `null` slots one write may add.
    /// A larger gap fails with `InvalidPath` before the array grows.
    pub fn assign_padded(&mut self, path: &str, value: Value, max_gap: usize) -> Result<(), Error> {
        let nodes = parse_path(path)?;
        tree::assign(&mut self.tree, &nodes, value, Gaps::PadWithNull { max_gap })?;
        Ok(())
    }

    pub fn remove(&mut self, path: &str) -> Result<(), Error> {
        if path.is_empty() || path == self.config.root {
            return Ok(());
        }
        let target = self.aliases.materialize(path)?;
        if let Some(old) = self.aliases.unlink(&target) {
            debug!(alias = %target, target = %old, "removed alias");
            return Ok(());
        }

        let nodes = parse_path(&target)?;
        tree::delete(&mut self.tree, &nodes)?;
        let dropped = self.aliases.unlink_targets_under(&target);
        debug!(path = %target, dropped_aliases = dropped.len(), "removed node");

        let options = self
            .options
            .get(path)
            .or_else(|| self.options.get(&target))
            .cloned()
            .unwrap_or_default();
        self.dispatch(path, &target, false, &options);
        Ok(())
    }

    /// Make `alias` another name for `target`. Returns the stored alias key.
    pub fn link(&mut self, target: &str, alias: &str) -> Result<String, Error> {
        self.aliases.link(target, alias)
    }

    pub fn dereference(&self, path: &str) -> Result<String, Error> {
        self.aliases.dereference(path)
    }

    pub fn reverse_aliases_of(&self, path: &str) -> Vec<String> {
        self.aliases.reverse_aliases_of(path)
    }

    pub fn listen<F>(&mut self, path: &str, callback: F) -> ListenerKey
    where
        F: FnMut(&Change<'_>) + 'static,
    {
        let key = self.listeners.add(path, Box::new(callback));
        debug!(path = %path, key = key.get(), "listener added");
        key
    }

    pub fn remove_listener(&mut self, path: &str, key: ListenerKey) -> bool {
        self.listeners.remove(path, key)
    }

    pub fn listener_count(&self, path: &str) -> usize {
        self.listeners.count(path)
    }

    /// Fire listeners for `path` without changing anything.
    ///
    /// `explicit` limits the call to `path` itself (and its aliases); otherwise
    /// ancestors and descendants are notified too.
    pub fn notify(&mut self, path: &str, explicit: bool, options: &SetOptions) {
        let target = self
            .aliases
            .dereference(path)
            .unwrap_or_else(|_| path.to_string());
        self.dispatch(path, &target, explicit, options);
    }

    pub fn disable_notifications(&mut self) {
        self.notifications_enabled = false;
    }

    pub fn enable_notifications(&mut self) {
        self.notifications_enabled = true;
    }

    pub fn notifications_enabled(&self) -> bool {
        self.notifications_enabled
    }

    /// Disable notifications until the returned guard is dropped.
    pub fn pause_notifications(&mut self) -> NotificationPause<'_> {
        let was_enabled = self.notifications_enabled;
        self.notifications_enabled = false;
        NotificationPause {
            store: self,
            was_enabled,
        }
    }

    /// Options last used to write `path` (keyed by dereferenced path).
    pub fn options_for(&self, path: &str) -> Option<&SetOptions> {
        self.options.get(path)
    }

    /// Most recent previous value recorded for `path`.
    pub fn previous(&self, path: &str) -> Result<Option<&Value>, Error> {
        let resolved = self.aliases.dereference(path)?;
        Ok(self.history.latest(&resolved))
    }

    pub fn history_depth(&self, path: &str) -> Result<usize, Error> {
        let resolved = self.aliases.dereference(path)?;
        Ok(self.history.depth(&resolved))
    }

    /// Roll back one step of history.
    ///
    /// Walks from the full path toward the root and rewinds the first prefix
    /// that currently holds a value: its last recorded value is restored, or
    /// the value is cleared when nothing was recorded. Returns the rewound
    /// path. Listeners are not notified.
    pub fn undo(&mut self, path: &str) -> Result<Option<String>, Error> {
        let resolved = self.aliases.dereference(path)?;
        let nodes = parse_path(&resolved)?;

        if nodes.len() == 1 {
            self.rewind(&nodes)?;
            return Ok(Some(resolved));
        }
        for depth in (1..=nodes.len()).rev() {
            let prefix = &nodes[..depth];
            if tree::lookup(&self.tree, prefix).is_none() {
                continue;
            }
            let rewound = self.rewind(prefix)?;
            return Ok(rewound);
        }
        Ok(None)
    }

    fn rewind(&mut self, nodes: &[Node]) -> Result<Option<String>, Error> {
        let Some(leaf) = nodes.last() else {
            return Ok(None);
        };
        let path = leaf.path.clone();
        match self.history.pop(&path) {
            Some(previous) => {
                tree::assign(
                    &mut self.tree,
                    nodes,
                    previous,
                    Gaps::PadWithNull {
                        max_gap: ASSIGN_MAX_GAP,
                    },
                )?;
            }
            None if path == self.config.root => return Ok(None),
            None => {
                tree::clear(&mut self.tree, nodes);
            }
        }
        debug!(path = %path, remaining = self.history.depth(&path), "undo");
        Ok(Some(path))
    }

    /// Records for the value at `path`, keyed relative to the root.
    pub fn flatten(&self, path: &str) -> Result<Vec<Record>, Error> {
        let resolved = self.aliases.dereference(path)?;
        let nodes = parse_path(&resolved)?;
        let Some(value) = tree::lookup(&self.tree, &nodes) else {
            return Ok(Vec::new());
        };
        let base = relative(&resolved, &self.config.root).unwrap_or(resolved.as_str());
        Ok(flatten(value, base))
    }

    fn dispatch(&mut self, path: &str, target: &str, explicit: bool, options: &SetOptions) {
        if !self.notifications_enabled || !options.notify {
            return;
        }
        Dispatch {
            tree: &self.tree,
            aliases: &self.aliases,
            history: &self.history,
            listeners: &mut self.listeners,
            options,
            target,
        }
        .run(path, explicit);
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

/// Store handle with notifications disabled; dropping it restores the previous setting.
pub struct NotificationPause<'a> {
    store: &'a mut Store,
    was_enabled: bool,
}

impl Deref for NotificationPause<'_> {
    type Target = Store;

    fn deref(&self) -> &Store {
        self.store
    }
}

impl DerefMut for NotificationPause<'_> {
    fn deref_mut(&mut self) -> &mut Store {
        self.store
    }
}

impl Drop for NotificationPause<'_> {
    fn drop(&mut self) {
        if self.was_enabled {
            self.store.enable_notifications();
        }
    }
}
