// Per-path stacks of previously held values, keyed by dereferenced path.
use std::collections::HashMap;

use serde_json::Value;

#[derive(Clone, Debug, Default)]
pub struct History {
    stacks: HashMap<String, Vec<Value>>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, path: &str, value: Value) {
        self.stacks.entry(path.to_string()).or_default().push(value);
    }

    pub fn pop(&mut self, path: &str) -> Option<Value> {
        self.stacks.get_mut(path)?.pop()
    }

    /// Most recently recorded previous value for `path`.
    pub fn latest(&self, path: &str) -> Option<&Value> {
        self.stacks.get(path)?.last()
    }

    pub fn depth(&self, path: &str) -> usize {
        self.stacks.get(path).map_or(0, Vec::len)
    }
}
