//! Purpose: Maintain forward/reverse alias tables and rewrite paths through them.
//! Exports: `AliasTable`.
//! Role: Symlink layer consulted before every tree access and during notification fan-out.
//! Invariants: Forward keys are stored with their parent dereferenced and leaf kept verbatim.
//! Invariants: Targets are always fully dereferenced when recorded.
//! Invariants: Dereferencing fails with `AliasCycle` instead of looping forever.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::core::error::{Error, ErrorKind};
use crate::core::path::{is_within, parse_path};

#[derive(Clone, Debug, Default)]
pub struct AliasTable {
    forward: HashMap<String, String>,
    reverse: HashMap<String, Vec<String>>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_alias(&self, path: &str) -> bool {
        self.forward.contains_key(path)
    }

    pub fn target_of(&self, alias: &str) -> Option<&str> {
        self.forward.get(alias).map(String::as_str)
    }

    /// Aliases recorded directly against `target` (no ancestor expansion).
    pub fn aliases_of(&self, target: &str) -> &[String] {
        self.reverse.get(target).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Register `alias` as another name for `target`. Returns the stored alias key.
    pub fn link(&mut self, target: &str, alias: &str) -> Result<String, Error> {
        let target = self.dereference(target)?;
        let alias = self.materialize(alias)?;

        let previous = self.forward.insert(alias.clone(), target.clone());
        if let Err(err) = self.dereference(&alias) {
            match previous {
                Some(previous) => self.forward.insert(alias, previous),
                None => self.forward.remove(&alias),
            };
            return Err(err);
        }
        if let Some(previous) = previous {
            self.forget_referrer(&previous, &alias);
        }
        let referrers = self.reverse.entry(target.clone()).or_default();
        if !referrers.contains(&alias) {
            referrers.push(alias.clone());
        }
        debug!(alias = %alias, target = %target, "linked alias");
        Ok(alias)
    }

    /// Drop a single alias entry. Returns the target it pointed at.
    pub fn unlink(&mut self, alias: &str) -> Option<String> {
        let target = self.forward.remove(alias)?;
        self.forget_referrer(&target, alias);
        Some(target)
    }

    /// Drop every alias whose target is `path` or lies beneath it.
    pub fn unlink_targets_under(&mut self, path: &str) -> Vec<String> {
        let targets: Vec<String> = self
            .reverse
            .keys()
            .filter(|target| is_within(target, path))
            .cloned()
            .collect();

        let mut dropped = Vec::new();
        for target in targets {
            let Some(referrers) = self.reverse.remove(&target) else {
                continue;
            };
            for alias in referrers {
                if self.forward.get(&alias) == Some(&target) {
                    self.forward.remove(&alias);
                    dropped.push(alias);
                }
            }
        }
        dropped
    }

    /// Rewrite `path` until none of its prefixes (including itself) is an alias.
    pub fn dereference(&self, path: &str) -> Result<String, Error> {
        if self.forward.is_empty() {
            return Ok(path.to_string());
        }

        let mut current = path.to_string();
        let mut visited: HashSet<String> = HashSet::new();
        'rewrite: loop {
            let nodes = parse_path(&current)?;
            for node in &nodes {
                let Some(target) = self.forward.get(&node.path) else {
                    continue;
                };
                if !visited.insert(node.path.clone()) {
                    return Err(Error::new(ErrorKind::AliasCycle)
                        .with_message(format!("alias `{}` leads back to itself", node.path))
                        .with_state_path(path));
                }
                current = format!("{target}{}", &current[node.path.len()..]);
                continue 'rewrite;
            }
            return Ok(current);
        }
    }

    /// Dereference only the parent of `path`; the leaf token is kept as written.
    pub fn materialize(&self, path: &str) -> Result<String, Error> {
        let nodes = parse_path(path)?;
        let Some(leaf) = nodes.last() else {
            return Ok(path.to_string());
        };
        match &leaf.parent_path {
            Some(parent) => Ok(format!("{}{}", self.dereference(parent)?, leaf.token())),
            None => Ok(path.to_string()),
        }
    }

    /// Every alias path that resolves to `path`, directly or through an aliased ancestor.
    pub fn reverse_aliases_of(&self, path: &str) -> Vec<String> {
        if self.reverse.is_empty() {
            return Vec::new();
        }
        let mut expanding = HashSet::new();
        self.reverse_of(path, &mut expanding)
    }

    fn reverse_of(&self, path: &str, expanding: &mut HashSet<String>) -> Vec<String> {
        let Ok(nodes) = parse_path(path) else {
            return Vec::new();
        };
        if nodes.len() < 2 || !expanding.insert(path.to_string()) {
            return Vec::new();
        }

        let mut aliases: Vec<String> = self.aliases_of(path).to_vec();
        let mut resolved = Vec::new();
        for alias in &aliases {
            self.push_parent_aliases(alias, expanding, &mut resolved);
        }
        self.push_parent_aliases(path, expanding, &mut resolved);
        aliases.extend(resolved);

        expanding.remove(path);
        aliases
    }

    fn push_parent_aliases(
        &self,
        path: &str,
        expanding: &mut HashSet<String>,
        out: &mut Vec<String>,
    ) {
        let Ok(nodes) = parse_path(path) else {
            return;
        };
        let Some(leaf) = nodes.last() else {
            return;
        };
        let Some(parent) = &leaf.parent_path else {
            return;
        };
        for alias in self.reverse_of(parent, expanding) {
            out.push(format!("{alias}{}", leaf.token()));
        }
    }

    fn forget_referrer(&mut self, target: &str, alias: &str) {
        if let Some(referrers) = self.reverse.get_mut(target) {
            referrers.retain(|referrer| referrer != alias);
            if referrers.is_empty() {
                self.reverse.remove(target);
            }
        }
    }
}
