//! Discovery of the sub-model instances reachable from a root mapping

use crate::mapping::{MappingId, ModelMapping};
use log::{debug, warn};
use std::collections::{HashMap, HashSet};

/// Registered model instances keyed by their declared path.
///
/// Iteration follows registration order, so after a discovery the root comes first
/// followed by its descendants in depth-first pre-order.
#[derive(Debug, Clone)]
pub struct PathTable<M> {
    entries: Vec<(String, M)>,
    index: HashMap<String, usize>,
}

impl<M> Default for PathTable<M> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<M: ModelMapping> PathTable<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `mapping` under `path`.
    ///
    /// Returns false if the path was already taken; the first registration is kept.
    pub fn insert(&mut self, path: impl Into<String>, mapping: M) -> bool {
        let path = path.into();
        if self.index.contains_key(&path) {
            warn!(
                "Model path '{}' is declared more than once; keeping the first instance",
                path
            );
            return false;
        }
        self.index.insert(path.clone(), self.entries.len());
        self.entries.push((path, mapping));
        true
    }

    pub fn get(&self, path: &str) -> Option<&M> {
        self.index.get(path).map(|&i| &self.entries[i].1)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    /// Registered paths in registration order
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(path, _)| path.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &M)> {
        self.entries.iter().map(|(path, m)| (path.as_str(), m))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }
}

fn child_path<M: ModelMapping>(child: &M) -> String {
    child.path().map(|p| p.into_owned()).unwrap_or_default()
}

/// Register every descendant of `mapping` in `table`, depth first and pre-order.
///
/// `mapping` itself is not registered; the caller inserts it under whatever name it
/// wants before walking.
///
/// The mapping graph must be a tree.
/// A cycle makes this recurse until the stack is exhausted; use [`discover_checked`]
/// when the tables cannot be trusted.
pub fn discover<M: ModelMapping>(mapping: &M, table: &mut PathTable<M>) {
    for child in mapping.children() {
        let path = child_path(&child);
        debug!("Discovered sub-model '{}'", path);
        table.insert(path, child.clone());
        discover(&child, table);
    }
}

/// Same traversal as [`discover`] using an explicit stack and a visited set.
///
/// Mappings that were already visited are skipped with a warning instead of being
/// walked again, so this terminates on any graph.
pub fn discover_checked<M: ModelMapping>(root: &M, table: &mut PathTable<M>) {
    let mut visited: HashSet<MappingId> = HashSet::new();
    visited.insert(root.id());

    // Children are pushed in reverse so they are popped in declaration order
    let mut stack: Vec<M> = root.children().into_iter().rev().collect();
    while let Some(mapping) = stack.pop() {
        let path = child_path(&mapping);
        if !visited.insert(mapping.id()) {
            warn!(
                "Sub-model '{}' was reached more than once; the mapping graph is not a tree",
                path
            );
            continue;
        }
        debug!("Discovered sub-model '{}'", path);
        table.insert(path, mapping.clone());
        stack.extend(mapping.children().into_iter().rev());
    }
}
