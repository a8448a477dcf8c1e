//! Property lists.
//!
//! On the wire a property list is a flat sequence of dotted string keys with
//! string values. In the API it is a tree: branches are nested maps, leaves
//! are strings. A leaf and a branch may coexist under the same logical name;
//! the leaf is then stored under the sibling key `@<name>` and the `@` is
//! stripped again when the tree is flattened for transmission.

use std::collections::BTreeMap;

/// One node of a property tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropEntry {
    /// A string leaf.
    Value(String),
    /// A nested subtree.
    Tree(Props),
}

/// A tree of string-keyed properties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Props {
    entries: BTreeMap<String, PropEntry>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of direct entries at this level.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Direct entries at this level, in key order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &PropEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Set a value at a dotted path, creating intermediate subtrees.
    ///
    /// When the path crosses an existing leaf, or lands on an existing
    /// subtree, the leaf moves to its `@`-escaped sibling so both survive.
    pub fn set(&mut self, path: &str, value: impl Into<String>) {
        let value = value.into();
        let mut parts = path.split('.').peekable();
        let mut node = self;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                match node.entries.get(part) {
                    Some(PropEntry::Tree(_)) => {
                        node.entries
                            .insert(format!("@{part}"), PropEntry::Value(value));
                    }
                    _ => {
                        node.entries.insert(part.to_string(), PropEntry::Value(value));
                    }
                }
                return;
            }
            // Intermediate step: make sure a subtree exists at `part`,
            // displacing any leaf to its @-sibling.
            if let Some(PropEntry::Value(existing)) = node.entries.get(part) {
                let existing = existing.clone();
                node.entries
                    .insert(format!("@{part}"), PropEntry::Value(existing));
                node.entries
                    .insert(part.to_string(), PropEntry::Tree(Props::new()));
            }
            node = match node
                .entries
                .entry(part.to_string())
                .or_insert_with(|| PropEntry::Tree(Props::new()))
            {
                PropEntry::Tree(tree) => tree,
                // Unreachable: any leaf at `part` was displaced above.
                PropEntry::Value(_) => unreachable!("leaf displaced before descent"),
            };
        }
    }

    /// Look up a value at a dotted path.
    ///
    /// When a subtree shadows the leaf, the `@`-escaped sibling is consulted.
    pub fn get(&self, path: &str) -> Option<&str> {
        let mut parts = path.split('.').peekable();
        let mut node = self;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                return match node.entries.get(part) {
                    Some(PropEntry::Value(value)) => Some(value),
                    _ => match node.entries.get(&format!("@{part}")) {
                        Some(PropEntry::Value(value)) => Some(value),
                        _ => None,
                    },
                };
            }
            node = match node.entries.get(part) {
                Some(PropEntry::Tree(tree)) => tree,
                _ => return None,
            };
        }
        None
    }

    /// Flatten to dotted-key entries for transmission.
    ///
    /// `@`-escaped keys are emitted under their logical name.
    pub fn deflate(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        self.deflate_into("", &mut out);
        out
    }

    fn deflate_into(&self, prefix: &str, out: &mut Vec<(String, String)>) {
        for (key, entry) in &self.entries {
            let logical = key.strip_prefix('@').unwrap_or(key);
            let path = if prefix.is_empty() {
                logical.to_string()
            } else {
                format!("{prefix}.{logical}")
            };
            match entry {
                PropEntry::Value(value) => out.push((path, value.clone())),
                PropEntry::Tree(tree) => tree.deflate_into(&path, out),
            }
        }
    }

    /// Rebuild a tree from flat dotted-key entries.
    pub fn inflate<I, K, V>(entries: I) -> Props
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut props = Props::new();
        for (key, value) in entries {
            props.set(key.as_ref(), value);
        }
        props
    }
}
