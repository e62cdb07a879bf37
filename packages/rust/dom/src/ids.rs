//! Weak association between elements and generated heading ids.
//!
//! Generated ids are never written into the document: the page's own scripts
//! may rewrite the element at any time. The registry maps runtime tokens to
//! node ids instead, for the lifetime of the page.

use std::collections::HashMap;

use ego_tree::NodeId;
use uuid::Uuid;

/// Prefix of every generated heading id.
pub const GENERATED_ID_PREFIX: &str = "heading-";

const TOKEN_LEN: usize = 9;

#[derive(Debug, Default)]
pub(crate) struct IdRegistry {
    by_node: HashMap<NodeId, String>,
    by_token: HashMap<String, NodeId>,
}

impl IdRegistry {
    pub(crate) fn get(&self, node: NodeId) -> Option<&str> {
        self.by_node.get(&node).map(String::as_str)
    }

    pub(crate) fn lookup(&self, token: &str) -> Option<NodeId> {
        self.by_token.get(token).copied()
    }

    /// Assign a fresh token to `node`. `taken` reports ids already present in the document.
    pub(crate) fn assign(&mut self, node: NodeId, taken: impl Fn(&str) -> bool) -> String {
        if let Some(existing) = self.by_node.get(&node) {
            return existing.clone();
        }

        let token = loop {
            let candidate = generate_token();
            if !self.by_token.contains_key(&candidate) && !taken(&candidate) {
                break candidate;
            }
        };

        self.by_node.insert(node, token.clone());
        self.by_token.insert(token.clone(), node);
        token
    }

    pub(crate) fn len(&self) -> usize {
        self.by_node.len()
    }
}

/// `heading-` followed by nine lowercase alphanumerics from the random tail of a UUID v7.
fn generate_token() -> String {
    let simple = Uuid::now_v7().simple().to_string();
    let tail = &simple[simple.len() - TOKEN_LEN..];
    format!("{GENERATED_ID_PREFIX}{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ego_tree::Tree;

    #[test]
    fn token_shape() {
        let token = generate_token();
        assert!(token.starts_with(GENERATED_ID_PREFIX));
        let tail = &token[GENERATED_ID_PREFIX.len()..];
        assert_eq!(tail.len(), TOKEN_LEN);
        assert!(tail.chars().all(|c| c.is_ascii_alphanumeric() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn assignment_is_sticky_and_unique() {
        let mut tree = Tree::new(0);
        let a = tree.root_mut().append(1).id();
        let b = tree.root_mut().append(2).id();

        let mut registry = IdRegistry::default();
        let first = registry.assign(a, |_| false);
        assert_eq!(registry.assign(a, |_| false), first);

        let second = registry.assign(b, |_| false);
        assert_ne!(first, second);
        assert_eq!(registry.lookup(&second), Some(b));
        assert_eq!(registry.get(a), Some(first.as_str()));
        assert_eq!(registry.len(), 2);
    }
}
