//! DOM mutations and the records they leave behind.
//!
//! Every mutation relayouts the page and queues a [`MutationRecord`], the
//! way a `MutationObserver` would see it. Observers drain the queue with
//! [`Page::take_mutations`].

use ego_tree::{NodeId, NodeMut, NodeRef};
use scraper::{Html, Node};
use tracing::trace;

use outlinelens_shared::{OutlineError, Result};

use crate::page::Page;

/// What kind of change a mutation made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    /// Children were added or removed.
    ChildList,
    /// An attribute changed.
    Attributes,
    /// Text content changed in place.
    CharacterData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationRecord {
    pub kind: MutationKind,
    pub target: NodeId,
}

impl Page {
    /// Drain the queued mutation records.
    pub fn take_mutations(&mut self) -> Vec<MutationRecord> {
        std::mem::take(&mut self.mutations)
    }

    fn record(&mut self, kind: MutationKind, target: NodeId) {
        trace!(?kind, ?target, "mutation");
        self.mutations.push(MutationRecord { kind, target });
        self.relayout();
    }

    /// Parse `fragment` and append its nodes to `parent`. Returns the new top-level node ids.
    pub fn append_html(&mut self, parent: NodeId, fragment: &str) -> Result<Vec<NodeId>> {
        if self.element(parent).is_none() {
            return Err(OutlineError::validation("append target is not an element"));
        }

        let parsed = Html::parse_fragment(fragment);
        let wrapper = parsed.root_element();
        let mut added = Vec::new();
        {
            let mut target = self
                .html
                .tree
                .get_mut(parent)
                .ok_or_else(|| OutlineError::validation("append target is gone"))?;
            for child in wrapper.children() {
                let mut copy = target.append(child.value().clone());
                added.push(copy.id());
                copy_children(child, &mut copy);
            }
        }

        self.record(MutationKind::ChildList, parent);
        Ok(added)
    }

    /// Detach `node` from the document. Its id stays valid but unattached.
    pub fn remove(&mut self, node: NodeId) -> Result<()> {
        let parent = self
            .html
            .tree
            .get(node)
            .and_then(|n| n.parent())
            .map(|p| p.id())
            .ok_or_else(|| OutlineError::validation("node has no parent"))?;

        if let Some(mut n) = self.html.tree.get_mut(node) {
            n.detach();
        }
        self.record(MutationKind::ChildList, parent);
        Ok(())
    }

    /// Replace the children of an element with a single text node, like
    /// assigning `textContent`. Observers see a child-list change.
    pub fn set_text(&mut self, node: NodeId, text: &str) -> Result<()> {
        if self.element(node).is_none() {
            return Err(OutlineError::validation("text target is not an element"));
        }

        let text_node = parse_text(text);

        let children: Vec<NodeId> = self
            .html
            .tree
            .get(node)
            .map(|n| n.children().map(|c| c.id()).collect())
            .unwrap_or_default();
        for child in children {
            if let Some(mut c) = self.html.tree.get_mut(child) {
                c.detach();
            }
        }
        if let (Some(value), Some(mut target)) = (text_node, self.html.tree.get_mut(node)) {
            target.append(value);
        }

        self.record(MutationKind::ChildList, node);
        Ok(())
    }

    /// Rewrite a text node in place. Empty data is rejected; clear the
    /// parent with [`Page::set_text`] instead.
    pub fn set_data(&mut self, text_node: NodeId, data: &str) -> Result<()> {
        let is_text = self
            .html
            .tree
            .get(text_node)
            .is_some_and(|n| n.value().is_text());
        if !is_text {
            return Err(OutlineError::validation("data target is not a text node"));
        }

        let replacement = parse_text(data)
            .ok_or_else(|| OutlineError::validation("text node data cannot be empty"))?;
        if let Some(mut target) = self.html.tree.get_mut(text_node) {
            *target.value() = replacement;
        }
        self.record(MutationKind::CharacterData, text_node);
        Ok(())
    }

    /// Set (or replace) an attribute on an element.
    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<()> {
        let el = self
            .element(node)
            .ok_or_else(|| OutlineError::validation("attribute target is not an element"))?;
        let tag = el.value().name().to_string();

        // Rebuild the element through the parser so attribute bookkeeping stays consistent.
        let mut markup = format!("<{tag}");
        for (attr, val) in el.value().attrs().filter(|(attr, _)| *attr != name) {
            markup.push_str(&format!(r#" {attr}="{}""#, escape_attr(val)));
        }
        markup.push_str(&format!(r#" {name}="{}"></{tag}>"#, escape_attr(value)));

        let parsed = Html::parse_fragment(&markup);
        let replacement = parsed
            .root_element()
            .children()
            .find(|c| matches!(c.value(), Node::Element(e) if e.name() == tag))
            .map(|c| c.value().clone())
            .ok_or_else(|| OutlineError::parse(format!("cannot rebuild <{tag}> in a fragment")))?;

        if let Some(mut target) = self.html.tree.get_mut(node) {
            *target.value() = replacement;
        }
        self.record(MutationKind::Attributes, node);
        Ok(())
    }
}

fn copy_children(source: NodeRef<'_, Node>, dest: &mut NodeMut<'_, Node>) {
    for child in source.children() {
        let mut copy = dest.append(child.value().clone());
        copy_children(child, &mut copy);
    }
}

/// A detached text node holding `text`, or `None` when `text` is empty.
fn parse_text(text: &str) -> Option<Node> {
    let parsed = Html::parse_fragment(&escape_text(text));
    parsed
        .root_element()
        .children()
        .find(|c| c.value().is_text())
        .map(|c| c.value().clone())
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}
