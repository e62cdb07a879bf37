//! Outline tree builder.
//!
//! Nests a flat, document-ordered [`Outline`] into the tree the panel renders,
//! and filters that tree for the panel's search box.

use tracing::{debug, instrument};

use outlinelens_shared::{HeadingItem, Outline, OutlineNode, OutlineTree};

/// Build the nested view of an outline.
///
/// Each item closes every open ancestor whose level is at least its own, then
/// becomes a child of whatever is left on top, or a new root. Level gaps are
/// tolerated: an `h2` directly after a lone `h4` still becomes a root sibling.
#[instrument(skip_all, fields(items = outline.len()))]
pub fn build_outline_tree(outline: &Outline) -> OutlineTree {
    let mut roots: Vec<OutlineNode> = Vec::new();
    // Open ancestors, innermost last.
    let mut stack: Vec<OutlineNode> = Vec::new();

    for item in outline {
        while stack.last().is_some_and(|open| open.item.level >= item.level) {
            close_top(&mut stack, &mut roots);
        }
        stack.push(OutlineNode::leaf(item.clone()));
    }
    while !stack.is_empty() {
        close_top(&mut stack, &mut roots);
    }

    debug!(roots = roots.len(), "outline tree built");
    OutlineTree {
        tree: roots,
        flat: outline.items().to_vec(),
    }
}

/// Pop the innermost open node and attach it to its parent (or the roots).
fn close_top(stack: &mut Vec<OutlineNode>, roots: &mut Vec<OutlineNode>) {
    let Some(node) = stack.pop() else {
        return;
    };
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => roots.push(node),
    }
}

/// Keep nodes whose text contains `query` (case-insensitive), plus the
/// ancestors of any match. A blank query keeps everything.
pub fn filter_tree(nodes: &[OutlineNode], query: &str) -> Vec<OutlineNode> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return nodes.to_vec();
    }
    filter_nodes(nodes, &needle)
}

fn filter_nodes(nodes: &[OutlineNode], needle: &str) -> Vec<OutlineNode> {
    nodes
        .iter()
        .filter_map(|node| {
            let children = filter_nodes(&node.children, needle);
            let matches = node.item.text.to_lowercase().contains(needle);
            (matches || !children.is_empty()).then(|| OutlineNode {
                item: node.item.clone(),
                children,
            })
        })
        .collect()
}

/// Depth-first flattening, the inverse of [`build_outline_tree`].
pub fn flatten(nodes: &[OutlineNode]) -> Vec<HeadingItem> {
    let mut out = Vec::new();
    for node in nodes {
        out.push(node.item.clone());
        out.extend(flatten(&node.children));
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
