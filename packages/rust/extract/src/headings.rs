//! Heading Extractor: infer a page's heading vocabulary and collect headings.

use std::collections::HashMap;

use tracing::{debug, instrument};

use outlinelens_dom::{NodeId, Page};
use outlinelens_shared::{HeadingItem, Outline, OutlineError, Result};

use crate::align::aligned_column;
use crate::weights::{HEADING_TAGS, HeadingTag, SEMANTIC_HEADINGS, is_emphasis};

/// At most this many tags make up a vocabulary.
const MAX_VOCABULARY: usize = 3;

/// Groups scoring below this are too sparse to structure a page.
const MIN_GROUP_SCORE: f64 = 10.0;

/// Emphasis further right of the article's left edge than this is inline text.
const EMPHASIS_INDENT_LIMIT: f64 = 100.0;

/// One candidate tag and its occurrences inside the article.
#[derive(Debug, Clone)]
pub struct TagGroup {
    pub tag: &'static str,
    pub nodes: Vec<NodeId>,
    pub score: f64,
}

/// Score each candidate tag by how heading-like its occurrences look.
///
/// Groups come back in [`HEADING_TAGS`] order; tags with no usable
/// occurrences are dropped.
pub fn tag_groups(page: &Page, root: NodeId) -> Vec<TagGroup> {
    let descendants = page.descendant_elements(root);
    let root_left = page.rect(root).left;

    HEADING_TAGS
        .iter()
        .filter_map(|candidate: &HeadingTag| {
            let tag = candidate.tag;
            let mut nodes: Vec<NodeId> = descendants
                .iter()
                .copied()
                .filter(|n| page.tag_name(*n) == Some(tag))
                .collect();

            if is_emphasis(tag) {
                nodes = aligned_column(page, &nodes, root_left + EMPHASIS_INDENT_LIMIT);
            }
            if nodes.is_empty() {
                return None;
            }

            // Mostly hidden occurrences mean the tag is not structural here.
            let rendered = nodes.iter().filter(|n| page.is_rendered(**n)).count();
            if rendered * 2 < nodes.len() {
                return None;
            }

            let score = candidate.weight * nodes.len() as f64;
            (score >= MIN_GROUP_SCORE).then_some(TagGroup { tag, nodes, score })
        })
        .collect()
}

/// Pick the vocabulary: the highest-scoring groups, returned in table order so
/// the index is the heading level minus one.
pub fn vocabulary(mut groups: Vec<TagGroup>) -> Vec<TagGroup> {
    let rank = |tag: &str| HEADING_TAGS.iter().position(|t| t.tag == tag);
    groups.sort_by(|a, b| b.score.total_cmp(&a.score));
    groups.truncate(MAX_VOCABULARY);
    groups.sort_by_key(|g| rank(g.tag));
    groups
}

/// Collect headings inside `root` in document order.
#[instrument(skip_all)]
pub fn extract_headings(page: &mut Page, root: NodeId) -> Result<Outline> {
    if page.element(root).is_none() {
        return Err(OutlineError::Extraction(
            "article root is not an element".into(),
        ));
    }

    let vocab = vocabulary(tag_groups(page, root));
    debug!(
        vocabulary = ?vocab.iter().map(|g| g.tag).collect::<Vec<_>>(),
        "heading vocabulary"
    );

    let mut level_of: HashMap<NodeId, u8> = HashMap::new();
    for (index, group) in vocab.iter().enumerate() {
        for node in &group.nodes {
            level_of.insert(*node, index as u8 + 1);
        }
    }

    let mut items = Vec::new();
    for node in page.descendant_elements(root) {
        let Some(level) = level_of.get(&node).copied() else {
            continue;
        };
        if !page.is_rendered(node) {
            continue;
        }
        let text = page.text_content(node);
        if text.is_empty() {
            continue;
        }
        let id = page.stable_id(node);
        items.push(HeadingItem::new(id, text, level));
    }

    Ok(Outline::from(items))
}

/// Every semantic `h1`..`h6` on the page, level taken from the tag.
#[instrument(skip_all)]
pub fn collect_semantic_headings(page: &mut Page) -> Outline {
    let nodes = page.select(&SEMANTIC_HEADINGS);
    let mut items = Vec::new();
    for node in nodes {
        let text = page.text_content(node);
        if text.is_empty() {
            continue;
        }
        let level = page
            .tag_name(node)
            .and_then(|tag| tag.strip_prefix('h'))
            .and_then(|digit| digit.parse::<u8>().ok())
            .unwrap_or(1);
        let id = page.stable_id(node);
        items.push(HeadingItem::new(id, text, level));
    }
    debug!(count = items.len(), "semantic headings");
    Outline::from(items)
}
