//! Core domain types for page outlines.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Highest heading level an outline item may carry.
pub const MAX_LEVEL: u8 = 6;

// ---------------------------------------------------------------------------
// HeadingItem
// ---------------------------------------------------------------------------

/// A single heading occurrence on the page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HeadingItem {
    /// DOM-stable identifier (the element's own id, or a generated token).
    pub id: String,
    /// Trimmed visible text. Never empty.
    pub text: String,
    /// Rank, 1 = most significant.
    pub level: u8,
}

impl HeadingItem {
    pub fn new(id: impl Into<String>, text: impl Into<String>, level: u8) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            level: level.clamp(1, MAX_LEVEL),
        }
    }
}

// ---------------------------------------------------------------------------
// Outline
// ---------------------------------------------------------------------------

/// Ordered heading occurrences in document order.
///
/// Levels need not be contiguous or start at 1.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Outline(pub Vec<HeadingItem>);

impl Outline {
    pub fn new(items: Vec<HeadingItem>) -> Self {
        Self(items)
    }

    pub fn items(&self) -> &[HeadingItem] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, HeadingItem> {
        self.0.iter()
    }

    /// Find an item by heading id.
    pub fn get(&self, id: &str) -> Option<&HeadingItem> {
        self.0.iter().find(|item| item.id == id)
    }

    /// SHA-256 of the JSON serialization, used for structural change detection.
    pub fn signature(&self) -> String {
        let json = serde_json::to_string(&self.0).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

impl From<Vec<HeadingItem>> for Outline {
    fn from(items: Vec<HeadingItem>) -> Self {
        Self(items)
    }
}

impl IntoIterator for Outline {
    type Item = HeadingItem;
    type IntoIter = std::vec::IntoIter<HeadingItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Outline {
    type Item = &'a HeadingItem;
    type IntoIter = std::slice::Iter<'a, HeadingItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ---------------------------------------------------------------------------
// OutlineNode
// ---------------------------------------------------------------------------

/// A heading with its nested sub-headings. Derived view, rebuilt on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutlineNode {
    #[serde(flatten)]
    pub item: HeadingItem,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<OutlineNode>,
}

impl OutlineNode {
    pub fn leaf(item: HeadingItem) -> Self {
        Self {
            item,
            children: Vec::new(),
        }
    }
}

/// Tree view of an outline alongside the flat, document-ordered list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OutlineTree {
    pub tree: Vec<OutlineNode>,
    pub flat: Vec<HeadingItem>,
}

// ---------------------------------------------------------------------------
// SpecialPageInfo
// ---------------------------------------------------------------------------

/// Classification of a URL that cannot be outlined (browser internals, etc.).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialPageInfo {
    #[serde(rename = "type")]
    pub page_type: String,
    pub message: String,
}
