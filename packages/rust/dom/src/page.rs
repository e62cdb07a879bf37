//! The page model the outline engine runs against.

use std::collections::HashMap;

use ego_tree::NodeId;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use outlinelens_shared::{OutlineError, Result};

use crate::ids::IdRegistry;
use crate::layout::{self, LayoutBox};
use crate::mutation::MutationRecord;

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// Size of the visible area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 800.0,
        }
    }
}

impl std::str::FromStr for Viewport {
    type Err = OutlineError;

    /// Parse `WIDTHxHEIGHT`, e.g. `1280x800`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (w, h) = s
            .split_once(['x', 'X'])
            .ok_or_else(|| OutlineError::validation(format!("viewport `{s}` is not WxH")))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<f64>()
                .map_err(|_| OutlineError::validation(format!("viewport `{s}` is not WxH")))
        };
        Ok(Self {
            width: parse(w)?,
            height: parse(h)?,
        })
    }
}

/// A box relative to the viewport, like `getBoundingClientRect()`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

// ---------------------------------------------------------------------------
// Page
// ---------------------------------------------------------------------------

/// A parsed document with estimated layout, scroll state and heading ids.
///
/// Node ids are stable for the page's lifetime: mutations append or detach
/// nodes but never renumber existing ones.
pub struct Page {
    pub(crate) html: Html,
    url: Url,
    viewport: Viewport,
    scroll_y: f64,
    pub(crate) boxes: HashMap<NodeId, LayoutBox>,
    ids: IdRegistry,
    pub(crate) mutations: Vec<MutationRecord>,
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("url", &self.url.as_str())
            .field("viewport", &self.viewport)
            .field("scroll_y", &self.scroll_y)
            .field("generated_ids", &self.ids.len())
            .finish()
    }
}

impl Page {
    /// Parse `source` and lay it out for `viewport`.
    #[instrument(skip(source), fields(url = %url, bytes = source.len()))]
    pub fn parse(source: &str, url: Url, viewport: Viewport) -> Result<Self> {
        if !(viewport.width > 0.0 && viewport.height > 0.0) {
            return Err(OutlineError::validation(format!(
                "viewport must be positive, got {}x{}",
                viewport.width, viewport.height
            )));
        }

        let html = Html::parse_document(source);
        let mut page = Self {
            html,
            url,
            viewport,
            scroll_y: 0.0,
            boxes: HashMap::new(),
            ids: IdRegistry::default(),
            mutations: Vec::new(),
        };
        page.relayout();
        debug!(
            doc_height = page.document_height(),
            elements = page.boxes.len(),
            "page parsed"
        );
        Ok(page)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Host of the page URL, empty for host-less URLs.
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    pub(crate) fn relayout(&mut self) {
        self.boxes = layout::compute(&self.html, self.viewport.width);
        self.scroll_y = self.scroll_y.clamp(0.0, self.max_scroll_y());
    }

    // -----------------------------------------------------------------------
    // Tree queries
    // -----------------------------------------------------------------------

    pub fn element(&self, node: NodeId) -> Option<ElementRef<'_>> {
        self.html.tree.get(node).and_then(ElementRef::wrap)
    }

    /// The `<html>` element.
    pub fn document_element(&self) -> NodeId {
        self.html.root_element().id()
    }

    pub fn body(&self) -> Option<NodeId> {
        let root = self.document_element();
        self.html
            .tree
            .get(root)?
            .children()
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == "body")
            .map(|el| el.id())
    }

    /// Lowercase tag name of an element node.
    pub fn tag_name(&self, node: NodeId) -> Option<&str> {
        self.element(node).map(|el| el.value().name())
    }

    /// All attached elements matching `selector`, in document order.
    pub fn select(&self, selector: &Selector) -> Vec<NodeId> {
        self.html
            .root_element()
            .select(selector)
            .map(|el| el.id())
            .collect()
    }

    /// Descendant elements of `root` in document order (excluding `root`).
    pub fn descendant_elements(&self, root: NodeId) -> Vec<NodeId> {
        let Some(node) = self.html.tree.get(root) else {
            return Vec::new();
        };
        node.descendants()
            .skip(1)
            .filter(|n| n.value().is_element())
            .map(|n| n.id())
            .collect()
    }

    /// `node` itself followed by its element ancestors, at most `max` entries.
    pub fn ancestors_inclusive(&self, node: NodeId, max: usize) -> Vec<NodeId> {
        let Some(start) = self.html.tree.get(node) else {
            return Vec::new();
        };
        std::iter::once(start)
            .chain(start.ancestors())
            .filter(|n| n.value().is_element())
            .take(max)
            .map(|n| n.id())
            .collect()
    }

    /// Whether `outer` is `inner` or one of its ancestors.
    pub fn contains(&self, outer: NodeId, inner: NodeId) -> bool {
        if outer == inner {
            return true;
        }
        self.html
            .tree
            .get(inner)
            .is_some_and(|n| n.ancestors().any(|a| a.id() == outer))
    }

    /// Whether the node is still reachable from the document root.
    pub fn is_attached(&self, node: NodeId) -> bool {
        let root = self.html.tree.root().id();
        self.html
            .tree
            .get(node)
            .is_some_and(|n| n.id() == root || n.ancestors().any(|a| a.id() == root))
    }

    /// Number of `<a>` descendants.
    pub fn link_count(&self, node: NodeId) -> usize {
        self.descendant_elements(node)
            .into_iter()
            .filter(|id| self.tag_name(*id) == Some("a"))
            .count()
    }

    /// Visible text with whitespace runs collapsed, trimmed.
    pub fn text_content(&self, node: NodeId) -> String {
        self.element(node)
            .map(|el| {
                el.text()
                    .flat_map(str::split_whitespace)
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default()
    }

    // -----------------------------------------------------------------------
    // Geometry queries
    // -----------------------------------------------------------------------

    fn layout_box(&self, node: NodeId) -> LayoutBox {
        self.boxes.get(&node).copied().unwrap_or_default()
    }

    /// Viewport-relative bounding box.
    pub fn rect(&self, node: NodeId) -> Rect {
        let b = self.layout_box(node);
        Rect {
            left: b.x,
            top: b.y - self.scroll_y,
            width: b.width,
            height: b.height,
        }
    }

    pub fn scroll_width(&self, node: NodeId) -> f64 {
        self.layout_box(node).width
    }

    pub fn scroll_height(&self, node: NodeId) -> f64 {
        self.layout_box(node).scroll_height
    }

    pub fn offset_height(&self, node: NodeId) -> f64 {
        self.layout_box(node).height
    }

    /// Rendered elements have a non-zero height.
    pub fn is_rendered(&self, node: NodeId) -> bool {
        self.offset_height(node) > 0.0
    }

    /// Declares its own scrollable overflow.
    pub fn is_scrollable(&self, node: NodeId) -> bool {
        self.layout_box(node).scrollable
    }

    pub fn document_height(&self) -> f64 {
        self.layout_box(self.document_element()).height
    }

    // -----------------------------------------------------------------------
    // Scrolling
    // -----------------------------------------------------------------------

    pub fn scroll_y(&self) -> f64 {
        self.scroll_y
    }

    pub fn max_scroll_y(&self) -> f64 {
        (self.document_height() - self.viewport.height).max(0.0)
    }

    /// Scroll the document, clamped to its extent. Returns whether it moved.
    pub fn scroll_to(&mut self, y: f64) -> bool {
        let target = y.clamp(0.0, self.max_scroll_y());
        let moved = target != self.scroll_y;
        self.scroll_y = target;
        moved
    }

    /// Align the element's top edge with the viewport top (as far as possible).
    pub fn scroll_into_view(&mut self, node: NodeId) -> bool {
        let top = self.layout_box(node).y;
        self.scroll_to(top)
    }

    // -----------------------------------------------------------------------
    // Heading ids
    // -----------------------------------------------------------------------

    /// The element's own non-empty `id` attribute.
    pub fn attribute_id(&self, node: NodeId) -> Option<&str> {
        self.element(node)
            .and_then(|el| el.value().id())
            .filter(|id| !id.is_empty())
    }

    /// The element's own id, or a generated token registered for it.
    pub fn stable_id(&mut self, node: NodeId) -> String {
        if let Some(id) = self.attribute_id(node) {
            return id.to_string();
        }
        if let Some(token) = self.ids.get(node) {
            return token.to_string();
        }

        let taken: Vec<String> = self
            .descendant_elements(self.document_element())
            .into_iter()
            .filter_map(|n| self.attribute_id(n).map(str::to_string))
            .collect();
        self.ids
            .assign(node, |candidate| taken.iter().any(|id| id == candidate))
    }

    /// Resolve a heading id to an attached element.
    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        if let Some(node) = self.ids.lookup(id).filter(|n| self.is_attached(*n)) {
            return Some(node);
        }
        self.descendant_elements(self.document_element())
            .into_iter()
            .find(|n| self.attribute_id(*n) == Some(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(html: &str) -> Page {
        Page::parse(
            html,
            Url::parse("https://blog.example.com/post").unwrap(),
            Viewport::default(),
        )
        .unwrap()
    }

    fn first(page: &Page, sel: &str) -> NodeId {
        page.select(&Selector::parse(sel).unwrap())[0]
    }

    #[test]
    fn viewport_parses_from_str() {
        let vp: Viewport = "1024x768".parse().unwrap();
        assert_eq!(vp.width, 1024.0);
        assert_eq!(vp.height, 768.0);
        assert!("1024".parse::<Viewport>().is_err());
    }

    #[test]
    fn rejects_empty_viewport() {
        let result = Page::parse(
            "<p>x</p>",
            Url::parse("https://example.com").unwrap(),
            Viewport {
                width: 0.0,
                height: 600.0,
            },
        );
        assert!(result.is_err());
    }

    #[test]
    fn rect_is_viewport_relative() {
        let body = "<p>line</p>".repeat(100);
        let mut page = page(&format!("<body>{body}<h2 id='end'>End</h2></body>"));
        let end = first(&page, "#end");
        assert_eq!(page.rect(end).top, 2000.0);

        assert!(page.scroll_to(1000.0));
        assert_eq!(page.rect(end).top, 1000.0);

        page.scroll_into_view(end);
        // Clamped: the document is 2032px tall with an 800px viewport.
        assert_eq!(page.scroll_y(), 1232.0);
    }

    #[test]
    fn tree_queries() {
        let page = page(
            "<body><div id='wrap'><p>Read <a href='#'>one</a> and <a href='#'>two</a></p></div></body>",
        );
        let wrap = first(&page, "#wrap");
        let p = first(&page, "p");
        assert!(page.contains(wrap, p));
        assert!(!page.contains(p, wrap));
        assert_eq!(page.link_count(wrap), 2);
        assert_eq!(page.text_content(p), "Read one and two");
        assert_eq!(page.ancestors_inclusive(p, 3).len(), 3);
        assert_eq!(page.tag_name(page.body().unwrap()), Some("body"));
    }

    #[test]
    fn stable_ids_prefer_existing_attribute() {
        let mut page = page("<body><h2 id='setup'>Setup</h2><h2>Usage</h2></body>");
        let heads = page.select(&Selector::parse("h2").unwrap());

        assert_eq!(page.stable_id(heads[0]), "setup");
        let generated = page.stable_id(heads[1]);
        assert!(generated.starts_with("heading-"));
        assert_eq!(page.stable_id(heads[1]), generated);

        assert_eq!(page.element_by_id("setup"), Some(heads[0]));
        assert_eq!(page.element_by_id(&generated), Some(heads[1]));
        assert_eq!(page.element_by_id("missing"), None);
    }
}
