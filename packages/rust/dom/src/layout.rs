//! Layout estimation for parsed documents.
//!
//! There is no rendering engine behind a [`Page`](crate::Page), so geometry is
//! estimated with a simple block/inline flow: blocks stack vertically and span
//! their container, inline elements advance along the current line at a fixed
//! character width and wrap at the container edge. Fixtures can pin any box
//! with `data-left`, `data-top`, `data-width` and `data-height` (pixels).

use std::collections::HashMap;
use std::sync::LazyLock;

use ego_tree::NodeId;
use regex::Regex;
use scraper::{ElementRef, Html};

/// Average glyph advance.
pub const CHAR_WIDTH: f64 = 8.0;

/// Height of one line of body text.
pub const LINE_HEIGHT: f64 = 20.0;

const INLINE_TAGS: &[&str] = &[
    "a", "abbr", "b", "bdi", "cite", "code", "em", "i", "img", "kbd", "label", "mark", "q", "s",
    "samp", "small", "span", "strong", "sub", "sup", "time", "u", "var",
];

const NON_RENDERED_TAGS: &[&str] = &[
    "base", "head", "link", "meta", "noscript", "script", "style", "template", "title",
];

/// Estimated geometry of one element, in document coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LayoutBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Height of the content, which exceeds `height` when it overflows.
    pub scroll_height: f64,
    /// Declares `overflow`/`overflow-y` as `auto` or `scroll`.
    pub scrollable: bool,
}

/// Lay out the whole document for a viewport of the given width.
pub(crate) fn compute(html: &Html, viewport_width: f64) -> HashMap<NodeId, LayoutBox> {
    let mut boxes = HashMap::new();
    layout_block(html.root_element(), 0.0, 0.0, viewport_width, &mut boxes);
    boxes
}

fn line_height(tag: &str) -> f64 {
    match tag {
        "h1" => 40.0,
        "h2" => 32.0,
        "h3" => 28.0,
        "h4" => 24.0,
        _ => LINE_HEIGHT,
    }
}

/// Whether an element generates no box at all.
pub(crate) fn is_hidden(el: ElementRef<'_>) -> bool {
    static DISPLAY_NONE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)display\s*:\s*none").expect("valid regex"));

    let element = el.value();
    NON_RENDERED_TAGS.contains(&element.name())
        || element.attr("hidden").is_some()
        || element
            .attr("style")
            .is_some_and(|style| DISPLAY_NONE_RE.is_match(style))
}

fn declares_scroll(el: ElementRef<'_>) -> bool {
    static OVERFLOW_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)overflow(-y)?\s*:\s*(auto|scroll)").expect("valid regex")
    });

    el.value()
        .attr("style")
        .is_some_and(|style| OVERFLOW_RE.is_match(style))
}

#[derive(Debug, Default)]
struct Overrides {
    left: Option<f64>,
    top: Option<f64>,
    width: Option<f64>,
    height: Option<f64>,
}

impl Overrides {
    fn read(el: ElementRef<'_>) -> Self {
        let px = |name: &str| {
            el.value()
                .attr(name)
                .and_then(|v| v.trim().trim_end_matches("px").parse::<f64>().ok())
        };
        Self {
            left: px("data-left"),
            top: px("data-top"),
            width: px("data-width"),
            height: px("data-height"),
        }
    }
}

/// The line currently being filled inside a block.
struct Line {
    left: f64,
    width: f64,
    y: f64,
    cursor: f64,
    height: f64,
    has_content: bool,
}

impl Line {
    fn advance(&mut self, px: f64) {
        self.cursor += px;
        self.has_content = true;
        while self.width > 0.0 && self.cursor > self.width {
            self.cursor -= self.width;
            self.y += self.height;
        }
    }

    /// Close the line if anything was placed on it.
    fn flush(&mut self) {
        if self.has_content {
            self.y += self.height;
        }
        self.cursor = 0.0;
        self.has_content = false;
    }

    fn break_line(&mut self) {
        self.y += self.height;
        self.cursor = 0.0;
        self.has_content = false;
    }
}

/// Characters a text node contributes once whitespace is collapsed.
fn visible_chars(text: &str, at_line_start: bool) -> usize {
    let mut count = 0;
    let mut prev_space = at_line_start;
    for c in text.chars() {
        if c.is_whitespace() {
            if !prev_space {
                count += 1;
                prev_space = true;
            }
        } else {
            count += 1;
            prev_space = false;
        }
    }
    count
}

fn layout_block(
    el: ElementRef<'_>,
    x: f64,
    y: f64,
    width: f64,
    boxes: &mut HashMap<NodeId, LayoutBox>,
) -> f64 {
    if is_hidden(el) {
        return 0.0;
    }

    let ov = Overrides::read(el);
    let left = ov.left.unwrap_or(x);
    let top = ov.top.unwrap_or(y);
    let width = ov.width.unwrap_or(width);

    let mut line = Line {
        left,
        width,
        y: top,
        cursor: 0.0,
        height: line_height(el.value().name()),
        has_content: false,
    };
    flow_children(el, &mut line, boxes);
    line.flush();

    let content = line.y - top;
    let height = ov.height.unwrap_or(content);
    boxes.insert(
        el.id(),
        LayoutBox {
            x: left,
            y: top,
            width,
            height,
            scroll_height: content.max(height),
            scrollable: declares_scroll(el),
        },
    );
    height
}

fn layout_inline(el: ElementRef<'_>, line: &mut Line, boxes: &mut HashMap<NodeId, LayoutBox>) {
    let ov = Overrides::read(el);
    let start_x = line.left + line.cursor;
    let start_y = line.y;

    flow_children(el, line, boxes);

    let (x, width, height) = if line.y == start_y {
        (start_x, line.left + line.cursor - start_x, line.height)
    } else {
        // Wrapped: the bounding box spans the container.
        (line.left, line.width, line.y - start_y + line.height)
    };
    let height = ov.height.unwrap_or(height);
    boxes.insert(
        el.id(),
        LayoutBox {
            x: ov.left.unwrap_or(x),
            y: ov.top.unwrap_or(start_y),
            width: ov.width.unwrap_or(width),
            height,
            scroll_height: height,
            scrollable: false,
        },
    );
}

fn flow_children(el: ElementRef<'_>, line: &mut Line, boxes: &mut HashMap<NodeId, LayoutBox>) {
    for child in el.children() {
        if let Some(text) = child.value().as_text() {
            let chars = visible_chars(text, line.cursor == 0.0);
            if chars > 0 {
                line.advance(chars as f64 * CHAR_WIDTH);
            }
            continue;
        }

        let Some(child_el) = ElementRef::wrap(child) else {
            continue;
        };
        if is_hidden(child_el) {
            continue;
        }

        let tag = child_el.value().name();
        if tag == "br" {
            line.break_line();
        } else if INLINE_TAGS.contains(&tag) {
            layout_inline(child_el, line, boxes);
        } else {
            line.flush();
            let height = layout_block(child_el, line.left, line.y, line.width, boxes);
            line.y += height;
        }
    }
}
