//! Declarative scoring tables.
//!
//! Kept as data so the heuristics can be tuned and tested without touching
//! the algorithms that consume them.

use std::sync::LazyLock;

use scraper::Selector;

/// Heading contribution by ancestor distance, before per-tag scaling.
/// Distance 0 is the element itself.
const HEADING_BASE: [f64; 8] = [0.0, 100.0, 60.0, 40.0, 30.0, 25.0, 22.0, 18.0];

const ARTICLE_BONUS: [f64; 1] = [500.0];
const CONTENT_BONUS: [f64; 1] = [101.0];
const CHROME_PENALTY: [f64; 3] = [-500.0, -100.0, -50.0];

/// A selector and the weight it adds to each ancestor distance.
#[derive(Debug)]
pub struct ArticlePattern {
    pub pattern: &'static str,
    pub selector: Selector,
    pub weights: Vec<f64>,
    /// Matches must form an aligned column to count.
    pub needs_alignment: bool,
}

fn scaled(factor: f64) -> Vec<f64> {
    HEADING_BASE.iter().map(|w| w * factor).collect()
}

fn pattern(pattern: &'static str, weights: Vec<f64>) -> ArticlePattern {
    ArticlePattern {
        pattern,
        selector: Selector::parse(pattern).expect("valid built-in selector"),
        weights,
        needs_alignment: pattern == "strong",
    }
}

/// Patterns the Article Locator scores, in evaluation order.
pub static ARTICLE_PATTERNS: LazyLock<Vec<ArticlePattern>> = LazyLock::new(|| {
    let mut patterns = vec![
        pattern("h1", scaled(0.4)),
        pattern("h2", scaled(1.0)),
        pattern("h3", scaled(0.5)),
        pattern("h4", scaled(0.5 * 0.5)),
        pattern("h5", scaled(0.5 * 0.5 * 0.5)),
        pattern("h6", scaled(0.5 * 0.5 * 0.5 * 0.5)),
        pattern("strong", scaled(0.5 * 0.5 * 0.5)),
        pattern("article", ARTICLE_BONUS.to_vec()),
        pattern(".article", ARTICLE_BONUS.to_vec()),
        pattern("#article", ARTICLE_BONUS.to_vec()),
        pattern(".content", CONTENT_BONUS.to_vec()),
    ];
    for chrome in [
        "sidebar",
        ".sidebar",
        "#sidebar",
        "aside",
        ".aside",
        "#aside",
        "nav",
        ".nav",
        ".navigation",
        ".toc",
        ".table-of-contents",
        ".comment",
    ] {
        patterns.push(pattern(chrome, CHROME_PENALTY.to_vec()));
    }
    patterns
});

/// A tag that may act as a heading, and how much each occurrence counts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadingTag {
    pub tag: &'static str,
    pub weight: f64,
}

/// Heading vocabulary candidates, in discovery order.
pub const HEADING_TAGS: [HeadingTag; 7] = [
    HeadingTag { tag: "h1", weight: 4.0 },
    HeadingTag { tag: "h2", weight: 9.0 },
    HeadingTag { tag: "h3", weight: 9.0 },
    HeadingTag { tag: "h4", weight: 10.0 },
    HeadingTag { tag: "h5", weight: 10.0 },
    HeadingTag { tag: "h6", weight: 10.0 },
    HeadingTag { tag: "strong", weight: 5.0 },
];

/// Emphasized text needs the column check before it counts as a heading.
pub fn is_emphasis(tag: &str) -> bool {
    tag == "strong"
}

/// Semantic heading tags for the fallback path.
pub static SEMANTIC_HEADINGS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1, h2, h3, h4, h5, h6").expect("valid selector"));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_weights_decay_with_distance() {
        let h2 = ARTICLE_PATTERNS.iter().find(|p| p.pattern == "h2").unwrap();
        assert_eq!(h2.weights[0], 0.0);
        assert_eq!(h2.weights[1], 100.0);
        assert!(h2.weights.windows(2).skip(1).all(|w| w[0] > w[1]));

        let h1 = ARTICLE_PATTERNS.iter().find(|p| p.pattern == "h1").unwrap();
        assert_eq!(h1.weights[1], 40.0);
    }

    #[test]
    fn chrome_patterns_are_negative_and_shallow() {
        for name in ["nav", ".sidebar", ".comment", "aside"] {
            let p = ARTICLE_PATTERNS.iter().find(|p| p.pattern == name).unwrap();
            assert_eq!(p.weights.len(), 3);
            assert!(p.weights.iter().all(|w| *w < 0.0));
        }
    }

    #[test]
    fn only_strong_needs_alignment() {
        let aligned: Vec<&str> = ARTICLE_PATTERNS
            .iter()
            .filter(|p| p.needs_alignment)
            .map(|p| p.pattern)
            .collect();
        assert_eq!(aligned, vec!["strong"]);
        assert_eq!(ARTICLE_PATTERNS.len(), 23);
    }

    #[test]
    fn heading_tags_in_discovery_order() {
        let tags: Vec<&str> = HEADING_TAGS.iter().map(|t| t.tag).collect();
        assert_eq!(tags, vec!["h1", "h2", "h3", "h4", "h5", "h6", "strong"]);
    }
}
