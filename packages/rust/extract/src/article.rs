//! Article Locator: find the element most likely to hold the page's main content.

use std::collections::HashMap;

use scraper::Selector;
use tracing::{debug, instrument, trace};

use outlinelens_dom::{NodeId, Page};
use outlinelens_shared::{OutlineError, Result, SiteSelectors};

use crate::align::aligned_column;
use crate::weights::ARTICLE_PATTERNS;

/// How many top-scoring elements get re-scored.
const CANDIDATE_COUNT: usize = 5;

/// Narrower than this is treated as a sidebar.
const MIN_ARTICLE_WIDTH: f64 = 400.0;

const NARROW_CONTAINER_PENALTY: f64 = 0.7;
const SCROLL_CONTAINER_PENALTY: f64 = 0.5;

// ---------------------------------------------------------------------------
// Special sites
// ---------------------------------------------------------------------------

/// Feed readers whose article container is known up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteProfile {
    Inoreader,
    Feedly,
}

impl SiteProfile {
    /// Match a page host against the known feed readers.
    pub fn detect(host: &str) -> Option<Self> {
        let host = host.to_ascii_lowercase();
        if host.contains("feedly.com") {
            Some(Self::Feedly)
        } else if host.contains("inoreader.com") || host.contains("innoreader.com") {
            Some(Self::Inoreader)
        } else {
            None
        }
    }

    pub fn selector<'a>(&self, selectors: &'a SiteSelectors) -> &'a str {
        match self {
            Self::Inoreader => &selectors.inoreader,
            Self::Feedly => &selectors.feedly,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Inoreader => "inoreader",
            Self::Feedly => "feedly",
        }
    }
}

/// The configured container on a feed reader, if present.
pub fn locate_site_article(
    page: &Page,
    profile: SiteProfile,
    selectors: &SiteSelectors,
) -> Result<Option<NodeId>> {
    let raw = profile.selector(selectors);
    let selector = Selector::parse(raw).map_err(|e| {
        OutlineError::parse(format!("invalid {} selector `{raw}`: {e}", profile.name()))
    })?;
    Ok(page.select(&selector).into_iter().next())
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// A scored element.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub node: NodeId,
    pub score: f64,
}

/// Accumulate pattern weights onto each matching element and its ancestors.
///
/// Returned in first-touched order, which breaks score ties.
pub fn score_elements(page: &Page) -> Vec<Candidate> {
    let mut order: Vec<NodeId> = Vec::new();
    let mut scores: HashMap<NodeId, f64> = HashMap::new();
    let column_bound = page.viewport().width / 2.0;

    for pattern in ARTICLE_PATTERNS.iter() {
        let mut matches = page.select(&pattern.selector);
        if pattern.needs_alignment {
            let total = matches.len();
            matches = aligned_column(page, &matches, column_bound);
            trace!(pattern = pattern.pattern, total, kept = matches.len(), "alignment filter");
        }

        for elem in matches {
            let chain = page.ancestors_inclusive(elem, pattern.weights.len());
            for (distance, node) in chain.into_iter().enumerate() {
                let weight = pattern.weights.get(distance).copied().unwrap_or_default();
                match scores.get_mut(&node) {
                    Some(score) => *score += weight,
                    None => {
                        scores.insert(node, weight);
                        order.push(node);
                    }
                }
            }
        }
    }

    order
        .into_iter()
        .map(|node| Candidate {
            node,
            score: scores[&node],
        })
        .collect()
}

/// Re-score the top candidates by shape: width, own scrolling, height and link density.
pub fn rank_candidates(page: &Page) -> Vec<Candidate> {
    let mut scored = score_elements(page);
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(CANDIDATE_COUNT);

    let body = page.body();
    for i in 0..scored.len() {
        let node = scored[i].node;
        if page.scroll_width(node) < MIN_ARTICLE_WIDTH {
            scored[i].score = 0.0;
            for parent in scored.iter_mut() {
                if page.contains(parent.node, node) {
                    parent.score *= NARROW_CONTAINER_PENALTY;
                }
            }
        }
        if page.is_scrollable(node) && Some(node) != body {
            scored[i].score *= SCROLL_CONTAINER_PENALTY;
        }
    }

    let mut ranked: Vec<Candidate> = scored
        .into_iter()
        .map(|c| {
            let height = page.scroll_height(c.node);
            let links = page.link_count(c.node).max(1) as f64;
            let score = c.score * (height * height / links).ln();
            Candidate {
                node: c.node,
                score: if score.is_nan() { f64::NEG_INFINITY } else { score },
            }
        })
        .collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked
}

/// The most likely main-content element, honoring the feed-reader profiles.
#[instrument(skip_all, fields(host = %page.host()))]
pub fn locate_article(page: &Page, selectors: &SiteSelectors) -> Result<Option<NodeId>> {
    if let Some(profile) = SiteProfile::detect(page.host()) {
        let found = locate_site_article(page, profile, selectors)?;
        debug!(profile = profile.name(), found = found.is_some(), "special site");
        return Ok(found);
    }

    let ranked = rank_candidates(page);
    if let Some(best) = ranked.first() {
        debug!(
            tag = page.tag_name(best.node).unwrap_or_default(),
            score = best.score,
            candidates = ranked.len(),
            "article located"
        );
    }
    Ok(ranked.first().map(|c| c.node))
}
