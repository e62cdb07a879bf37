//! Article location and heading extraction.
//!
//! This crate provides:
//! - [`article`]: scores elements to find the main-content region
//! - [`headings`]: infers the heading vocabulary and collects headings
//! - [`OutlineExtractor`]: picks a strategy per page and always yields an outline

pub mod align;
pub mod article;
pub mod headings;
pub mod weights;

use std::fmt;

use tracing::{debug, instrument, warn};

use outlinelens_dom::{NodeId, Page};
use outlinelens_shared::{ExtractConfig, Outline, Result};

pub use article::{Candidate, SiteProfile, locate_article, rank_candidates};
pub use headings::{collect_semantic_headings, extract_headings};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// How an outline was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// The host opted into page-wide detection.
    PageWide,
    /// A feed reader's configured container.
    SpecialSite,
    /// The located article region.
    Article,
    /// Semantic headings across the whole page.
    Fallback,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PageWide => "page-wide",
            Self::SpecialSite => "special-site",
            Self::Article => "article",
            Self::Fallback => "fallback",
        };
        f.write_str(name)
    }
}

/// Result of one extraction run.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub outline: Outline,
    pub strategy: Strategy,
    /// The region headings were collected from, when one was used.
    pub root: Option<NodeId>,
}

// ---------------------------------------------------------------------------
// Extractor
// ---------------------------------------------------------------------------

/// Produces the outline for a page.
#[derive(Debug, Clone, Default)]
pub struct OutlineExtractor {
    config: ExtractConfig,
}

impl OutlineExtractor {
    pub fn new(config: ExtractConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractConfig {
        &self.config
    }

    /// Swap in freshly loaded settings.
    pub fn set_config(&mut self, config: ExtractConfig) {
        self.config = config;
    }

    /// Extract the outline. Never fails: a missing article region or any
    /// error along the way falls back to the page's semantic headings.
    #[instrument(skip_all, fields(host = %page.host()))]
    pub fn extract(&self, page: &mut Page) -> Extraction {
        if self.config.page_wide_for(page.host()) {
            debug!("page-wide detection enabled for host");
            return Extraction {
                outline: collect_semantic_headings(page),
                strategy: Strategy::PageWide,
                root: None,
            };
        }

        match self.extract_article(page) {
            Ok(Some(extraction)) => {
                debug!(
                    strategy = %extraction.strategy,
                    count = extraction.outline.len(),
                    "outline extracted"
                );
                return extraction;
            }
            Ok(None) => debug!("no article region, falling back"),
            Err(e) => warn!(error = %e, "article extraction failed, falling back"),
        }

        Extraction {
            outline: collect_semantic_headings(page),
            strategy: Strategy::Fallback,
            root: None,
        }
    }

    fn extract_article(&self, page: &mut Page) -> Result<Option<Extraction>> {
        let strategy = if SiteProfile::detect(page.host()).is_some() {
            Strategy::SpecialSite
        } else {
            Strategy::Article
        };
        let Some(root) = locate_article(page, &self.config.selectors)? else {
            return Ok(None);
        };
        let outline = extract_headings(page, root)?;
        Ok(Some(Extraction {
            outline,
            strategy,
            root: Some(root),
        }))
    }
}
