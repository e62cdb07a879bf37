//! Outline Tracker: owns the current outline and publishes genuine changes.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, instrument};

use outlinelens_dom::{MutationKind, MutationRecord, Page};
use outlinelens_extract::{OutlineExtractor, Strategy};
use outlinelens_shared::{ExtractConfig, Outline};

use crate::schedule::Debouncer;

/// What a due mutation debounce produced.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    /// The structure matches the last published outline.
    Unchanged,
    /// The structure changed; publish this outline.
    Changed(Outline),
}

#[derive(Debug)]
pub struct OutlineTracker {
    extractor: OutlineExtractor,
    current: Outline,
    /// Signature of the last published outline.
    published: Option<String>,
    last_strategy: Option<Strategy>,
    debounce: Debouncer,
    delay: Duration,
}

impl OutlineTracker {
    pub fn new(extractor: OutlineExtractor, delay: Duration) -> Self {
        Self {
            extractor,
            current: Outline::default(),
            published: None,
            last_strategy: None,
            debounce: Debouncer::default(),
            delay,
        }
    }

    /// The authoritative outline.
    pub fn current(&self) -> &Outline {
        &self.current
    }

    pub fn last_strategy(&self) -> Option<Strategy> {
        self.last_strategy
    }

    pub fn set_config(&mut self, config: ExtractConfig, delay: Duration) {
        self.extractor.set_config(config);
        self.delay = delay;
    }

    fn extract(&mut self, page: &mut Page) -> Outline {
        let extraction = self.extractor.extract(page);
        self.last_strategy = Some(extraction.strategy);
        self.current = extraction.outline;
        self.current.clone()
    }

    /// Re-extract and return the outline only if it differs from the last
    /// published one. The new signature is stored before returning.
    #[instrument(skip_all)]
    pub fn recompute(&mut self, page: &mut Page) -> Option<Outline> {
        let outline = self.extract(page);
        let signature = outline.signature();
        if self.published.as_deref() == Some(signature.as_str()) {
            debug!("outline unchanged");
            return None;
        }
        self.published = Some(signature);
        debug!(count = outline.len(), "outline changed");
        Some(outline)
    }

    /// Re-extract and mark the result published regardless of change.
    pub fn republish(&mut self, page: &mut Page) -> Outline {
        let outline = self.extract(page);
        self.published = Some(outline.signature());
        outline
    }

    /// Re-extract for an explicit fetch. Does not count as a publish.
    pub fn refresh(&mut self, page: &mut Page) -> &Outline {
        self.extract(page);
        &self.current
    }

    /// Feed observed mutations. Only child-list changes (re)arm the debounce.
    /// Returns whether any record qualified.
    pub fn on_mutations(&mut self, records: &[MutationRecord], now: Instant) -> bool {
        let qualifying = records
            .iter()
            .any(|r| r.kind == MutationKind::ChildList);
        if qualifying {
            self.debounce.arm(now, self.delay);
        }
        qualifying
    }

    /// Recompute when the debounce is due.
    pub fn poll(&mut self, page: &mut Page, now: Instant) -> Option<TrackerEvent> {
        if !self.debounce.fire(now) {
            return None;
        }
        Some(match self.recompute(page) {
            Some(outline) => TrackerEvent::Changed(outline),
            None => TrackerEvent::Unchanged,
        })
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.debounce.deadline()
    }

    pub fn cancel(&mut self) {
        self.debounce.cancel();
    }
}
