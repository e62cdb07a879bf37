//! Visibility Detector: which heading marks the reader's position.
//!
//! Two mechanisms cooperate. Intersection tracking watches the top fifth of
//! the viewport and reports headings as they enter it; scoring ranks every
//! heading by position, scroll direction and level when intersection gives
//! no answer. Either way the winner is published only when it differs from
//! the last published id.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, instrument, trace};

use outlinelens_dom::{NodeId, Page};
use outlinelens_shared::{Notification, Outline};

/// Share of the viewport height, from the top, that intersection tracking watches.
const ATTENTION_SHARE: f64 = 0.2;

/// Intersection thresholds are 0.0, 0.1, ..., 1.0.
const THRESHOLD_STEPS: f64 = 10.0;

/// Minimum visible share for an entering heading to count.
const MIN_VISIBLE_RATIO: f64 = 0.1;

/// Preferred distance of the active heading from the viewport top.
const IDEAL_TOP: f64 = 80.0;

const FULLY_VISIBLE_BONUS: f64 = 1000.0;
const SCROLL_DOWN_BONUS: f64 = 500.0;
const SCROLL_UP_BONUS: f64 = 800.0;
const LEVEL_BONUS: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    Idle,
    Scoring,
    Publishing,
    /// Suspended while a panel-initiated scroll settles.
    ManualScroll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Down,
    Up,
}

/// A change in how much of a heading sits inside the attention area.
#[derive(Debug, Clone, PartialEq)]
pub struct IntersectionEntry {
    pub id: String,
    /// Viewport-relative top edge.
    pub top: f64,
    pub ratio: f64,
    pub intersecting: bool,
}

#[derive(Debug, Clone)]
struct ObservedHeading {
    id: String,
    node: NodeId,
    level: u8,
    /// Last reported (intersecting, threshold bucket).
    reported: Option<(bool, u8)>,
}

#[derive(Debug)]
pub struct VisibilityDetector {
    observed: Vec<ObservedHeading>,
    last_scroll_y: f64,
    last_published: Option<String>,
    manual_until: Option<Instant>,
    state: DetectorState,
}

impl Default for VisibilityDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl VisibilityDetector {
    pub fn new() -> Self {
        Self {
            observed: Vec::new(),
            last_scroll_y: 0.0,
            last_published: None,
            manual_until: None,
            state: DetectorState::Idle,
        }
    }

    // -----------------------------------------------------------------------
    // Subscription
    // -----------------------------------------------------------------------

    /// Watch the headings of `outline` that resolve to elements on `page`.
    /// Replaces the previous subscription and its intersection history.
    pub fn observe(&mut self, page: &Page, outline: &Outline) {
        self.observed = outline
            .iter()
            .filter_map(|item| {
                page.element_by_id(&item.id).map(|node| ObservedHeading {
                    id: item.id.clone(),
                    node,
                    level: item.level,
                    reported: None,
                })
            })
            .collect();
        debug!(
            observed = self.observed.len(),
            outline = outline.len(),
            "visibility subscription"
        );
    }

    pub fn observed_count(&self) -> usize {
        self.observed.len()
    }

    /// Drop the subscription entirely.
    pub fn disconnect(&mut self) {
        self.observed.clear();
        self.manual_until = None;
        self.state = DetectorState::Idle;
    }

    // -----------------------------------------------------------------------
    // Suppression
    // -----------------------------------------------------------------------

    /// Suspend detection for `duration` from `now`.
    pub fn suspend(&mut self, now: Instant, duration: Duration) {
        self.manual_until = Some(now + duration);
        self.state = DetectorState::ManualScroll;
    }

    /// Whether detection is suspended; an elapsed suspension is cleared.
    pub fn is_suspended(&mut self, now: Instant) -> bool {
        match self.manual_until {
            Some(until) if now < until => true,
            Some(_) => {
                self.manual_until = None;
                self.state = DetectorState::Idle;
                false
            }
            None => false,
        }
    }

    pub fn suspended_until(&self) -> Option<Instant> {
        self.manual_until
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    pub fn last_published(&self) -> Option<&str> {
        self.last_published.as_deref()
    }

    // -----------------------------------------------------------------------
    // Detection
    // -----------------------------------------------------------------------

    /// Scroll-settle pass: intersection first, scoring as the fallback.
    #[instrument(skip_all, fields(scroll_y = page.scroll_y()))]
    pub fn detect(&mut self, page: &Page, now: Instant) -> Option<Notification> {
        if self.is_suspended(now) {
            trace!("suspended");
            return None;
        }
        self.state = DetectorState::Scoring;
        let direction = self.direction(page);
        let entries = self.intersections(page);
        let winner = pick_entering(&entries, direction).or_else(|| self.score(page, direction));
        self.finish(winner)
    }

    /// Scoring only, used for explicit requests and re-detection timers.
    #[instrument(skip_all, fields(scroll_y = page.scroll_y()))]
    pub fn force_detect(&mut self, page: &Page, now: Instant) -> Option<Notification> {
        if self.is_suspended(now) {
            trace!("suspended");
            return None;
        }
        self.state = DetectorState::Scoring;
        let direction = self.direction(page);
        let winner = self.score(page, direction);
        self.finish(winner)
    }

    fn finish(&mut self, winner: Option<String>) -> Option<Notification> {
        self.state = DetectorState::Publishing;
        let notification = winner.and_then(|id| self.publish(&id));
        self.state = DetectorState::Idle;
        notification
    }

    /// Compare-then-set against the last published id.
    pub fn publish(&mut self, id: &str) -> Option<Notification> {
        if self.last_published.as_deref() == Some(id) {
            return None;
        }
        self.last_published = Some(id.to_string());
        debug!(id, "active heading");
        Some(Notification::ActiveHeading {
            heading_id: id.to_string(),
        })
    }

    fn direction(&mut self, page: &Page) -> Direction {
        let y = page.scroll_y();
        let direction = if y > self.last_scroll_y {
            Direction::Down
        } else {
            Direction::Up
        };
        self.last_scroll_y = y;
        direction
    }

    /// Entries for headings whose intersection state or threshold bucket
    /// changed since the last call (every heading on the first call).
    pub fn intersections(&mut self, page: &Page) -> Vec<IntersectionEntry> {
        let attention_bottom = page.viewport().height * ATTENTION_SHARE;
        let mut entries = Vec::new();

        for heading in &mut self.observed {
            if !page.is_attached(heading.node) {
                continue;
            }
            let rect = page.rect(heading.node);
            let visible = (rect.bottom().min(attention_bottom) - rect.top.max(0.0)).max(0.0);
            let ratio = if rect.height > 0.0 {
                (visible / rect.height).min(1.0)
            } else {
                0.0
            };
            let intersecting = visible > 0.0;
            let bucket = (ratio * THRESHOLD_STEPS).floor() as u8;

            if heading.reported == Some((intersecting, bucket)) {
                continue;
            }
            heading.reported = Some((intersecting, bucket));
            entries.push(IntersectionEntry {
                id: heading.id.clone(),
                top: rect.top,
                ratio,
                intersecting,
            });
        }
        trace!(changed = entries.len(), "intersection entries");
        entries
    }

    /// Rank every attached heading; the strictly highest score wins.
    fn score(&self, page: &Page, direction: Direction) -> Option<String> {
        let viewport_height = page.viewport().height;
        let mut best: Option<(&str, f64)> = None;

        for heading in &self.observed {
            if !page.is_attached(heading.node) {
                continue;
            }
            let rect = page.rect(heading.node);
            let mut score = 0.0;
            if rect.top >= 0.0 && rect.bottom() <= viewport_height {
                score += FULLY_VISIBLE_BONUS;
            }
            match direction {
                Direction::Down if rect.top > 0.0 => score += SCROLL_DOWN_BONUS,
                Direction::Up if rect.top < viewport_height / 3.0 => score += SCROLL_UP_BONUS,
                _ => {}
            }
            score -= (rect.top - IDEAL_TOP).abs();
            score += (7.0 - f64::from(heading.level)) * LEVEL_BONUS;

            if best.is_none_or(|(_, top_score)| score > top_score) {
                best = Some((heading.id.as_str(), score));
            }
        }
        best.map(|(id, _)| id.to_string())
    }
}

/// Entering headings: intersecting, at least 10% visible, top edge below the
/// viewport top. Down picks the topmost, up the bottommost.
fn pick_entering(entries: &[IntersectionEntry], direction: Direction) -> Option<String> {
    let mut entering: Vec<&IntersectionEntry> = entries
        .iter()
        .filter(|e| e.intersecting && e.ratio >= MIN_VISIBLE_RATIO && e.top > 0.0)
        .collect();
    entering.sort_by(|a, b| a.top.total_cmp(&b.top));
    let pick = match direction {
        Direction::Down => entering.first(),
        Direction::Up => entering.last(),
    };
    pick.map(|e| e.id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use outlinelens_dom::Viewport;
    use outlinelens_shared::HeadingItem;
    use url::Url;

    /// Sections of an `<h2>` (32px) followed by `lines` paragraphs (20px each).
    fn sections(count: usize, lines: usize) -> (Page, Outline) {
        let mut html = String::from("<body><article>");
        for i in 0..count {
            html.push_str(&format!("<h2 id='s{i}'>Section {i}</h2>"));
            html.push_str(&"<p>line</p>".repeat(lines));
        }
        html.push_str("</article></body>");

        let page = Page::parse(
            &html,
            Url::parse("https://example.com/long").unwrap(),
            Viewport::default(),
        )
        .unwrap();
        let outline = Outline::new(
            (0..count)
                .map(|i| HeadingItem::new(format!("s{i}"), format!("Section {i}"), 2))
                .collect(),
        );
        (page, outline)
    }

    fn active(n: Option<Notification>) -> Option<String> {
        match n {
            Some(Notification::ActiveHeading { heading_id }) => Some(heading_id),
            _ => None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn scrolling_down_picks_the_entering_heading() {
        // 432px sections: s5 starts at 2160.
        let (mut page, outline) = sections(8, 20);
        let mut detector = VisibilityDetector::new();
        detector.observe(&page, &outline);

        page.scroll_to(2100.0);
        let id = active(detector.detect(&page, Instant::now()));
        assert_eq!(id.as_deref(), Some("s5"));
        assert_eq!(detector.last_published(), Some("s5"));
        assert_eq!(detector.state(), DetectorState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn scrolling_up_picks_the_lowest_entering_heading() {
        // 92px sections: two headings fit in the 160px attention area.
        let (mut page, outline) = sections(40, 3);
        let mut detector = VisibilityDetector::new();
        detector.observe(&page, &outline);
        let now = Instant::now();

        page.scroll_to(1000.0);
        assert_eq!(active(detector.detect(&page, now)).as_deref(), Some("s11"));
        page.scroll_to(2000.0);
        assert_eq!(active(detector.detect(&page, now)).as_deref(), Some("s22"));
        page.scroll_to(1000.0);
        assert_eq!(active(detector.detect(&page, now)).as_deref(), Some("s12"));
    }

    #[tokio::test(start_paused = true)]
    async fn scoring_covers_gaps_between_headings() {
        let (mut page, outline) = sections(8, 20);
        let mut detector = VisibilityDetector::new();
        detector.observe(&page, &outline);

        // s5 is above the viewport, s6 sits at 292px: nothing in the attention area.
        page.scroll_to(2300.0);
        let id = active(detector.detect(&page, Instant::now()));
        assert_eq!(id.as_deref(), Some("s6"));
    }

    #[tokio::test(start_paused = true)]
    async fn never_publishes_the_same_id_twice_in_a_row() {
        let (mut page, outline) = sections(8, 20);
        let mut detector = VisibilityDetector::new();
        detector.observe(&page, &outline);
        let now = Instant::now();

        page.scroll_to(2100.0);
        assert!(detector.detect(&page, now).is_some());
        assert!(detector.detect(&page, now).is_none());
        assert!(detector.force_detect(&page, now).is_none());
        assert!(detector.publish("s5").is_none());
        assert!(detector.publish("s6").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn suspension_blocks_both_paths_until_it_expires() {
        let (mut page, outline) = sections(8, 20);
        let mut detector = VisibilityDetector::new();
        detector.observe(&page, &outline);
        let now = Instant::now();

        detector.suspend(now, Duration::from_secs(1));
        assert_eq!(detector.state(), DetectorState::ManualScroll);
        page.scroll_to(2100.0);
        assert!(detector.detect(&page, now).is_none());
        assert!(detector.force_detect(&page, now + Duration::from_millis(999)).is_none());

        let later = now + Duration::from_secs(1);
        assert!(!detector.is_suspended(later));
        assert_eq!(detector.state(), DetectorState::Idle);
        assert!(detector.force_detect(&page, later).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn top_of_page_prefers_the_first_heading() {
        let (page, outline) = sections(8, 20);
        let mut detector = VisibilityDetector::new();
        detector.observe(&page, &outline);
        let id = active(detector.force_detect(&page, Instant::now()));
        assert_eq!(id.as_deref(), Some("s0"));
    }

    #[test]
    fn intersection_entries_report_only_changes() {
        let (mut page, outline) = sections(8, 20);
        let mut detector = VisibilityDetector::new();
        detector.observe(&page, &outline);

        assert_eq!(detector.intersections(&page).len(), 8);
        assert!(detector.intersections(&page).is_empty());

        // s5 moves into the attention area; nothing else changes state.
        page.scroll_to(2100.0);
        let entries = detector.intersections(&page);
        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        assert!(ids.contains(&"s5"));
        assert!(ids.contains(&"s0"));
        let s5 = entries.iter().find(|e| e.id == "s5").unwrap();
        assert!(s5.intersecting);
        assert_eq!(s5.ratio, 1.0);
        assert_eq!(s5.top, 60.0);
    }

    #[test]
    fn missing_headings_are_not_observed() {
        let (page, mut outline) = sections(3, 1);
        outline.0.push(HeadingItem::new("gone", "Gone", 2));
        let mut detector = VisibilityDetector::new();
        detector.observe(&page, &outline);
        assert_eq!(detector.observed_count(), 3);
    }
}
