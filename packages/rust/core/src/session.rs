//! Page session: wires the tracker and the detector to one page.
//!
//! The session owns the [`Page`] and every timer that acts on it. Hosts
//! either call its methods directly with an explicit `now` or hand it an
//! event channel and await [`PageSession::run`]. Outbound notifications go
//! through an [`Outbox`] so a slow relay never blocks the page.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use outlinelens_dom::{NodeId, Page};
use outlinelens_extract::{OutlineExtractor, Strategy};
use outlinelens_shared::{
    AppConfig, ExtractConfig, Notification, Outline, OutlineError, Request, Response, Result,
    SessionTiming, SpecialPageInfo,
};

use crate::delivery::{ContextFlag, Messenger, Outbox, RetryPolicy};
use crate::schedule::{Debouncer, ScrollPass, ScrollSettle, earliest};
use crate::special::detect_special_page;
use crate::store::ConfigStore;
use crate::tracker::{OutlineTracker, TrackerEvent};
use crate::visibility::{DetectorState, VisibilityDetector};

/// Reply to every request once the extension context is gone.
pub const INVALIDATED: &str = "Extension invalidated";

/// Work for a running session.
pub enum SessionEvent {
    Request(Request, oneshot::Sender<Response>),
    /// The document scrolled to this offset.
    Scroll(f64),
    /// Apply a DOM change; observed mutations feed the tracker.
    Mutate(Box<dyn FnOnce(&mut Page) -> Result<()> + Send>),
    Shutdown,
}

impl std::fmt::Debug for SessionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Request(req, _) => f.debug_tuple("Request").field(req).finish(),
            Self::Scroll(y) => f.debug_tuple("Scroll").field(y).finish(),
            Self::Mutate(_) => f.write_str("Mutate"),
            Self::Shutdown => f.write_str("Shutdown"),
        }
    }
}

pub struct PageSession<M, S> {
    page: Page,
    store: S,
    tracker: OutlineTracker,
    detector: VisibilityDetector,
    scroll: ScrollSettle,
    /// Scroll offset seen by the last fast pass.
    fast_scroll_y: Option<f64>,
    initial_redetect: Debouncer,
    highlight: Option<(NodeId, Instant)>,
    outbox: Outbox<M>,
    context: ContextFlag,
    timing: SessionTiming,
    special: Option<SpecialPageInfo>,
    connected: bool,
}

impl<M: Messenger, S: ConfigStore> PageSession<M, S> {
    /// Build a session for `page`. Unreadable settings fall back to defaults.
    pub fn new(page: Page, store: S, messenger: Arc<M>) -> Self {
        let config = store.load().unwrap_or_else(|e| {
            warn!(error = %e, "config unavailable, using defaults");
            AppConfig::default()
        });
        let timing = SessionTiming::from(&config);
        let special = detect_special_page(page.url().as_str(), &config.special_pages);
        let context = ContextFlag::default();

        Self {
            tracker: OutlineTracker::new(
                OutlineExtractor::new(ExtractConfig::from(&config)),
                timing.mutation_debounce,
            ),
            detector: VisibilityDetector::new(),
            scroll: ScrollSettle::new(timing.scroll_settle, timing.scroll_confirm),
            fast_scroll_y: None,
            initial_redetect: Debouncer::default(),
            highlight: None,
            outbox: Outbox::new(messenger, RetryPolicy::from(&timing), context.clone()),
            context,
            timing,
            special,
            connected: true,
            page,
            store,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn outline(&self) -> &Outline {
        self.tracker.current()
    }

    pub fn strategy(&self) -> Option<Strategy> {
        self.tracker.last_strategy()
    }

    pub fn special_page(&self) -> Option<&SpecialPageInfo> {
        self.special.as_ref()
    }

    pub fn active_heading(&self) -> Option<&str> {
        self.detector.last_published()
    }

    pub fn detector_state(&self) -> DetectorState {
        self.detector.state()
    }

    /// The heading highlighted by the last `scrollTo`, while it lasts.
    pub fn highlighted(&self, now: Instant) -> Option<NodeId> {
        self.highlight
            .filter(|(_, until)| now < *until)
            .map(|(node, _)| node)
    }

    /// Still connected and the extension context is valid.
    pub fn is_active(&self) -> bool {
        self.connected && self.context.is_valid()
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Classify the page, publish the first outline and active heading.
    #[instrument(skip_all, fields(url = %self.page.url()))]
    pub fn start(&mut self, now: Instant) {
        if let Some(info) = &self.special {
            info!(page_type = %info.page_type, "special page, skipping extraction");
            self.outbox.post(Notification::SpecialPage {
                page_type: info.page_type.clone(),
                message: info.message.clone(),
            });
            return;
        }

        if let Some(outline) = self.tracker.recompute(&mut self.page) {
            self.outbox.post(Notification::UpdateOutline { outline });
        }
        info!(
            headings = self.tracker.current().len(),
            strategy = ?self.tracker.last_strategy(),
            "session started"
        );
        self.detector.observe(&self.page, self.tracker.current());
        let active = self.detector.force_detect(&self.page, now);
        self.post(active);
        self.initial_redetect.arm(now, self.timing.initial_redetect);
    }

    /// Disconnect everything. Later requests are rejected.
    pub fn teardown(&mut self) {
        if !self.connected {
            return;
        }
        info!("session torn down");
        self.connected = false;
        self.context.invalidate();
        self.tracker.cancel();
        self.scroll.cancel();
        self.initial_redetect.cancel();
        self.detector.disconnect();
        self.highlight = None;
        self.outbox.abort_all();
    }

    /// Tear down if a delivery reported the context gone.
    fn check_context(&mut self) -> bool {
        if self.connected && !self.context.is_valid() {
            self.teardown();
        }
        self.is_active()
    }

    fn post(&mut self, notification: Option<Notification>) {
        if let Some(notification) = notification {
            self.outbox.post(notification);
        }
    }

    // -----------------------------------------------------------------------
    // Requests
    // -----------------------------------------------------------------------

    #[instrument(skip_all, fields(request = ?request))]
    pub fn handle_request(&mut self, request: Request, now: Instant) -> Response {
        if !self.check_context() {
            // Teardown already happened; acknowledging it again is harmless.
            if matches!(request, Request::ExtensionInvalidated) {
                return Response::ok();
            }
            return Response::failed(INVALIDATED);
        }

        match request {
            Request::GetOutline => {
                if self.special.is_some() {
                    return Response::Outline {
                        outline: Outline::default(),
                    };
                }
                Response::Outline {
                    outline: self.tracker.refresh(&mut self.page).clone(),
                }
            }
            Request::ScrollTo { id } => self.scroll_to_heading(id, now),
            Request::GetActiveHeading => Response::ActiveHeading {
                heading_id: self.detector.last_published().map(str::to_string),
            },
            Request::DetectVisibleHeading => {
                let active = self.detector.force_detect(&self.page, now);
                self.post(active);
                Response::ok()
            }
            Request::ConfigUpdated => match self.reload_config() {
                Ok(()) => Response::ok(),
                Err(e) => {
                    warn!(error = %e, "config reload failed");
                    Response::failed(e.to_string())
                }
            },
            Request::ExtensionInvalidated => {
                self.teardown();
                Response::ok()
            }
        }
    }

    fn scroll_to_heading(&mut self, id: String, now: Instant) -> Response {
        let Some(node) = self.page.element_by_id(&id) else {
            let err = OutlineError::MissingTarget { id };
            debug!(error = %err, "scrollTo target missing");
            return Response::failed(err.to_string());
        };

        self.detector.suspend(now, self.timing.manual_scroll);
        self.page.scroll_into_view(node);
        self.scroll.cancel();
        self.highlight = Some((node, now + self.timing.highlight));
        let active = self.detector.publish(&id);
        self.post(active);
        Response::ok()
    }

    /// Reload settings, then re-extract and publish unconditionally.
    fn reload_config(&mut self) -> Result<()> {
        let config = self.store.load()?;
        self.timing = SessionTiming::from(&config);
        self.tracker
            .set_config(ExtractConfig::from(&config), self.timing.mutation_debounce);
        self.scroll = ScrollSettle::new(self.timing.scroll_settle, self.timing.scroll_confirm);
        self.outbox.set_policy(RetryPolicy::from(&self.timing));

        if self.special.is_some() {
            return Ok(());
        }
        let outline = self.tracker.republish(&mut self.page);
        debug!(headings = outline.len(), "config reloaded");
        self.detector.observe(&self.page, &outline);
        self.outbox.post(Notification::UpdateOutline { outline });
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Page events
    // -----------------------------------------------------------------------

    /// The user scrolled: move the page and restart the scroll settle.
    pub fn on_scroll(&mut self, y: f64, now: Instant) {
        if !self.check_context() || self.special.is_some() {
            return;
        }
        self.page.scroll_to(y);
        self.scroll.on_scroll(now);
    }

    /// Apply a DOM change and feed what it did to the tracker.
    pub fn mutate<F>(&mut self, now: Instant, change: F) -> Result<()>
    where
        F: FnOnce(&mut Page) -> Result<()>,
    {
        let result = change(&mut self.page);
        let records = self.page.take_mutations();
        if self.check_context() && self.special.is_none() {
            self.tracker.on_mutations(&records, now);
        }
        result
    }

    /// Run every timer that is due at `now`.
    pub fn advance(&mut self, now: Instant) {
        if !self.check_context() {
            return;
        }

        if let Some(event) = self.tracker.poll(&mut self.page, now) {
            if let TrackerEvent::Changed(outline) = event {
                self.detector.observe(&self.page, &outline);
                self.outbox.post(Notification::UpdateOutline { outline });
            }
            let active = self.detector.force_detect(&self.page, now);
            self.post(active);
        }

        match self.scroll.poll(now) {
            Some(ScrollPass::Fast) => {
                self.fast_scroll_y = Some(self.page.scroll_y());
                let active = self.detector.detect(&self.page, now);
                self.post(active);
            }
            Some(ScrollPass::Confirm) => {
                if self.fast_scroll_y != Some(self.page.scroll_y()) {
                    let active = self.detector.detect(&self.page, now);
                    self.post(active);
                }
            }
            None => {}
        }

        if self.initial_redetect.fire(now) {
            let active = self.detector.force_detect(&self.page, now);
            self.post(active);
        }

        if self.highlight.is_some_and(|(_, until)| now >= until) {
            self.highlight = None;
        }
    }

    /// When [`advance`](Self::advance) next has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        if !self.is_active() {
            return None;
        }
        earliest([
            self.tracker.deadline(),
            self.scroll.deadline(),
            self.initial_redetect.deadline(),
            self.highlight.map(|(_, until)| until),
        ])
    }

    /// Wait for posted notifications to be delivered or dropped.
    pub async fn flush(&mut self) {
        self.outbox.flush().await;
    }

    // -----------------------------------------------------------------------
    // Event loop
    // -----------------------------------------------------------------------

    /// Start, then process events and timers until shutdown or the channel
    /// closes. Returns the session for inspection.
    pub async fn run(mut self, mut events: mpsc::Receiver<SessionEvent>) -> Self {
        self.start(Instant::now());

        loop {
            let deadline = self.next_deadline();
            tokio::select! {
                event = events.recv() => {
                    let now = Instant::now();
                    match event {
                        Some(SessionEvent::Request(request, reply)) => {
                            let response = self.handle_request(request, now);
                            if reply.send(response).is_err() {
                                debug!("requester went away");
                            }
                        }
                        Some(SessionEvent::Scroll(y)) => self.on_scroll(y, now),
                        Some(SessionEvent::Mutate(change)) => {
                            if let Err(e) = self.mutate(now, change) {
                                warn!(error = %e, "page mutation failed");
                            }
                        }
                        Some(SessionEvent::Shutdown) | None => break,
                    }
                }
                () = sleep_until(deadline) => self.advance(Instant::now()),
            }
        }

        self.flush().await;
        self
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::delivery::RecordingMessenger;
    use crate::store::StaticConfig;
    use outlinelens_dom::Viewport;
    use url::Url;

    const MS: Duration = Duration::from_millis(1);

    type TestSession = PageSession<RecordingMessenger, Arc<StaticConfig>>;

    /// Eight 432px sections: `<h2 id=sN>` then twenty 20px lines.
    fn long_article() -> String {
        let mut html = String::from("<body><article>");
        for i in 0..8 {
            html.push_str(&format!("<h2 id='s{i}'>Section {i}</h2>"));
            html.push_str(&"<p>line</p>".repeat(20));
        }
        html.push_str("</article></body>");
        html
    }

    fn load_fixture(name: &str) -> String {
        let path = format!("../../../fixtures/html/{name}");
        std::fs::read_to_string(&path).unwrap_or_else(|_| panic!("missing fixture: {path}"))
    }

    fn session_at(
        url: &str,
        html: &str,
    ) -> (TestSession, Arc<RecordingMessenger>, Arc<StaticConfig>) {
        let page = Page::parse(html, Url::parse(url).unwrap(), Viewport::default()).unwrap();
        let messenger = Arc::new(RecordingMessenger::new());
        let store = Arc::new(StaticConfig::default());
        let session = PageSession::new(page, Arc::clone(&store), Arc::clone(&messenger));
        (session, messenger, store)
    }

    fn outlines(messenger: &RecordingMessenger) -> Vec<Outline> {
        messenger
            .delivered()
            .into_iter()
            .filter_map(|n| match n {
                Notification::UpdateOutline { outline } => Some(outline),
                _ => None,
            })
            .collect()
    }

    fn first(page: &Page, tag: &str) -> NodeId {
        page.descendant_elements(page.document_element())
            .into_iter()
            .find(|n| page.tag_name(*n) == Some(tag))
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn start_publishes_outline_and_first_heading() {
        let (mut session, messenger, _) = session_at("https://example.com/post", &long_article());
        let t0 = Instant::now();
        session.start(t0);
        session.flush().await;

        let published = outlines(&messenger);
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].len(), 8);
        assert_eq!(messenger.active_ids(), vec!["s0".to_string()]);
        assert_eq!(session.strategy(), Some(Strategy::Article));
        assert_eq!(session.next_deadline(), Some(t0 + 500 * MS));

        // The initial re-detection finds the same heading and stays quiet.
        session.advance(t0 + 500 * MS);
        session.flush().await;
        assert_eq!(messenger.active_ids().len(), 1);
        assert_eq!(session.next_deadline(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_scrolling_publishes_once_per_settle() {
        let (mut session, messenger, _) = session_at("https://example.com/post", &long_article());
        let t0 = Instant::now();
        session.start(t0);
        session.advance(t0 + 500 * MS);
        session.flush().await;
        messenger.clear();

        let t1 = t0 + 1000 * MS;
        for (i, y) in [400.0, 900.0, 1500.0, 2100.0].into_iter().enumerate() {
            session.on_scroll(y, t1 + 10 * MS * i as u32);
            session.advance(t1 + 10 * MS * i as u32);
        }
        // Fast pass 50ms after the last event, confirm pass 200ms later.
        session.advance(t1 + 80 * MS);
        session.advance(t1 + 280 * MS);
        session.flush().await;

        assert_eq!(messenger.active_ids(), vec!["s5".to_string()]);
        assert_eq!(session.active_heading(), Some("s5"));
        assert_eq!(session.next_deadline(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn confirm_pass_catches_smooth_scroll_tail() {
        let (mut session, messenger, _) = session_at("https://example.com/post", &long_article());
        let t0 = Instant::now();
        session.start(t0);
        session.flush().await;
        messenger.clear();

        session.on_scroll(1700.0, t0);
        session.advance(t0 + 50 * MS);
        session.flush().await;
        assert_eq!(messenger.active_ids(), vec!["s4".to_string()]);
        // The page keeps moving without a new scroll event reaching us.
        session.page.scroll_to(2100.0);
        session.advance(t0 + 250 * MS);
        session.flush().await;

        assert_eq!(messenger.active_ids(), vec!["s4".to_string(), "s5".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn scroll_to_unknown_id_fails_without_suppression() {
        let (mut session, messenger, _) = session_at("https://example.com/post", &long_article());
        let t0 = Instant::now();
        session.start(t0);
        session.flush().await;
        messenger.clear();

        let response = session.handle_request(Request::ScrollTo { id: "nope".into() }, t0);
        assert!(!response.is_success());
        assert_eq!(response, Response::failed("heading not found: nope"));
        assert_ne!(session.detector_state(), DetectorState::ManualScroll);
        assert_eq!(session.page().scroll_y(), 0.0);

        session.on_scroll(2100.0, t0 + 10 * MS);
        session.advance(t0 + 60 * MS);
        session.flush().await;
        assert_eq!(messenger.active_ids(), vec!["s5".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn scroll_to_suspends_detection_and_highlights() {
        let (mut session, messenger, _) = session_at("https://example.com/post", &long_article());
        let t0 = Instant::now();
        session.start(t0);
        session.flush().await;
        messenger.clear();

        let response = session.handle_request(Request::ScrollTo { id: "s3".into() }, t0);
        assert!(response.is_success());
        assert_eq!(session.page().scroll_y(), 3.0 * 432.0);
        assert_eq!(session.detector_state(), DetectorState::ManualScroll);
        let s3 = session.page().element_by_id("s3");
        assert_eq!(session.highlighted(t0 + 2999 * MS), s3);
        assert_eq!(session.highlighted(t0 + 3000 * MS), None);

        // Scroll settles inside the suspension window publish nothing.
        session.on_scroll(2100.0, t0 + 100 * MS);
        session.advance(t0 + 150 * MS);
        session.advance(t0 + 350 * MS);
        session.flush().await;
        assert_eq!(messenger.active_ids(), vec!["s3".to_string()]);

        // A second click on the same heading is not re-published.
        session.handle_request(Request::ScrollTo { id: "s3".into() }, t0 + 400 * MS);
        session.flush().await;
        assert_eq!(messenger.active_ids().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn new_scroll_to_replaces_the_highlight() {
        let (mut session, _, _) = session_at("https://example.com/post", &long_article());
        let t0 = Instant::now();
        session.start(t0);

        session.handle_request(Request::ScrollTo { id: "s1".into() }, t0);
        session.handle_request(Request::ScrollTo { id: "s2".into() }, t0 + 1000 * MS);
        assert_eq!(
            session.highlighted(t0 + 3500 * MS),
            session.page().element_by_id("s2")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn get_requests_answer_from_current_state() {
        let (mut session, _, _) = session_at("https://example.com/post", &long_article());
        let t0 = Instant::now();
        session.start(t0);

        match session.handle_request(Request::GetOutline, t0) {
            Response::Outline { outline } => assert_eq!(outline.len(), 8),
            other => panic!("expected an outline, got {other:?}"),
        }
        assert_eq!(
            session.handle_request(Request::GetActiveHeading, t0),
            Response::ActiveHeading {
                heading_id: Some("s0".into())
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn mutations_republish_and_redetect() {
        let (mut session, messenger, _) = session_at("https://example.com/post", &long_article());
        let t0 = Instant::now();
        session.start(t0);
        session.flush().await;
        messenger.clear();

        session
            .mutate(t0 + 10 * MS, |page| {
                let article = first(page, "article");
                page.append_html(article, "<h2 id='s8'>Appendix</h2><p>more</p>")
                    .map(|_| ())
            })
            .unwrap();
        session.advance(t0 + 100 * MS);
        session.flush().await;
        assert!(outlines(&messenger).is_empty());

        session.advance(t0 + 210 * MS);
        session.flush().await;
        let published = outlines(&messenger);
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].len(), 9);
        assert_eq!(session.outline().get("s8").map(|h| h.text.as_str()), Some("Appendix"));
    }

    #[tokio::test(start_paused = true)]
    async fn attribute_mutations_do_not_republish() {
        let (mut session, messenger, _) = session_at("https://example.com/post", &long_article());
        let t0 = Instant::now();
        session.start(t0);
        session.flush().await;
        messenger.clear();

        session
            .mutate(t0, |page| {
                let h2 = first(page, "h2");
                page.set_attribute(h2, "class", "seen")
            })
            .unwrap();
        assert_eq!(session.next_deadline(), Some(t0 + 500 * MS));
        session.advance(t0 + 500 * MS);
        session.flush().await;
        assert!(outlines(&messenger).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn config_update_republishes_unconditionally() {
        let html = load_fixture("blog.html");
        let (mut session, messenger, store) = session_at("https://docs.example.com/post", &html);
        let t0 = Instant::now();
        session.start(t0);
        session.flush().await;
        let before = outlines(&messenger);
        assert!(before[0].iter().all(|h| h.text != "Recent posts"));
        messenger.clear();

        // Same settings: still published.
        assert!(session.handle_request(Request::ConfigUpdated, t0).is_success());
        session.flush().await;
        assert_eq!(outlines(&messenger), before);
        messenger.clear();

        let mut config = AppConfig::default();
        config.detection.all_headings_domains = vec!["https://www.example.com".into()];
        store.replace(config);
        assert!(session.handle_request(Request::ConfigUpdated, t0).is_success());
        session.flush().await;

        let after = outlines(&messenger);
        assert_eq!(after.len(), 1);
        assert!(after[0].iter().any(|h| h.text == "Recent posts"));
        assert_eq!(session.strategy(), Some(Strategy::PageWide));
    }

    #[tokio::test(start_paused = true)]
    async fn special_pages_skip_extraction() {
        let (mut session, messenger, _) =
            session_at("chrome://extensions/", "<body><h1>Extensions</h1></body>");
        let t0 = Instant::now();
        session.start(t0);
        session.flush().await;

        assert_eq!(
            messenger.delivered(),
            vec![Notification::SpecialPage {
                page_type: "扩展管理页面".into(),
                message: "扩展管理页面不支持大纲检测，请访问普通网页".into(),
            }]
        );
        assert_eq!(session.next_deadline(), None);
        assert_eq!(
            session.handle_request(Request::GetOutline, t0),
            Response::Outline {
                outline: Outline::default()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn invalidation_rejects_later_requests() {
        let (mut session, messenger, _) = session_at("https://example.com/post", &long_article());
        let t0 = Instant::now();
        session.start(t0);
        session.flush().await;
        messenger.clear();

        assert!(session
            .handle_request(Request::ExtensionInvalidated, t0)
            .is_success());
        assert!(!session.is_active());
        assert_eq!(session.next_deadline(), None);
        assert_eq!(
            session.handle_request(Request::GetOutline, t0),
            Response::failed(INVALIDATED)
        );
        assert!(session
            .handle_request(Request::ExtensionInvalidated, t0)
            .is_success());
        assert!(!session.is_active());

        session.on_scroll(2100.0, t0);
        session.advance(t0 + 300 * MS);
        session.flush().await;
        assert!(messenger.delivered().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn lost_context_during_delivery_tears_down() {
        let (mut session, messenger, _) = session_at("https://example.com/post", &long_article());
        messenger.fail_next(OutlineError::ContextInvalidated);
        messenger.fail_next(OutlineError::ContextInvalidated);
        let t0 = Instant::now();
        session.start(t0);
        session.flush().await;

        session.advance(t0 + 500 * MS);
        assert!(!session.is_active());
        assert_eq!(
            session.handle_request(Request::DetectVisibleHeading, t0),
            Response::failed(INVALIDATED)
        );
        assert_eq!(
            session.handle_request(Request::ExtensionInvalidated, t0),
            Response::ok()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn run_loop_drives_timers_and_requests() {
        let (session, messenger, _) = session_at("https://example.com/post", &long_article());
        let (tx, rx) = mpsc::channel(16);

        let driver = tokio::spawn(async move {
            tx.send(SessionEvent::Scroll(2100.0)).await.unwrap();
            tokio::time::sleep(Duration::from_millis(400)).await;

            let (reply, answer) = oneshot::channel();
            tx.send(SessionEvent::Request(Request::GetActiveHeading, reply))
                .await
                .unwrap();
            let response = answer.await.unwrap();
            tx.send(SessionEvent::Shutdown).await.unwrap();
            response
        });

        let session = session.run(rx).await;
        let response = driver.await.unwrap();
        assert_eq!(
            response,
            Response::ActiveHeading {
                heading_id: Some("s5".into())
            }
        );
        assert_eq!(messenger.active_ids(), vec!["s0".to_string(), "s5".to_string()]);
        assert_eq!(session.active_heading(), Some("s5"));
    }
}
