//! Single-slot timers.
//!
//! Every recomputation stream owns one pending deadline; a new trigger
//! replaces it instead of queueing. Timers never fire on their own: the
//! session polls them with the current time.

use std::time::Duration;

use tokio::time::Instant;

/// A cancel-and-reschedule timer.
#[derive(Debug, Clone, Default)]
pub struct Debouncer {
    deadline: Option<Instant>,
}

impl Debouncer {
    /// (Re)arm to fire `delay` after `now`, replacing any pending deadline.
    pub fn arm(&mut self, now: Instant, delay: Duration) {
        self.deadline = Some(now + delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Disarm and report `true` if the deadline has passed.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Which pass of a scroll settle is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollPass {
    /// Shortly after scrolling stops.
    Fast,
    /// After smooth-scroll animations had time to finish.
    Confirm,
}

/// Two-phase scroll debounce: a fast pass, then a confirming pass.
#[derive(Debug, Clone)]
pub struct ScrollSettle {
    timer: Debouncer,
    pending: ScrollPass,
    settle: Duration,
    confirm: Duration,
}

impl ScrollSettle {
    pub fn new(settle: Duration, confirm: Duration) -> Self {
        Self {
            timer: Debouncer::default(),
            pending: ScrollPass::Fast,
            settle,
            confirm,
        }
    }

    /// A scroll event restarts the settle from the fast pass.
    pub fn on_scroll(&mut self, now: Instant) {
        self.pending = ScrollPass::Fast;
        self.timer.arm(now, self.settle);
    }

    /// The pass that is due, if any. Firing the fast pass arms the confirm pass.
    pub fn poll(&mut self, now: Instant) -> Option<ScrollPass> {
        let deadline = self.timer.deadline()?;
        if !self.timer.fire(now) {
            return None;
        }
        match self.pending {
            ScrollPass::Fast => {
                self.pending = ScrollPass::Confirm;
                self.timer.arm(deadline, self.confirm);
                Some(ScrollPass::Fast)
            }
            ScrollPass::Confirm => {
                self.pending = ScrollPass::Fast;
                Some(ScrollPass::Confirm)
            }
        }
    }

    pub fn cancel(&mut self) {
        self.timer.cancel();
        self.pending = ScrollPass::Fast;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }
}

/// The earliest of several optional deadlines.
pub fn earliest(deadlines: impl IntoIterator<Item = Option<Instant>>) -> Option<Instant> {
    deadlines.into_iter().flatten().min()
}
