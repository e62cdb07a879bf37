//! Outbound notification delivery.
//!
//! Publishing is fire-and-forget: each notification is spawned onto a
//! [`JoinSet`] and retried with linear backoff on transient failures. An
//! invalidated extension context stops retries and flips the shared
//! [`ContextFlag`] so the session can tear itself down.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, instrument, warn};

use outlinelens_shared::{Notification, OutlineError, Result, SessionTiming};

// ---------------------------------------------------------------------------
// Messenger
// ---------------------------------------------------------------------------

/// The channel to the relay.
pub trait Messenger: Send + Sync + 'static {
    /// Deliver one notification. Return [`OutlineError::ContextInvalidated`]
    /// when the other side is gone for good.
    fn send(&self, notification: Notification) -> impl Future<Output = Result<()>> + Send;
}

/// Shared "extension context is still valid" flag.
#[derive(Debug, Clone)]
pub struct ContextFlag(Arc<AtomicBool>);

impl Default for ContextFlag {
    fn default() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }
}

impl ContextFlag {
    pub fn is_valid(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn invalidate(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Attempt count and backoff step for deliveries.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    /// Wait `backoff * attempt` after a failed attempt.
    pub backoff: Duration,
}

impl From<&SessionTiming> for RetryPolicy {
    fn from(timing: &SessionTiming) -> Self {
        Self {
            attempts: timing.delivery_attempts.max(1),
            backoff: timing.retry_backoff,
        }
    }
}

/// Deliver with bounded retry. Stops early once the context is invalid.
#[instrument(skip_all, fields(action = notification.action()))]
pub async fn send_with_retry<M: Messenger>(
    messenger: &M,
    notification: Notification,
    policy: RetryPolicy,
    context: &ContextFlag,
) -> Result<()> {
    let attempts = policy.attempts.max(1);
    let mut attempt = 0;
    loop {
        if !context.is_valid() {
            return Err(OutlineError::ContextInvalidated);
        }
        attempt += 1;
        match messenger.send(notification.clone()).await {
            Ok(()) => return Ok(()),
            Err(OutlineError::ContextInvalidated) => {
                warn!("extension context invalidated, dropping delivery");
                context.invalidate();
                return Err(OutlineError::ContextInvalidated);
            }
            Err(e) if e.is_transient() && attempt < attempts => {
                debug!(attempt, error = %e, "delivery failed, retrying");
                tokio::time::sleep(policy.backoff * attempt).await;
            }
            Err(e) => {
                debug!(attempt, error = %e, "delivery failed, giving up");
                return Err(e);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Outbox
// ---------------------------------------------------------------------------

/// Spawns deliveries and keeps their handles until flushed.
pub struct Outbox<M> {
    messenger: Arc<M>,
    policy: RetryPolicy,
    context: ContextFlag,
    tasks: JoinSet<()>,
}

impl<M: Messenger> Outbox<M> {
    pub fn new(messenger: Arc<M>, policy: RetryPolicy, context: ContextFlag) -> Self {
        Self {
            messenger,
            policy,
            context,
            tasks: JoinSet::new(),
        }
    }

    pub fn set_policy(&mut self, policy: RetryPolicy) {
        self.policy = policy;
    }

    /// Spawn a delivery; failures are logged and dropped.
    pub fn post(&mut self, notification: Notification) {
        self.reap();
        if !self.context.is_valid() {
            debug!(action = notification.action(), "context invalid, not posting");
            return;
        }
        let messenger = Arc::clone(&self.messenger);
        let policy = self.policy;
        let context = self.context.clone();
        self.tasks.spawn(async move {
            if let Err(e) = send_with_retry(&*messenger, notification, policy, &context).await {
                debug!(error = %e, "notification dropped");
            }
        });
    }

    /// Wait for every in-flight delivery to finish.
    pub async fn flush(&mut self) {
        while self.tasks.join_next().await.is_some() {}
    }

    /// Drop handles of deliveries that have already finished.
    pub fn reap(&mut self) {
        while self.tasks.try_join_next().is_some() {}
    }

    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    pub fn abort_all(&mut self) {
        self.tasks.abort_all();
    }
}

// ---------------------------------------------------------------------------
// RecordingMessenger
// ---------------------------------------------------------------------------

/// In-memory messenger that records every delivered notification.
///
/// Failures can be queued up front; each attempt consumes one.
#[derive(Debug, Default)]
pub struct RecordingMessenger {
    delivered: Mutex<Vec<Notification>>,
    failures: Mutex<VecDeque<OutlineError>>,
    attempts: Mutex<usize>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next attempt fail with `error`.
    pub fn fail_next(&self, error: OutlineError) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.push_back(error);
        }
    }

    pub fn delivered(&self) -> Vec<Notification> {
        self.delivered
            .lock()
            .map(|d| d.clone())
            .unwrap_or_default()
    }

    /// Ids of delivered `activeHeading` notifications, in delivery order.
    pub fn active_ids(&self) -> Vec<String> {
        self.delivered()
            .into_iter()
            .filter_map(|n| match n {
                Notification::ActiveHeading { heading_id } => Some(heading_id),
                _ => None,
            })
            .collect()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.lock().map(|a| *a).unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut delivered) = self.delivered.lock() {
            delivered.clear();
        }
    }

    fn record(&self, notification: Notification) -> Result<()> {
        if let Ok(mut attempts) = self.attempts.lock() {
            *attempts += 1;
        }
        if let Some(error) = self.failures.lock().ok().and_then(|mut f| f.pop_front()) {
            return Err(error);
        }
        self.delivered
            .lock()
            .map_err(|_| OutlineError::Delivery("recorder poisoned".into()))?
            .push(notification);
        Ok(())
    }
}

impl Messenger for RecordingMessenger {
    fn send(&self, notification: Notification) -> impl Future<Output = Result<()>> + Send {
        std::future::ready(self.record(notification))
    }
}
