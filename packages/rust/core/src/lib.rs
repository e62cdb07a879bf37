//! Outline tracking and visibility detection for OutlineLens.
//!
//! This crate ties extraction, change tracking, heading visibility and
//! notification delivery together into a [`PageSession`] that answers panel
//! requests and publishes outline updates as the page scrolls or mutates.

pub mod delivery;
pub mod schedule;
pub mod session;
pub mod special;
pub mod store;
pub mod toc;
pub mod tracker;
pub mod visibility;

pub use delivery::{ContextFlag, Messenger, Outbox, RecordingMessenger, RetryPolicy};
pub use session::{PageSession, SessionEvent};
pub use special::detect_special_page;
pub use store::{ConfigStore, FileConfigStore, StaticConfig};
pub use toc::{build_outline_tree, filter_tree, flatten};
pub use tracker::{OutlineTracker, TrackerEvent};
pub use visibility::{DetectorState, Direction, VisibilityDetector};
