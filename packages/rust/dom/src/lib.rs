//! Headless page model for the outline engine.
//!
//! This crate provides:
//! - [`Page`]: a parsed document with estimated layout, scroll state and
//!   a weak registry of generated heading ids
//! - [`Rect`] / [`Viewport`]: viewport-relative geometry
//! - [`MutationRecord`]: what a DOM mutation observer would report

mod ids;
pub mod layout;
mod mutation;
mod page;

pub use ego_tree::NodeId;
pub use ids::GENERATED_ID_PREFIX;
pub use mutation::{MutationKind, MutationRecord};
pub use page::{Page, Rect, Viewport};
