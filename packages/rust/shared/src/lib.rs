//! Shared types, error model, and configuration for OutlineLens.
//!
//! This crate is the foundation depended on by all other OutlineLens crates.
//! It provides:
//! - [`OutlineError`]: the unified error type
//! - Domain types ([`HeadingItem`], [`Outline`], [`OutlineNode`])
//! - Boundary messages ([`Request`], [`Response`], [`Notification`])
//! - Configuration ([`AppConfig`], [`ExtractConfig`], [`SessionTiming`], config loading)

pub mod config;
pub mod error;
pub mod message;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DetectionConfig, ExtractConfig, SessionTiming, SiteSelectors, SpecialPage,
    TimingConfig, clean_domain, config_dir, config_file_path, default_special_pages, init_config,
    load_config, load_config_from, validate_config,
};
pub use error::{OutlineError, Result};
pub use message::{Notification, Request, Response};
pub use types::{HeadingItem, MAX_LEVEL, Outline, OutlineNode, OutlineTree, SpecialPageInfo};
