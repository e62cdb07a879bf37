//! Messages crossing the page boundary.
//!
//! The relay layer routes these between the page, the background process and
//! the panel; only their logical shape matters here. The `action` tag and
//! camelCase field names match what the relay expects on the wire.

use serde::{Deserialize, Serialize};

use crate::types::Outline;

/// Requests the page answers (panel or relay → page).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    /// Return the current outline, recomputed on demand.
    GetOutline,
    /// Scroll the given heading into view and highlight it.
    ScrollTo { id: String },
    /// Return the last published active heading id.
    GetActiveHeading,
    /// Re-run visible heading detection now.
    DetectVisibleHeading,
    /// Persisted configuration changed; reload and re-publish.
    ConfigUpdated,
    /// The extension is going away; disconnect everything.
    ExtensionInvalidated,
}

/// Replies to a [`Request`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Outline {
        outline: Outline,
    },
    Status {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    ActiveHeading {
        #[serde(rename = "headingId")]
        heading_id: Option<String>,
    },
}

impl Response {
    pub fn ok() -> Self {
        Self::Status {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self::Status {
            success: false,
            error: Some(error.into()),
        }
    }

    /// Whether this is a successful status (outline and id replies count as success).
    pub fn is_success(&self) -> bool {
        match self {
            Self::Status { success, .. } => *success,
            _ => true,
        }
    }
}

/// One-way notifications published by the page (page → relay → panel).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Notification {
    /// The outline changed. An empty outline means "no headings".
    UpdateOutline { outline: Outline },
    /// The reading position moved to another heading.
    ActiveHeading {
        #[serde(rename = "headingId")]
        heading_id: String,
    },
    /// The page cannot be outlined.
    SpecialPage {
        #[serde(rename = "pageType")]
        page_type: String,
        message: String,
    },
}

impl Notification {
    /// Short name for tracing.
    pub fn action(&self) -> &'static str {
        match self {
            Self::UpdateOutline { .. } => "updateOutline",
            Self::ActiveHeading { .. } => "activeHeading",
            Self::SpecialPage { .. } => "specialPage",
        }
    }
}
