//! Application configuration for OutlineLens.
//!
//! User config lives at `~/.outlinelens/outlinelens.toml`. It stands in for
//! the extension's persisted settings: the page-wide detection domains, the
//! special-site selectors and the special-page table. The engine only reads it.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{OutlineError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "outlinelens.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".outlinelens";

// ---------------------------------------------------------------------------
// Config structs (matching outlinelens.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Page-wide heading detection.
    #[serde(default)]
    pub detection: DetectionConfig,

    /// Custom selectors for the feed-reader profiles.
    #[serde(default)]
    pub selectors: SiteSelectors,

    /// Debounce and retry timings.
    #[serde(default)]
    pub timing: TimingConfig,

    /// URL prefixes that cannot be outlined.
    #[serde(default = "default_special_pages")]
    pub special_pages: Vec<SpecialPage>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            detection: DetectionConfig::default(),
            selectors: SiteSelectors::default(),
            timing: TimingConfig::default(),
            special_pages: default_special_pages(),
        }
    }
}

/// `[detection]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Domains that opt into "detect all page headings" mode.
    /// A domain also covers its subdomains.
    #[serde(default)]
    pub all_headings_domains: Vec<String>,
}

/// `[selectors]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteSelectors {
    /// Article container on Inoreader.
    #[serde(default = "default_inoreader_selector")]
    pub inoreader: String,

    /// Article container on Feedly.
    #[serde(default = "default_feedly_selector")]
    pub feedly: String,
}

impl Default for SiteSelectors {
    fn default() -> Self {
        Self {
            inoreader: default_inoreader_selector(),
            feedly: default_feedly_selector(),
        }
    }
}

fn default_inoreader_selector() -> String {
    ".article_content".into()
}
fn default_feedly_selector() -> String {
    ".entryBody".into()
}

/// `[timing]` section. All values in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Quiet period after the last DOM mutation before recomputing.
    #[serde(default = "default_mutation_debounce")]
    pub mutation_debounce_ms: u64,

    /// Delay of the fast detection pass after scrolling stops.
    #[serde(default = "default_scroll_settle")]
    pub scroll_settle_ms: u64,

    /// Delay of the confirming pass after the fast pass.
    #[serde(default = "default_scroll_confirm")]
    pub scroll_confirm_ms: u64,

    /// How long detection stays suspended after a click-to-scroll.
    #[serde(default = "default_manual_scroll")]
    pub manual_scroll_ms: u64,

    /// How long a scrolled-to heading stays highlighted.
    #[serde(default = "default_highlight")]
    pub highlight_ms: u64,

    /// Second detection pass after the session starts.
    #[serde(default = "default_initial_redetect")]
    pub initial_redetect_ms: u64,

    /// Maximum delivery attempts per notification.
    #[serde(default = "default_delivery_attempts")]
    pub delivery_attempts: u32,

    /// Linear backoff unit between delivery attempts.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            mutation_debounce_ms: default_mutation_debounce(),
            scroll_settle_ms: default_scroll_settle(),
            scroll_confirm_ms: default_scroll_confirm(),
            manual_scroll_ms: default_manual_scroll(),
            highlight_ms: default_highlight(),
            initial_redetect_ms: default_initial_redetect(),
            delivery_attempts: default_delivery_attempts(),
            retry_backoff_ms: default_retry_backoff(),
        }
    }
}

fn default_mutation_debounce() -> u64 {
    200
}
fn default_scroll_settle() -> u64 {
    50
}
fn default_scroll_confirm() -> u64 {
    200
}
fn default_manual_scroll() -> u64 {
    1000
}
fn default_highlight() -> u64 {
    3000
}
fn default_initial_redetect() -> u64 {
    500
}
fn default_delivery_attempts() -> u32 {
    3
}
fn default_retry_backoff() -> u64 {
    1000
}

/// `[[special_pages]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialPage {
    /// URL prefix to match.
    pub url: String,
    /// Short label shown in the panel.
    #[serde(rename = "type")]
    pub page_type: String,
    /// User-facing explanation.
    pub message: String,
}

impl SpecialPage {
    fn new(url: &str, page_type: &str, message: &str) -> Self {
        Self {
            url: url.into(),
            page_type: page_type.into(),
            message: message.into(),
        }
    }
}

/// The built-in special-page table. More specific prefixes come first.
pub fn default_special_pages() -> Vec<SpecialPage> {
    const INTERNAL: &str = "浏览器内部页面不支持大纲检测，请访问普通网页";
    vec![
        SpecialPage::new(
            "chrome://extensions/",
            "扩展管理页面",
            "扩展管理页面不支持大纲检测，请访问普通网页",
        ),
        SpecialPage::new(
            "chrome://",
            "Chrome内部页面",
            "Chrome内部页面不支持大纲检测，请访问普通网页",
        ),
        SpecialPage::new(
            "chrome-extension://",
            "扩展页面",
            "扩展页面不支持大纲检测，请访问普通网页",
        ),
        SpecialPage::new("about:", "浏览器内部页面", INTERNAL),
        SpecialPage::new("edge://", "Edge设置页面", INTERNAL),
        SpecialPage::new(
            "file://",
            "本地文件",
            "本地文件页面不支持大纲检测，请访问普通网页",
        ),
        SpecialPage::new("data:", "数据页面", "数据页面不支持大纲检测，请访问普通网页"),
        SpecialPage::new(
            "view-source:",
            "源代码页面",
            "源代码页面不支持大纲检测，请访问普通网页",
        ),
        SpecialPage::new("blob:", "Blob页面", "Blob页面不支持大纲检测，请访问普通网页"),
        SpecialPage::new(
            "devtools://",
            "开发者工具页面",
            "开发者工具页面不支持大纲检测，请访问普通网页",
        ),
        SpecialPage::new(
            "https://chrome.google.com/webstore",
            "Chrome商店页面",
            "Chrome商店页面不支持大纲检测，请访问普通网页",
        ),
        SpecialPage::new(
            "https://chrome.google.com/extensions",
            "扩展管理页面",
            "扩展管理页面不支持大纲检测，请访问普通网页",
        ),
        SpecialPage::new(
            "https://chromewebstore.google.com",
            "Chrome商店页面",
            "Chrome商店页面不支持大纲检测，请访问普通网页",
        ),
    ]
}

// ---------------------------------------------------------------------------
// Runtime configs (derived from AppConfig)
// ---------------------------------------------------------------------------

/// Extraction settings, derived from [`AppConfig`].
#[derive(Debug, Clone, Default)]
pub struct ExtractConfig {
    /// Normalized page-wide domains.
    pub all_headings_domains: Vec<String>,
    /// Feed-reader selectors.
    pub selectors: SiteSelectors,
}

impl ExtractConfig {
    /// Whether `host` (or a parent domain of it) opted into page-wide detection.
    pub fn page_wide_for(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        self.all_headings_domains.iter().any(|domain| {
            host == *domain
                || host
                    .strip_suffix(domain.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }
}

impl From<&AppConfig> for ExtractConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            all_headings_domains: config
                .detection
                .all_headings_domains
                .iter()
                .map(|d| clean_domain(d))
                .filter(|d| !d.is_empty())
                .collect(),
            selectors: config.selectors.clone(),
        }
    }
}

/// Session timings, derived from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct SessionTiming {
    pub mutation_debounce: Duration,
    pub scroll_settle: Duration,
    pub scroll_confirm: Duration,
    pub manual_scroll: Duration,
    pub highlight: Duration,
    pub initial_redetect: Duration,
    pub delivery_attempts: u32,
    pub retry_backoff: Duration,
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for SessionTiming {
    fn from(config: &AppConfig) -> Self {
        let t = &config.timing;
        Self {
            mutation_debounce: Duration::from_millis(t.mutation_debounce_ms),
            scroll_settle: Duration::from_millis(t.scroll_settle_ms),
            scroll_confirm: Duration::from_millis(t.scroll_confirm_ms),
            manual_scroll: Duration::from_millis(t.manual_scroll_ms),
            highlight: Duration::from_millis(t.highlight_ms),
            initial_redetect: Duration::from_millis(t.initial_redetect_ms),
            delivery_attempts: t.delivery_attempts.max(1),
            retry_backoff: Duration::from_millis(t.retry_backoff_ms),
        }
    }
}

/// Normalize user input into a bare domain: drop the scheme, a leading `www.`,
/// any path and port, and lowercase the rest.
pub fn clean_domain(input: &str) -> String {
    static PREFIX_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)^(https?://)?(www\.)?").expect("valid regex"));

    let stripped = PREFIX_RE.replace(input.trim(), "");
    let host = stripped.split('/').next().unwrap_or_default();
    let host = host.split(':').next().unwrap_or_default();
    host.trim().to_lowercase()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.outlinelens/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| OutlineError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.outlinelens/outlinelens.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| OutlineError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content)
        .map_err(|e| OutlineError::config(format!("failed to parse {}: {e}", path.display())))?;
    validate_config(&config)?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| OutlineError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| OutlineError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| OutlineError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Reject configs the engine cannot use.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.selectors.inoreader.trim().is_empty() || config.selectors.feedly.trim().is_empty() {
        return Err(OutlineError::validation("site selectors must not be empty"));
    }
    if let Some(page) = config.special_pages.iter().find(|p| p.url.is_empty()) {
        return Err(OutlineError::validation(format!(
            "special page `{}` has an empty url prefix",
            page.page_type
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("mutation_debounce_ms"));
        assert!(toml_str.contains(".article_content"));
        assert!(toml_str.contains("chrome://extensions/"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.timing.scroll_settle_ms, 50);
        assert_eq!(parsed.special_pages.len(), 13);
        assert_eq!(parsed.selectors.feedly, ".entryBody");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[detection]
all_headings_domains = ["https://www.Example.com/docs", "wiki.org"]

[selectors]
feedly = ".customBody"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.selectors.inoreader, ".article_content");
        assert_eq!(config.selectors.feedly, ".customBody");
        assert_eq!(config.special_pages.len(), 13);

        let extract = ExtractConfig::from(&config);
        assert_eq!(extract.all_headings_domains, vec!["example.com", "wiki.org"]);
    }

    #[test]
    fn page_wide_matches_subdomains_only() {
        let extract = ExtractConfig {
            all_headings_domains: vec!["example.com".into()],
            ..Default::default()
        };
        assert!(extract.page_wide_for("example.com"));
        assert!(extract.page_wide_for("docs.Example.com"));
        assert!(!extract.page_wide_for("notexample.com"));
        assert!(!extract.page_wide_for("example.com.evil.net"));
    }

    #[test]
    fn clean_domain_strips_decorations() {
        assert_eq!(clean_domain("https://www.Rust-Lang.org:443/learn"), "rust-lang.org");
        assert_eq!(clean_domain("  docs.rs "), "docs.rs");
        assert_eq!(clean_domain("http://"), "");
    }

    #[test]
    fn session_timing_from_config() {
        let mut config = AppConfig::default();
        config.timing.delivery_attempts = 0;
        let timing = SessionTiming::from(&config);
        assert_eq!(timing.mutation_debounce, Duration::from_millis(200));
        assert_eq!(timing.manual_scroll, Duration::from_secs(1));
        assert_eq!(timing.delivery_attempts, 1);
    }

    #[test]
    fn empty_selector_is_rejected() {
        let mut config = AppConfig::default();
        config.selectors.inoreader = "  ".into();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("selectors"));
    }
}
