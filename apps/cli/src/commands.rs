//! CLI command definitions, routing, and tracing setup.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use outlinelens_core::{
    ConfigStore, FileConfigStore, Messenger, PageSession, SessionEvent, build_outline_tree,
    detect_special_page, filter_tree,
};
use outlinelens_dom::{NodeId, Page, Viewport};
use outlinelens_extract::{OutlineExtractor, locate_article, rank_candidates};
use outlinelens_shared::{
    AppConfig, ExtractConfig, Notification, OutlineError, OutlineNode, Request, init_config,
};
use tokio::sync::{mpsc, oneshot};
use tracing::info;
use url::Url;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// OutlineLens: heading outlines for web pages.
#[derive(Parser)]
#[command(
    name = "outlinelens",
    version,
    about = "Extract heading outlines from HTML pages and simulate reading sessions.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.outlinelens/outlinelens.toml).
    #[arg(long, env = "OUTLINELENS_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Outline output format.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum OutputFormat {
    /// Indented heading list.
    Text,
    /// The flat outline as JSON.
    Json,
    /// The nested outline tree as JSON.
    Tree,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Extract the heading outline of an HTML file.
    Outline {
        /// HTML file to read.
        file: PathBuf,

        /// URL the page was served from.
        #[arg(long)]
        url: Url,

        /// Viewport size as WIDTHxHEIGHT.
        #[arg(long, default_value = "1280x800")]
        viewport: Viewport,

        /// Take every semantic heading on the page.
        #[arg(long)]
        page_wide: bool,

        /// Output format.
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,

        /// Keep only headings matching this text (and their ancestors).
        #[arg(long)]
        filter: Option<String>,
    },

    /// Show article candidates and the chosen content region.
    Article {
        /// HTML file to read.
        file: PathBuf,

        /// URL the page was served from.
        #[arg(long)]
        url: Url,

        /// Viewport size as WIDTHxHEIGHT.
        #[arg(long, default_value = "1280x800")]
        viewport: Viewport,
    },

    /// Report whether a URL is a page that cannot be outlined.
    Classify {
        /// URL to classify.
        url: String,
    },

    /// Run a reading session and print notifications as JSON lines.
    Watch {
        /// HTML file to read.
        file: PathBuf,

        /// URL the page was served from.
        #[arg(long)]
        url: Url,

        /// Viewport size as WIDTHxHEIGHT.
        #[arg(long, default_value = "1280x800")]
        viewport: Viewport,

        /// Scroll offsets to visit, in order.
        #[arg(long, num_args = 1..)]
        scroll: Vec<f64>,

        /// Pause between scroll offsets, in milliseconds.
        #[arg(long, default_value = "400")]
        interval_ms: u64,

        /// Headings to click in the panel after scrolling.
        #[arg(long)]
        jump: Vec<String>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr so JSON output
/// on stdout stays machine-readable.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "outlinelens=info",
        1 => "outlinelens=debug",
        _ => "outlinelens=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let store = match cli.config {
        Some(path) => FileConfigStore::at(path),
        None => FileConfigStore::new(),
    };

    match cli.command {
        Command::Outline {
            file,
            url,
            viewport,
            page_wide,
            format,
            filter,
        } => cmd_outline(&store, &file, url, viewport, page_wide, format, filter.as_deref()),
        Command::Article {
            file,
            url,
            viewport,
        } => cmd_article(&store, &file, url, viewport),
        Command::Classify { url } => cmd_classify(&store, &url),
        Command::Watch {
            file,
            url,
            viewport,
            scroll,
            interval_ms,
            jump,
        } => {
            let pause = Duration::from_millis(interval_ms);
            cmd_watch(store, &file, url, viewport, scroll, jump, pause).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&store),
        },
    }
}

fn load_page(file: &Path, url: Url, viewport: Viewport) -> Result<Page> {
    let html = std::fs::read_to_string(file)
        .map_err(|e| eyre!("cannot read '{}': {e}", file.display()))?;
    Ok(Page::parse(&html, url, viewport)?)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_outline(
    store: &FileConfigStore,
    file: &Path,
    url: Url,
    viewport: Viewport,
    page_wide: bool,
    format: OutputFormat,
    filter: Option<&str>,
) -> Result<()> {
    let config = store.load()?;
    let mut extract = ExtractConfig::from(&config);
    let mut page = load_page(file, url, viewport)?;
    if page_wide {
        extract.all_headings_domains.push(page.host().to_ascii_lowercase());
    }

    let extraction = OutlineExtractor::new(extract).extract(&mut page);
    info!(
        strategy = %extraction.strategy,
        headings = extraction.outline.len(),
        "outline extracted"
    );

    let mut tree = build_outline_tree(&extraction.outline);
    if let Some(query) = filter {
        tree.tree = filter_tree(&tree.tree, query);
    }

    match format {
        OutputFormat::Text => {
            if tree.tree.is_empty() {
                println!("(no headings)");
            }
            print_nodes(&tree.tree, 0);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&extraction.outline)?);
        }
        OutputFormat::Tree => {
            println!("{}", serde_json::to_string_pretty(&tree.tree)?);
        }
    }
    Ok(())
}

fn print_nodes(nodes: &[OutlineNode], depth: usize) {
    for node in nodes {
        println!(
            "{}{}  [h{} #{}]",
            "  ".repeat(depth),
            node.item.text,
            node.item.level,
            node.item.id
        );
        print_nodes(&node.children, depth + 1);
    }
}

fn cmd_article(store: &FileConfigStore, file: &Path, url: Url, viewport: Viewport) -> Result<()> {
    let config = store.load()?;
    let page = load_page(file, url, viewport)?;

    println!("  Candidates:");
    for candidate in rank_candidates(&page) {
        let rect = page.rect(candidate.node);
        println!(
            "    {:>12.1}  {}  ({:.0}x{:.0}, {} links)",
            candidate.score,
            describe(&page, candidate.node),
            rect.width,
            page.scroll_height(candidate.node),
            page.link_count(candidate.node)
        );
    }

    match locate_article(&page, &config.selectors)? {
        Some(node) => println!("  Article:    {}", describe(&page, node)),
        None => println!("  Article:    (none, whole page fallback)"),
    }
    Ok(())
}

/// `tag#id.class` for an element.
fn describe(page: &Page, node: NodeId) -> String {
    let Some(el) = page.element(node) else {
        return "(detached)".into();
    };
    let mut label = el.value().name().to_string();
    if let Some(id) = el.value().id() {
        label.push('#');
        label.push_str(id);
    }
    for class in el.value().classes() {
        label.push('.');
        label.push_str(class);
    }
    label
}

fn cmd_classify(store: &FileConfigStore, url: &str) -> Result<()> {
    let config = store.load()?;
    match detect_special_page(url, &config.special_pages) {
        Some(info) => {
            println!("  Type:    {}", info.page_type);
            println!("  Message: {}", info.message);
        }
        None => println!("  Ordinary page: outline detection is supported"),
    }
    Ok(())
}

async fn cmd_watch(
    store: FileConfigStore,
    file: &Path,
    url: Url,
    viewport: Viewport,
    scroll: Vec<f64>,
    jump: Vec<String>,
    pause: Duration,
) -> Result<()> {
    let page = load_page(file, url, viewport)?;
    let session = PageSession::new(page, store, Arc::new(StdoutMessenger));
    let (tx, rx) = mpsc::channel(16);

    info!(positions = scroll.len(), jumps = jump.len(), "starting session");

    let driver = tokio::spawn(async move {
        let closed = |_| eyre!("session stopped early");
        for y in scroll {
            tx.send(SessionEvent::Scroll(y)).await.map_err(closed)?;
            tokio::time::sleep(pause).await;
        }
        for id in jump {
            let (reply, answer) = oneshot::channel();
            tx.send(SessionEvent::Request(Request::ScrollTo { id: id.clone() }, reply))
                .await
                .map_err(closed)?;
            let response = answer.await?;
            if !response.is_success() {
                eprintln!("scrollTo {id}: {}", serde_json::to_string(&response)?);
            }
            tokio::time::sleep(pause).await;
        }
        tx.send(SessionEvent::Shutdown).await.map_err(closed)?;
        Ok::<_, color_eyre::Report>(())
    });

    let session = session.run(rx).await;
    driver.await??;

    info!(
        active = session.active_heading().unwrap_or("none"),
        headings = session.outline().len(),
        "session finished"
    );
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(store: &FileConfigStore) -> Result<()> {
    let config: AppConfig = store.load()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Stdout messenger
// ---------------------------------------------------------------------------

/// Prints every notification as one JSON line.
struct StdoutMessenger;

impl Messenger for StdoutMessenger {
    fn send(
        &self,
        notification: Notification,
    ) -> impl Future<Output = outlinelens_shared::Result<()>> + Send {
        let line = serde_json::to_string(&notification)
            .map(|json| println!("{json}"))
            .map_err(|e| OutlineError::Delivery(e.to_string()));
        std::future::ready(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_outline_flags() {
        let cli = Cli::parse_from([
            "outlinelens",
            "outline",
            "page.html",
            "--url",
            "https://example.com/post",
            "--viewport",
            "1024x768",
            "--format",
            "tree",
        ]);
        match cli.command {
            Command::Outline {
                viewport, format, ..
            } => {
                assert_eq!(viewport.width, 1024.0);
                assert!(matches!(format, OutputFormat::Tree));
            }
            _ => panic!("expected outline"),
        }
    }

    #[test]
    fn watch_takes_many_scroll_offsets() {
        let cli = Cli::parse_from([
            "outlinelens",
            "watch",
            "page.html",
            "--url",
            "https://example.com/post",
            "--scroll",
            "0",
            "900",
            "2100",
        ]);
        match cli.command {
            Command::Watch { scroll, .. } => assert_eq!(scroll, vec![0.0, 900.0, 2100.0]),
            _ => panic!("expected watch"),
        }
    }

    #[test]
    fn describe_names_tag_id_and_classes() {
        let page = Page::parse(
            "<body><div id='main' class='post wide'>x</div></body>",
            Url::parse("https://example.com/").unwrap(),
            Viewport::default(),
        )
        .unwrap();
        let div = page
            .descendant_elements(page.document_element())
            .into_iter()
            .find(|n| page.tag_name(*n) == Some("div"))
            .unwrap();
        let label = describe(&page, div);
        assert!(label.starts_with("div#main"));
        assert!(label.contains(".post") && label.contains(".wide"));
    }
}
