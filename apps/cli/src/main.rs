//! OutlineLens CLI: heading outlines for web pages.
//!
//! Extracts outlines from saved HTML, explains which region was treated as
//! the article, and replays reading sessions against the outline engine.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
