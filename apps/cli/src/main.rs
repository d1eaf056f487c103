//! docbuild CLI: Markdown documentation builds through pandoc.
//!
//! Renders Mermaid diagrams, numbers headings, injects a table of contents,
//! and produces DOCX, PDF, and HTML outputs.

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
