//! pandoc JSON filter that numbers headings and injects a table of contents.
//!
//! Usage: `pandoc input.md --filter docbuild-toc -o output.docx`. pandoc
//! passes the target format as the first argument; the filter reads the
//! document AST on stdin and writes the transformed AST to stdout. Options
//! come from `docbuild.toml` in the working directory, when present.

use std::io::{Read, Write};

use color_eyre::eyre::{Result, WrapErr};
use docbuild_core::toc;
use docbuild_shared::load_config;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt};

fn main() -> Result<()> {
    color_eyre::install()?;

    // stdout carries the document, so logs go to stderr.
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docbuild=warn"));
    fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let target_format = std::env::args().nth(1);
    debug!(format = target_format.as_deref().unwrap_or("unknown"), "toc filter invoked");

    let cwd = std::env::current_dir().wrap_err("cannot determine working directory")?;
    let config = load_config(&cwd)?;

    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .wrap_err("failed to read document from stdin")?;

    let output = toc::filter_json(&input, &config.toc)?;

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(output.as_bytes())
        .and_then(|()| stdout.flush())
        .wrap_err("failed to write document to stdout")?;

    Ok(())
}
