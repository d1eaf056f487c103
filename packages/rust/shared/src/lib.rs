//! Shared types, error model, configuration, and document model for docbuild.
//!
//! This crate is the foundation depended on by all other docbuild crates.
//! It provides:
//! - [`DocBuildError`], the unified error type
//! - Domain types ([`OutputFormat`], [`PdfEngine`])
//! - Configuration ([`AppConfig`], [`ProjectLayout`], config loading)
//! - The pandoc document model ([`Document`], [`Block`], [`Inline`])

pub mod ast;
pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use ast::{Attr, Block, Document, Inline, Node, Target, stringify};
pub use config::{
    AppConfig, CONFIG_FILE_NAME, DiagramsConfig, PandocConfig, PathsConfig, ProjectLayout,
    TocOptions, config_file_path, init_config, load_config, load_config_from, validate_config,
};
pub use error::{DocBuildError, Result};
pub use types::{OutputFormat, PdfEngine, engine_list};
