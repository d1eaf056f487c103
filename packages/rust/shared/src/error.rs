//! Error types for docbuild.
//!
//! Library crates use [`DocBuildError`] via `thiserror`.
//! App crates (cli) wrap this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all docbuild operations.
#[derive(Debug, thiserror::Error)]
pub enum DocBuildError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Malformed pandoc JSON document.
    #[error("document AST error: {message}")]
    Ast { message: String },

    /// A required external tool is not on `PATH`.
    #[error("{tool} not found on PATH. {hint}")]
    ToolMissing { tool: String, hint: String },

    /// PDF output was requested but no engine could be found.
    #[error("no PDF engine found. Install one of: {candidates}")]
    NoPdfEngine { candidates: String },

    /// The source directory holds no Markdown files.
    #[error("no .md files found in {}", dir.display())]
    NoSources { dir: PathBuf },

    /// A `--file` argument did not resolve to a source document.
    #[error("source file not found: {requested} (looked in {})", searched.display())]
    SourceNotFound {
        requested: String,
        searched: PathBuf,
        available: Vec<String>,
    },

    /// pandoc exited unsuccessfully.
    #[error("pandoc failed on {}:\n{stderr}", source_file.display())]
    Pandoc {
        source_file: PathBuf,
        stderr: String,
    },

    /// pandoc reported success but the output file is missing.
    #[error("{} was not created", path.display())]
    MissingOutput { path: PathBuf },

    /// Diagram rendering error (HTTP or renderer response).
    #[error("diagram error: {0}")]
    Diagram(String),

    /// Data validation error.
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DocBuildError>;

impl DocBuildError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create an AST error from any displayable message.
    pub fn ast(msg: impl Into<String>) -> Self {
        Self::Ast {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create a missing-tool error with an installation hint.
    pub fn tool_missing(tool: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::ToolMissing {
            tool: tool.into(),
            hint: hint.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
