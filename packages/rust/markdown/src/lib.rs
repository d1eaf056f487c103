//! Pre-build validation of Markdown sources.
//!
//! pandoc happily converts documents with dangling internal links or raw
//! Windows paths; the former produce dead links in every output, the latter
//! break LaTeX-based PDF engines. These checks run before any conversion
//! and report warnings without stopping the build.

mod checks;

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, instrument, warn};

use docbuild_shared::{DocBuildError, Result};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// An internal `[text](#anchor)` link with no matching heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokenLink {
    /// File name of the source document.
    pub file: String,
    /// 1-based line of the link.
    pub line: usize,
    /// Anchor without the leading `#`.
    pub target: String,
    /// Link text.
    pub text: String,
}

/// A Windows path outside code spans and fenced blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarePath {
    pub file: String,
    pub line: usize,
    pub path: String,
}

/// Findings of all checks over a set of sources.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub broken_links: Vec<BrokenLink>,
    pub bare_paths: Vec<BarePath>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.broken_links.is_empty() && self.bare_paths.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Convert heading text to the identifier pandoc generates for it.
///
/// Lowercases, drops punctuation other than hyphens, trims, and joins
/// whitespace runs with a single `-`.
pub fn heading_to_anchor(text: &str) -> String {
    static PUNCT_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("valid regex"));
    static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

    let lowered = text.to_lowercase();
    let cleaned = PUNCT_RE.replace_all(&lowered, "");
    WS_RE.replace_all(cleaned.trim(), "-").into_owned()
}

/// Check one document's internal links against its own headings.
pub fn find_broken_links(file: &str, content: &str) -> Vec<BrokenLink> {
    checks::broken_links(file, content)
}

/// Find bare Windows paths in one document.
pub fn find_bare_paths(file: &str, content: &str) -> Vec<BarePath> {
    checks::bare_paths(file, content)
}

/// Read every source file and run all checks, logging each finding.
#[instrument(skip_all, fields(files = files.len()))]
pub fn validate_sources(files: &[PathBuf]) -> Result<ValidationReport> {
    let mut report = ValidationReport::default();

    for path in files {
        let content =
            std::fs::read_to_string(path).map_err(|e| DocBuildError::io(path, e))?;
        let name = file_name(path);

        report
            .broken_links
            .extend(find_broken_links(&name, &content));
        report.bare_paths.extend(find_bare_paths(&name, &content));
    }

    for link in &report.broken_links {
        warn!(
            file = %link.file,
            line = link.line,
            target = %link.target,
            text = %link.text,
            "broken internal link"
        );
    }
    for bare in &report.bare_paths {
        warn!(
            file = %bare.file,
            line = bare.line,
            path = %bare.path,
            "bare Windows path (wrap in backticks)"
        );
    }

    debug!(
        broken_links = report.broken_links.len(),
        bare_paths = report.bare_paths.len(),
        "source validation complete"
    );

    Ok(report)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_matches_pandoc_style() {
        assert_eq!(heading_to_anchor("Getting Started"), "getting-started");
        assert_eq!(heading_to_anchor("  What's New?  "), "whats-new");
        assert_eq!(heading_to_anchor("Step 1 - Setup"), "step-1---setup");
        assert_eq!(heading_to_anchor("snake_case Name"), "snake_case-name");
        assert_eq!(heading_to_anchor("Über Café"), "über-café");
    }

    #[test]
    fn validate_sources_reads_files() {
        let dir = std::env::temp_dir().join(format!("docbuild-validate-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).expect("create temp dir");

        let good = dir.join("good.md");
        std::fs::write(&good, "# Intro\n\n[back](#intro)\n").expect("write good");
        let bad = dir.join("bad.md");
        std::fs::write(&bad, "# Budget\n\n[x](#missing)\nCopy to C:\\Temp\\out\n")
            .expect("write bad");

        let report = validate_sources(&[good, bad]).expect("validate");
        assert!(!report.is_clean());
        assert_eq!(report.broken_links.len(), 1);
        assert_eq!(report.broken_links[0].file, "bad.md");
        assert_eq!(report.bare_paths.len(), 1);
        assert_eq!(report.bare_paths[0].line, 4);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_file_is_io_error() {
        let missing = PathBuf::from("/nonexistent/docbuild/none.md");
        let err = validate_sources(&[missing]).unwrap_err();
        assert!(matches!(err, DocBuildError::Io { .. }));
    }
}
