//! Detection of the external tools a build depends on.
//!
//! pandoc does all conversion work; PDF output additionally needs one of
//! the engines in [`PdfEngine::ALL`]. Tools are looked up on `PATH` once
//! per run and the resolved paths are passed around as a [`ToolSet`].

use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use docbuild_shared::{DocBuildError, PdfEngine, Result, engine_list};

/// Executable name of pandoc.
pub const PANDOC: &str = "pandoc";

/// Hint shown when pandoc is missing.
pub const PANDOC_HINT: &str = "Install pandoc 3.1.3+.";

/// Resolved locations of pandoc and the PDF engines.
#[derive(Debug, Clone, Default)]
pub struct ToolSet {
    pub pandoc: Option<PathBuf>,
    pub engines: BTreeMap<PdfEngine, PathBuf>,
}

impl ToolSet {
    /// Look every tool up on the process `PATH`.
    #[instrument]
    pub fn detect() -> Self {
        let path = std::env::var_os("PATH").unwrap_or_default();
        let tools = Self::from_search_path(&path);
        debug!(
            pandoc = ?tools.pandoc,
            engines = tools.engines.len(),
            "tool detection complete"
        );
        tools
    }

    /// Look every tool up on an explicit `PATH`-style search path.
    pub fn from_search_path(path: &OsStr) -> Self {
        let pandoc = find_executable(PANDOC, path);
        let engines = PdfEngine::ALL
            .into_iter()
            .filter_map(|engine| find_executable(engine.name(), path).map(|p| (engine, p)))
            .collect();
        Self { pandoc, engines }
    }

    pub fn engine_path(&self, engine: PdfEngine) -> Option<&Path> {
        self.engines.get(&engine).map(PathBuf::as_path)
    }

    /// pandoc's path, or a `ToolMissing` error.
    pub fn require_pandoc(&self) -> Result<&Path> {
        self.pandoc
            .as_deref()
            .ok_or_else(|| DocBuildError::tool_missing(PANDOC, PANDOC_HINT))
    }

    /// First available engine in `preference` order.
    pub fn best_pdf_engine(&self, preference: &[PdfEngine]) -> Option<PdfEngine> {
        preference
            .iter()
            .copied()
            .find(|e| self.engines.contains_key(e))
    }

    /// The engine to build PDFs with.
    ///
    /// An explicit request must be installed; otherwise the best available
    /// engine is chosen.
    pub fn resolve_pdf_engine(
        &self,
        requested: Option<PdfEngine>,
        preference: &[PdfEngine],
    ) -> Result<PdfEngine> {
        if let Some(engine) = requested {
            if !self.engines.contains_key(&engine) {
                return Err(DocBuildError::tool_missing(
                    engine.name(),
                    "Requested PDF engine is not installed.",
                ));
            }
            return Ok(engine);
        }

        self.best_pdf_engine(preference)
            .ok_or_else(|| DocBuildError::NoPdfEngine {
                candidates: engine_list(preference),
            })
    }
}

/// Version string reported by `pandoc --version`, if pandoc runs.
pub async fn pandoc_version(pandoc: &Path) -> Option<String> {
    let output = tokio::process::Command::new(pandoc)
        .arg("--version")
        .output()
        .await
        .ok()?;

    if !output.status.success() {
        return None;
    }

    parse_version_line(&String::from_utf8_lossy(&output.stdout))
}

/// Last token of the first line, e.g. `pandoc 3.1.11` -> `3.1.11`.
fn parse_version_line(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .next()?
        .split_whitespace()
        .last()
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// PATH lookup
// ---------------------------------------------------------------------------

/// Find `name` in the directories of a `PATH`-style string.
pub fn find_executable(name: &str, search_path: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(search_path)
        .filter(|dir| !dir.as_os_str().is_empty())
        .flat_map(|dir| candidate_names(name).map(move |n| dir.join(n)))
        .find(|candidate| is_executable(candidate))
}

#[cfg(windows)]
fn candidate_names(name: &str) -> impl Iterator<Item = OsString> + '_ {
    let exts = std::env::var("PATHEXT").unwrap_or_else(|_| ".EXE;.CMD;.BAT;.COM".into());
    std::iter::once(OsString::from(name)).chain(
        exts.split(';')
            .filter(|e| !e.is_empty())
            .map(|e| OsString::from(format!("{name}{e}")))
            .collect::<Vec<_>>(),
    )
}

#[cfg(not(windows))]
fn candidate_names(name: &str) -> impl Iterator<Item = OsString> + '_ {
    std::iter::once(OsString::from(name))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
