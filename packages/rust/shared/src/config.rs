//! Project configuration for docbuild.
//!
//! Config lives at `<project>/docbuild.toml` and is optional; every field
//! has a default matching the conventional project layout. CLI flags
//! override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DocBuildError, Result};
use crate::types::PdfEngine;

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "docbuild.toml";

// ---------------------------------------------------------------------------
// Config structs (matching docbuild.toml schema)
// ---------------------------------------------------------------------------

/// Top-level project config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory layout, relative to the project root.
    #[serde(default)]
    pub paths: PathsConfig,

    /// pandoc invocation settings.
    #[serde(default)]
    pub pandoc: PandocConfig,

    /// Diagram renderer settings.
    #[serde(default)]
    pub diagrams: DiagramsConfig,

    /// Injected table of contents.
    #[serde(default)]
    pub toc: TocOptions,
}

/// `[paths]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Markdown sources.
    #[serde(default = "default_src")]
    pub src: String,

    /// Mermaid `.mmd` sources.
    #[serde(default = "default_diagrams")]
    pub diagrams: String,

    /// Images referenced from the sources.
    #[serde(default = "default_images")]
    pub images: String,

    /// Reference docx and stylesheet.
    #[serde(default = "default_templates")]
    pub templates: String,

    /// Build output; removed by `clean`.
    #[serde(default = "default_build")]
    pub build: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            src: default_src(),
            diagrams: default_diagrams(),
            images: default_images(),
            templates: default_templates(),
            build: default_build(),
        }
    }
}

fn default_src() -> String {
    "src".into()
}
fn default_diagrams() -> String {
    "src/diagrams".into()
}
fn default_images() -> String {
    "src/images".into()
}
fn default_templates() -> String {
    "templates".into()
}
fn default_build() -> String {
    "build".into()
}

/// `[pandoc]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PandocConfig {
    /// PDF engines in order of preference for auto-detection.
    #[serde(default = "default_pdf_engines")]
    pub pdf_engines: Vec<PdfEngine>,

    /// Reference document for docx styling, under the templates dir.
    #[serde(default = "default_reference_doc")]
    pub reference_doc: String,

    /// Stylesheet for HTML output, under the templates dir.
    #[serde(default = "default_css")]
    pub css: String,

    /// KaTeX distribution used for HTML math.
    #[serde(default = "default_katex_url")]
    pub katex_url: String,

    /// Heading depth of pandoc's own HTML table of contents.
    #[serde(default = "default_toc_depth")]
    pub toc_depth: u8,

    /// `-V` variables passed to LaTeX engines.
    #[serde(default = "default_latex_variables")]
    pub latex_variables: Vec<String>,
}

impl Default for PandocConfig {
    fn default() -> Self {
        Self {
            pdf_engines: default_pdf_engines(),
            reference_doc: default_reference_doc(),
            css: default_css(),
            katex_url: default_katex_url(),
            toc_depth: default_toc_depth(),
            latex_variables: default_latex_variables(),
        }
    }
}

fn default_pdf_engines() -> Vec<PdfEngine> {
    PdfEngine::ALL.to_vec()
}
fn default_reference_doc() -> String {
    "reference.docx".into()
}
fn default_css() -> String {
    "style.css".into()
}
fn default_katex_url() -> String {
    "https://cdn.jsdelivr.net/npm/katex@0.16.21/dist/".into()
}
fn default_toc_depth() -> u8 {
    3
}
fn default_latex_variables() -> Vec<String> {
    vec![
        "geometry:margin=1in".into(),
        "colorlinks=true".into(),
        "mainfont=Liberation Sans".into(),
        "monofont=DejaVu Sans Mono".into(),
    ]
}

/// `[diagrams]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagramsConfig {
    /// Base URL of a Kroki-compatible rendering service.
    #[serde(default = "default_renderer_url")]
    pub renderer_url: String,

    /// Per-diagram request timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for DiagramsConfig {
    fn default() -> Self {
        Self {
            renderer_url: default_renderer_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_renderer_url() -> String {
    "https://kroki.io".into()
}
fn default_timeout_secs() -> u64 {
    30
}

/// `[toc]` section: options of the injected table of contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocOptions {
    /// Title of the unnumbered heading that opens the TOC.
    #[serde(default = "default_toc_title")]
    pub title: String,

    /// Emit a TOC heading even when no heading is eligible for numbering.
    #[serde(default)]
    pub inject_when_empty: bool,
}

impl Default for TocOptions {
    fn default() -> Self {
        Self {
            title: default_toc_title(),
            inject_when_empty: false,
        }
    }
}

fn default_toc_title() -> String {
    "Table of Contents".into()
}

// ---------------------------------------------------------------------------
// Project layout (runtime, resolved against the project root)
// ---------------------------------------------------------------------------

/// Absolute directory layout of one documentation project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    pub root: PathBuf,
    pub src_dir: PathBuf,
    pub diagrams_src: PathBuf,
    pub images_dir: PathBuf,
    pub templates_dir: PathBuf,
    pub build_dir: PathBuf,
    /// Rendered diagrams, always inside the build dir.
    pub diagrams_out: PathBuf,
}

impl ProjectLayout {
    /// Resolve the configured paths against `root`.
    pub fn resolve(root: impl Into<PathBuf>, paths: &PathsConfig) -> Self {
        let root = root.into();
        let build_dir = root.join(&paths.build);
        Self {
            src_dir: root.join(&paths.src),
            diagrams_src: root.join(&paths.diagrams),
            images_dir: root.join(&paths.images),
            templates_dir: root.join(&paths.templates),
            diagrams_out: build_dir.join("diagrams"),
            build_dir,
            root,
        }
    }

    /// Path relative to the project root, for display.
    pub fn display_relative<'a>(&self, path: &'a Path) -> std::borrow::Cow<'a, str> {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config file of a project.
pub fn config_file_path(project_dir: &Path) -> PathBuf {
    project_dir.join(CONFIG_FILE_NAME)
}

/// Load the project config. Returns defaults if the file does not exist.
pub fn load_config(project_dir: &Path) -> Result<AppConfig> {
    let path = config_file_path(project_dir);

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the project config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DocBuildError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content).map_err(|e| {
        DocBuildError::config(format!("failed to parse {}: {e}", path.display()))
    })?;
    validate_config(&config)?;

    tracing::debug!(?path, "loaded config");
    Ok(config)
}

/// Write a default config file into the project dir.
/// Returns the path to the created file.
pub fn init_config(project_dir: &Path) -> Result<PathBuf> {
    let path = config_file_path(project_dir);
    if path.exists() {
        return Err(DocBuildError::config(format!(
            "{} already exists",
            path.display()
        )));
    }

    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| DocBuildError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DocBuildError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Reject configs that parse but cannot drive a build.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.pandoc.pdf_engines.is_empty() {
        return Err(DocBuildError::config(
            "pandoc.pdf_engines must list at least one engine",
        ));
    }
    url::Url::parse(&config.diagrams.renderer_url).map_err(|e| {
        DocBuildError::config(format!(
            "diagrams.renderer_url '{}' is not a valid URL: {e}",
            config.diagrams.renderer_url
        ))
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_project() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("docbuild-config-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).expect("create temp project");
        dir
    }

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("renderer_url"));
        assert!(toml_str.contains("Table of Contents"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.pandoc.pdf_engines, PdfEngine::ALL.to_vec());
        assert_eq!(parsed.pandoc.toc_depth, 3);
        assert!(!parsed.toc.inject_when_empty);
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let toml_str = r#"
[pandoc]
pdf_engines = ["typst", "xelatex"]

[toc]
title = "Contents"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(
            config.pandoc.pdf_engines,
            vec![PdfEngine::Typst, PdfEngine::Xelatex]
        );
        assert_eq!(config.toc.title, "Contents");
        assert_eq!(config.paths.src, "src");
        assert_eq!(config.pandoc.reference_doc, "reference.docx");
    }

    #[test]
    fn layout_resolves_against_root() {
        let layout = ProjectLayout::resolve("/docs", &PathsConfig::default());
        assert_eq!(layout.src_dir, PathBuf::from("/docs/src"));
        assert_eq!(layout.diagrams_src, PathBuf::from("/docs/src/diagrams"));
        assert_eq!(layout.diagrams_out, PathBuf::from("/docs/build/diagrams"));
        assert_eq!(
            layout.display_relative(Path::new("/docs/build/intro.pdf")),
            "build/intro.pdf"
        );
    }

    #[test]
    fn missing_config_file_uses_defaults() {
        let dir = temp_project();
        let config = load_config(&dir).expect("load defaults");
        assert_eq!(config.diagrams.renderer_url, "https://kroki.io");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn init_then_load_and_refuse_overwrite() {
        let dir = temp_project();
        let path = init_config(&dir).expect("init config");
        assert!(path.ends_with(CONFIG_FILE_NAME));

        let config = load_config(&dir).expect("load written config");
        assert_eq!(config.paths.build, "build");

        assert!(init_config(&dir).is_err());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn invalid_renderer_url_rejected() {
        let mut config = AppConfig::default();
        config.diagrams.renderer_url = "not a url".into();
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("renderer_url"));
    }

    #[test]
    fn empty_engine_list_rejected() {
        let mut config = AppConfig::default();
        config.pandoc.pdf_engines.clear();
        assert!(validate_config(&config).is_err());
    }
}
