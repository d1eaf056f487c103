//! Environment report for `docbuild check`.

use std::path::PathBuf;

use docbuild_shared::{AppConfig, OutputFormat, PdfEngine, ProjectLayout, Result};

use crate::diagrams::DiagramRenderer;
use crate::sources;
use crate::tools::{self, ToolSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStatus {
    pub engine: PdfEngine,
    pub path: Option<PathBuf>,
    /// This engine is picked when no `--pdf-engine` is given.
    pub default: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatStatus {
    pub format: OutputFormat,
    pub available: bool,
    pub detail: String,
}

/// What the current machine and project can build.
#[derive(Debug, Clone)]
pub struct CheckReport {
    pub pandoc: Option<PathBuf>,
    pub pandoc_version: Option<String>,
    pub renderer: String,
    pub engines: Vec<EngineStatus>,
    pub formats: Vec<FormatStatus>,
    pub sources: Vec<PathBuf>,
    pub diagrams: Vec<PathBuf>,
}

impl CheckReport {
    pub async fn gather(tools: &ToolSet, layout: &ProjectLayout, config: &AppConfig) -> Result<Self> {
        let pandoc_version = match &tools.pandoc {
            Some(path) => tools::pandoc_version(path).await,
            None => None,
        };

        let renderer = DiagramRenderer::new(&config.diagrams)?.endpoint().to_string();

        let best = tools.best_pdf_engine(&config.pandoc.pdf_engines);
        let engines = PdfEngine::ALL
            .into_iter()
            .map(|engine| EngineStatus {
                engine,
                path: tools.engine_path(engine).map(PathBuf::from),
                default: best == Some(engine),
            })
            .collect();

        let has_pandoc = tools.pandoc.is_some();
        let formats = OutputFormat::ALL
            .into_iter()
            .map(|format| {
                let (available, detail) = match (format, has_pandoc, best) {
                    (_, false, _) => (false, "pandoc not found".to_string()),
                    (OutputFormat::Pdf, true, Some(engine)) => (true, format!("via {engine}")),
                    (OutputFormat::Pdf, true, None) => (false, "no PDF engine found".to_string()),
                    (_, true, _) => (true, String::new()),
                };
                FormatStatus {
                    format,
                    available,
                    detail,
                }
            })
            .collect();

        Ok(Self {
            pandoc: tools.pandoc.clone(),
            pandoc_version,
            renderer,
            engines,
            formats,
            sources: sources::markdown_sources(layout)?,
            diagrams: sources::diagram_sources(layout)?,
        })
    }

    pub fn can_build(&self, format: OutputFormat) -> bool {
        self.formats
            .iter()
            .any(|status| status.format == format && status.available)
    }
}
