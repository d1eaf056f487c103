//! End-to-end `build` pipeline: tools → sources → validation → diagrams → pandoc.

use std::time::{Duration, Instant};

use tracing::{info, instrument};

use docbuild_markdown::ValidationReport;
use docbuild_shared::{AppConfig, DocBuildError, OutputFormat, PdfEngine, ProjectLayout, Result};

use crate::diagrams::{DiagramRenderer, RenderedDiagram};
use crate::pandoc::{self, BuiltDocument};
use crate::sources;
use crate::tools::ToolSet;

/// One `--format` value as given on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatRequest {
    Single(OutputFormat),
    All,
}

impl From<OutputFormat> for FormatRequest {
    fn from(format: OutputFormat) -> Self {
        Self::Single(format)
    }
}

/// Formats to build plus anything worth telling the user about the choice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatSelection {
    pub formats: Vec<OutputFormat>,
    pub notes: Vec<String>,
}

/// What the user asked `build` to do.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub formats: Vec<FormatRequest>,
    /// Explicit `--pdf-engine`.
    pub pdf_engine: Option<PdfEngine>,
    /// Explicit `--file`; all sources when absent.
    pub file: Option<String>,
}

/// Result of the `build` pipeline.
#[derive(Debug)]
pub struct BuildSummary {
    pub formats: Vec<OutputFormat>,
    /// Engine used for PDF output, if PDF was built.
    pub pdf_engine: Option<PdfEngine>,
    pub diagrams: Vec<RenderedDiagram>,
    pub documents: Vec<BuiltDocument>,
    pub validation: ValidationReport,
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a numbered build step.
    fn step(&self, current: usize, total: usize, label: &str);
    /// Informational message about format or engine selection.
    fn note(&self, message: &str);
    /// Called once source validation has finished.
    fn validated(&self, report: &ValidationReport);
    fn diagram_rendered(&self, diagram: &RenderedDiagram);
    fn document_built(&self, document: &BuiltDocument);
    /// Called when the pipeline completes.
    fn done(&self, summary: &BuildSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn step(&self, _current: usize, _total: usize, _label: &str) {}
    fn note(&self, _message: &str) {}
    fn validated(&self, _report: &ValidationReport) {}
    fn diagram_rendered(&self, _diagram: &RenderedDiagram) {}
    fn document_built(&self, _document: &BuiltDocument) {}
    fn done(&self, _summary: &BuildSummary) {}
}

/// Expand `all` and drop duplicates, keeping first-seen order.
///
/// When `all` was requested and no PDF engine is installed, PDF is left out
/// instead of failing the build. A PDF requested by name is kept so the
/// engine error surfaces later.
pub fn resolve_formats(
    requested: &[FormatRequest],
    pdf_engine: Option<PdfEngine>,
    tools: &ToolSet,
    preference: &[PdfEngine],
) -> FormatSelection {
    let mut selection = FormatSelection::default();
    let wants_all = requested.contains(&FormatRequest::All);
    let explicit_pdf = requested.contains(&FormatRequest::Single(OutputFormat::Pdf));

    for request in requested {
        let expanded: &[OutputFormat] = match request {
            FormatRequest::Single(format) => std::slice::from_ref(format),
            FormatRequest::All => &OutputFormat::ALL,
        };
        for format in expanded {
            if !selection.formats.contains(format) {
                selection.formats.push(*format);
            }
        }
    }

    if wants_all && !explicit_pdf && tools.best_pdf_engine(preference).is_none() {
        selection.formats.retain(|f| *f != OutputFormat::Pdf);
        selection
            .notes
            .push("No PDF engine found; skipping PDF output.".to_string());
    }

    if let Some(engine) = pdf_engine {
        if !selection.formats.contains(&OutputFormat::Pdf) {
            selection.notes.push(format!(
                "--pdf-engine {engine} ignored because PDF is not being built."
            ));
        }
    }

    selection
}

/// Run the full `build` pipeline.
///
/// 1. Check pandoc and pick formats and the PDF engine
/// 2. Resolve and validate sources
/// 3. Render Mermaid diagrams
/// 4. Build every source in every format
#[instrument(skip_all, fields(root = %layout.root.display()))]
pub async fn build(
    request: &BuildRequest,
    config: &AppConfig,
    layout: &ProjectLayout,
    tools: &ToolSet,
    progress: &dyn ProgressReporter,
) -> Result<BuildSummary> {
    let start = Instant::now();
    let pandoc_path = tools.require_pandoc()?;

    let preference = &config.pandoc.pdf_engines;
    let selection = resolve_formats(&request.formats, request.pdf_engine, tools, preference);
    for note in &selection.notes {
        info!(%note, "format selection");
        progress.note(note);
    }
    if selection.formats.is_empty() {
        return Err(DocBuildError::validation("no output formats requested"));
    }

    let pdf_engine = if selection.formats.contains(&OutputFormat::Pdf) {
        Some(tools.resolve_pdf_engine(request.pdf_engine, preference)?)
    } else {
        None
    };

    let files = sources::resolve_source_files(layout, request.file.as_deref())?;
    info!(
        sources = files.len(),
        formats = ?selection.formats,
        pdf_engine = ?pdf_engine,
        "starting build"
    );

    let validation = docbuild_markdown::validate_sources(&files)?;
    progress.validated(&validation);

    let total = 1 + selection.formats.len();

    // --- Step 1: Diagrams ---
    progress.step(1, total, "Rendering Mermaid diagrams");
    let diagram_files = sources::diagram_sources(layout)?;
    let mut diagrams = Vec::with_capacity(diagram_files.len());
    if !diagram_files.is_empty() {
        let renderer = DiagramRenderer::new(&config.diagrams)?;
        for file in &diagram_files {
            let rendered = renderer.render(file, &layout.diagrams_out).await?;
            progress.diagram_rendered(&rendered);
            diagrams.push(rendered);
        }
    }

    // --- Steps 2..: one per format ---
    let mut documents = Vec::with_capacity(files.len() * selection.formats.len());
    for (index, format) in selection.formats.iter().enumerate() {
        let label = match (format, pdf_engine) {
            (OutputFormat::Pdf, Some(engine)) => format!("Building PDF via {engine}"),
            _ => format!("Building {}", format.label()),
        };
        progress.step(index + 2, total, &label);

        for file in &files {
            let plan = pandoc::plan(file, *format, pdf_engine, layout, &config.pandoc)?;
            let built = pandoc::execute(pandoc_path, &plan, &config.toc).await?;
            progress.document_built(&built);
            documents.push(built);
        }
    }

    let summary = BuildSummary {
        formats: selection.formats,
        pdf_engine,
        diagrams,
        documents,
        validation,
        elapsed: start.elapsed(),
    };

    info!(
        documents = summary.documents.len(),
        diagrams = summary.diagrams.len(),
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "build complete"
    );

    progress.done(&summary);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn tools_with(engines: &[PdfEngine]) -> ToolSet {
        ToolSet {
            pandoc: Some(PathBuf::from("/usr/bin/pandoc")),
            engines: engines
                .iter()
                .map(|e| (*e, PathBuf::from(format!("/usr/bin/{}", e.name()))))
                .collect(),
        }
    }

    #[test]
    fn all_expands_in_canonical_order() {
        let tools = tools_with(&[PdfEngine::Xelatex]);
        let selection = resolve_formats(&[FormatRequest::All], None, &tools, &PdfEngine::ALL);
        assert_eq!(
            selection.formats,
            vec![OutputFormat::Docx, OutputFormat::Pdf, OutputFormat::Html]
        );
        assert!(selection.notes.is_empty());
    }

    #[test]
    fn duplicates_keep_first_seen_order() {
        let tools = tools_with(&[PdfEngine::Xelatex]);
        let selection = resolve_formats(
            &[
                OutputFormat::Html.into(),
                FormatRequest::All,
                OutputFormat::Html.into(),
            ],
            None,
            &tools,
            &PdfEngine::ALL,
        );
        assert_eq!(
            selection.formats,
            vec![OutputFormat::Html, OutputFormat::Docx, OutputFormat::Pdf]
        );
    }

    #[test]
    fn all_without_engine_drops_pdf_with_note() {
        let tools = tools_with(&[]);
        let selection = resolve_formats(&[FormatRequest::All], None, &tools, &PdfEngine::ALL);
        assert_eq!(selection.formats, vec![OutputFormat::Docx, OutputFormat::Html]);
        assert_eq!(selection.notes.len(), 1);
        assert!(selection.notes[0].contains("No PDF engine"));
    }

    #[test]
    fn explicit_pdf_is_kept_without_engine() {
        let tools = tools_with(&[]);
        let selection = resolve_formats(
            &[OutputFormat::Pdf.into(), FormatRequest::All],
            None,
            &tools,
            &PdfEngine::ALL,
        );
        assert!(selection.formats.contains(&OutputFormat::Pdf));
    }

    #[test]
    fn engine_without_pdf_is_noted() {
        let tools = tools_with(&[PdfEngine::Typst]);
        let selection = resolve_formats(
            &[OutputFormat::Docx.into()],
            Some(PdfEngine::Typst),
            &tools,
            &PdfEngine::ALL,
        );
        assert_eq!(selection.formats, vec![OutputFormat::Docx]);
        assert_eq!(selection.notes.len(), 1);
        assert!(selection.notes[0].contains("--pdf-engine typst"));
    }

    #[tokio::test]
    async fn build_requires_pandoc() {
        let layout = ProjectLayout::resolve("/nonexistent", &Default::default());
        let request = BuildRequest {
            formats: vec![OutputFormat::Docx.into()],
            pdf_engine: None,
            file: None,
        };
        let err = build(
            &request,
            &AppConfig::default(),
            &layout,
            &ToolSet::default(),
            &SilentProgress,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DocBuildError::ToolMissing { .. }));
    }

    #[tokio::test]
    async fn explicit_pdf_without_engine_fails() {
        let layout = ProjectLayout::resolve("/nonexistent", &Default::default());
        let request = BuildRequest {
            formats: vec![OutputFormat::Pdf.into()],
            pdf_engine: None,
            file: None,
        };
        let err = build(
            &request,
            &AppConfig::default(),
            &layout,
            &tools_with(&[]),
            &SilentProgress,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DocBuildError::NoPdfEngine { .. }));
    }

    #[cfg(unix)]
    mod end_to_end {
        use super::*;
        use std::path::Path;
        use std::sync::Mutex;

        /// Emits a one-heading AST on the read pass and copies stdin to the
        /// `-o` file on the write pass.
        const FAKE_PANDOC: &str = r#"#!/bin/sh
out=""
mode=read
while [ $# -gt 0 ]; do
  case "$1" in
    -o) out="$2"; shift ;;
    --from=json) mode=write ;;
  esac
  shift
done
if [ "$mode" = read ]; then
  printf '%s' '{"pandoc-api-version":[1,23,1],"meta":{},"blocks":[{"t":"Header","c":[1,["intro",[],[]],[{"t":"Str","c":"Intro"}]]}]}'
else
  cat > "$out"
fi
"#;

        #[derive(Default)]
        struct RecordingProgress {
            steps: Mutex<Vec<String>>,
            built: Mutex<Vec<PathBuf>>,
        }

        impl ProgressReporter for RecordingProgress {
            fn step(&self, current: usize, total: usize, label: &str) {
                self.steps
                    .lock()
                    .unwrap()
                    .push(format!("[{current}/{total}] {label}"));
            }
            fn note(&self, _message: &str) {}
            fn validated(&self, _report: &ValidationReport) {}
            fn diagram_rendered(&self, _diagram: &RenderedDiagram) {}
            fn document_built(&self, document: &BuiltDocument) {
                self.built.lock().unwrap().push(document.output.clone());
            }
            fn done(&self, _summary: &BuildSummary) {}
        }

        fn fake_pandoc(dir: &Path) -> PathBuf {
            use std::os::unix::fs::PermissionsExt;
            let path = dir.join("pandoc");
            std::fs::write(&path, FAKE_PANDOC).expect("write fake pandoc");
            let mut perms = std::fs::metadata(&path).expect("metadata").permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(&path, perms).expect("chmod");
            path
        }

        #[tokio::test]
        async fn builds_every_source_in_every_format() {
            let root =
                std::env::temp_dir().join(format!("docbuild-pipeline-{}", uuid::Uuid::now_v7()));
            let layout = ProjectLayout::resolve(&root, &Default::default());
            std::fs::create_dir_all(&layout.src_dir).expect("create src");
            std::fs::write(layout.src_dir.join("a.md"), "# Intro\n").expect("write a");
            std::fs::write(layout.src_dir.join("b.md"), "# Intro\n[x](#nowhere)\n")
                .expect("write b");

            let tools = ToolSet {
                pandoc: Some(fake_pandoc(&root)),
                engines: Default::default(),
            };
            let request = BuildRequest {
                formats: vec![FormatRequest::All],
                pdf_engine: None,
                file: None,
            };
            let progress = RecordingProgress::default();

            let summary = build(&request, &AppConfig::default(), &layout, &tools, &progress)
                .await
                .expect("build");

            assert_eq!(summary.formats, vec![OutputFormat::Docx, OutputFormat::Html]);
            assert_eq!(summary.pdf_engine, None);
            assert!(summary.diagrams.is_empty());
            assert_eq!(summary.documents.len(), 4);
            assert_eq!(summary.validation.broken_links.len(), 1);

            assert_eq!(
                *progress.steps.lock().unwrap(),
                vec![
                    "[1/3] Rendering Mermaid diagrams",
                    "[2/3] Building DOCX",
                    "[3/3] Building HTML",
                ]
            );
            assert_eq!(
                *progress.built.lock().unwrap(),
                vec![
                    layout.build_dir.join("a.docx"),
                    layout.build_dir.join("b.docx"),
                    layout.build_dir.join("a.html"),
                    layout.build_dir.join("b.html"),
                ]
            );

            let docx = std::fs::read_to_string(layout.build_dir.join("a.docx")).expect("read docx");
            assert!(docx.contains("Table of Contents"));
            let html = std::fs::read_to_string(layout.build_dir.join("a.html")).expect("read html");
            assert!(!html.contains("Table of Contents"));

            let _ = std::fs::remove_dir_all(&root);
        }
    }
}
