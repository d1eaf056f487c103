//! pandoc command assembly and execution.
//!
//! Every document goes through two pandoc passes: a read pass that parses
//! the Markdown into pandoc's JSON AST, and a write pass that renders the
//! AST into the target format. When the format needs it, the TOC is
//! injected into the AST between the two passes.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use docbuild_shared::{
    DocBuildError, OutputFormat, PandocConfig, PdfEngine, ProjectLayout, Result, TocOptions,
};

use crate::toc;

/// Everything needed to build one source into one format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPlan {
    pub source: PathBuf,
    pub format: OutputFormat,
    pub output: PathBuf,
    /// Arguments of the Markdown -> JSON pass.
    pub read_args: Vec<OsString>,
    /// Arguments of the JSON -> output pass.
    pub write_args: Vec<OsString>,
    /// Run the TOC injector between the passes.
    pub inject_toc: bool,
    pub working_dir: PathBuf,
}

/// A document written by pandoc.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltDocument {
    pub source: PathBuf,
    pub format: OutputFormat,
    pub output: PathBuf,
    /// Size of the output in bytes.
    pub size: u64,
    /// Non-fatal diagnostics pandoc printed to stderr.
    pub warnings: Vec<String>,
}

/// Assemble the pandoc arguments for `source` in `format`.
///
/// `engine` is required for PDF output and ignored otherwise.
pub fn plan(
    source: &Path,
    format: OutputFormat,
    engine: Option<PdfEngine>,
    layout: &ProjectLayout,
    config: &PandocConfig,
) -> Result<BuildPlan> {
    let stem = source.file_stem().ok_or_else(|| {
        DocBuildError::validation(format!("source has no file name: {}", source.display()))
    })?;
    let mut file_name = stem.to_os_string();
    file_name.push(".");
    file_name.push(format.extension());
    let output = layout.build_dir.join(file_name);

    let read_args = vec![source.as_os_str().to_os_string(), "--to=json".into()];

    let resource_path = std::env::join_paths([
        &layout.root,
        &layout.src_dir,
        &layout.images_dir,
        &layout.diagrams_out,
    ])
    .map_err(|e| DocBuildError::config(format!("cannot build --resource-path: {e}")))?;

    let mut write_args: Vec<OsString> = vec![
        "--from=json".into(),
        "-o".into(),
        output.as_os_str().to_os_string(),
        flag("--resource-path=", &resource_path),
        "--number-sections".into(),
    ];

    let inject_toc = match format {
        OutputFormat::Docx => {
            write_args.push(flag(
                "--reference-doc=",
                layout.templates_dir.join(&config.reference_doc),
            ));
            true
        }
        OutputFormat::Pdf => {
            let engine = engine.ok_or_else(|| {
                DocBuildError::validation("PDF output requires a PDF engine")
            })?;
            write_args.push(format!("--pdf-engine={}", engine.name()).into());
            if engine.is_latex() {
                for var in &config.latex_variables {
                    write_args.push("-V".into());
                    write_args.push(var.into());
                }
            }
            if engine.uses_builtin_toc() {
                write_args.push("--toc".into());
                false
            } else {
                true
            }
        }
        OutputFormat::Html => {
            let html_args: [OsString; 6] = [
                "--standalone".into(),
                "--toc".into(),
                format!("--toc-depth={}", config.toc_depth).into(),
                "--embed-resources".into(),
                format!("--katex={}", config.katex_url).into(),
                flag("--css=", layout.templates_dir.join(&config.css)),
            ];
            write_args.extend(html_args);
            false
        }
    };

    Ok(BuildPlan {
        source: source.to_path_buf(),
        format,
        output,
        read_args,
        write_args,
        inject_toc,
        working_dir: layout.root.clone(),
    })
}

/// Run both pandoc passes of a plan.
#[instrument(skip_all, fields(source = %plan.source.display(), format = %plan.format))]
pub async fn execute(pandoc: &Path, plan: &BuildPlan, toc_options: &TocOptions) -> Result<BuiltDocument> {
    if let Some(dir) = plan.output.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| DocBuildError::io(dir, e))?;
    }

    let read = run_pandoc(pandoc, plan, &plan.read_args, None).await?;
    let mut warnings = stderr_lines(&read);

    let ast = if plan.inject_toc {
        let json = String::from_utf8(read.stdout)
            .map_err(|e| DocBuildError::ast(format!("pandoc emitted invalid UTF-8: {e}")))?;
        toc::filter_json(&json, toc_options)?.into_bytes()
    } else {
        read.stdout
    };
    debug!(bytes = ast.len(), inject_toc = plan.inject_toc, "document AST ready");

    let write = run_pandoc(pandoc, plan, &plan.write_args, Some(ast)).await?;
    warnings.extend(stderr_lines(&write));

    for warning in &warnings {
        warn!(%warning, "pandoc warning");
    }

    let size = match tokio::fs::metadata(&plan.output).await {
        Ok(meta) => meta.len(),
        Err(_) => {
            return Err(DocBuildError::MissingOutput {
                path: plan.output.clone(),
            });
        }
    };

    info!(output = %plan.output.display(), bytes = size, "document built");

    Ok(BuiltDocument {
        source: plan.source.clone(),
        format: plan.format,
        output: plan.output.clone(),
        size,
        warnings,
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn flag(name: &str, value: impl AsRef<OsStr>) -> OsString {
    let mut arg = OsString::from(name);
    arg.push(value.as_ref());
    arg
}

fn stderr_lines(output: &Output) -> Vec<String> {
    String::from_utf8_lossy(&output.stderr)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Spawn pandoc, feed `input` on stdin, and collect its output.
async fn run_pandoc(
    pandoc: &Path,
    plan: &BuildPlan,
    args: &[OsString],
    input: Option<Vec<u8>>,
) -> Result<Output> {
    debug!(?args, "running pandoc");

    let mut child = Command::new(pandoc)
        .args(args)
        .current_dir(&plan.working_dir)
        .stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| DocBuildError::io(pandoc, e))?;

    // Feed stdin concurrently so a large AST cannot deadlock against a
    // full stdout pipe.
    let writer = match (input, child.stdin.take()) {
        (Some(bytes), Some(mut stdin)) => Some(tokio::spawn(async move {
            stdin.write_all(&bytes).await?;
            stdin.shutdown().await
        })),
        _ => None,
    };

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| DocBuildError::io(pandoc, e))?;

    if !output.status.success() {
        return Err(DocBuildError::Pandoc {
            source_file: plan.source.clone(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    if let Some(writer) = writer {
        writer
            .await
            .map_err(std::io::Error::other)
            .and_then(|res| res)
            .map_err(|e| DocBuildError::io(pandoc, e))?;
    }

    Ok(output)
}
