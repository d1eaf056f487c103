//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Result, eyre};
use docbuild_core::check::CheckReport;
use docbuild_core::diagrams::RenderedDiagram;
use docbuild_core::pandoc::BuiltDocument;
use docbuild_core::pipeline::{BuildRequest, BuildSummary, FormatRequest, ProgressReporter};
use docbuild_core::sources;
use docbuild_core::tools::ToolSet;
use docbuild_markdown::ValidationReport;
use docbuild_shared::{
    AppConfig, OutputFormat, PdfEngine, ProjectLayout, init_config, load_config, load_config_from,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// docbuild: Markdown documentation to DOCX, PDF, and HTML via pandoc.
#[derive(Parser)]
#[command(
    name = "docbuild",
    version,
    about = "Build numbered DOCX, PDF, and HTML documents from Markdown sources.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Project root containing src/ and templates/.
    #[arg(long, default_value = ".", global = true)]
    pub project_dir: PathBuf,

    /// Config file to use instead of <project-dir>/docbuild.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Output format argument; `all` builds every format.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub(crate) enum FormatArg {
    Docx,
    Pdf,
    Html,
    All,
}

impl From<FormatArg> for FormatRequest {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Docx => OutputFormat::Docx.into(),
            FormatArg::Pdf => OutputFormat::Pdf.into(),
            FormatArg::Html => OutputFormat::Html.into(),
            FormatArg::All => FormatRequest::All,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub(crate) enum EngineArg {
    Xelatex,
    Pdflatex,
    Typst,
    Weasyprint,
}

impl From<EngineArg> for PdfEngine {
    fn from(arg: EngineArg) -> Self {
        match arg {
            EngineArg::Xelatex => PdfEngine::Xelatex,
            EngineArg::Pdflatex => PdfEngine::Pdflatex,
            EngineArg::Typst => PdfEngine::Typst,
            EngineArg::Weasyprint => PdfEngine::Weasyprint,
        }
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Render diagrams and build documents.
    Build {
        /// Output format(s); repeat or use `all`.
        #[arg(short, long = "format", value_enum, required = true, num_args = 1..)]
        formats: Vec<FormatArg>,

        /// PDF engine to use instead of the best installed one.
        #[arg(long, value_enum)]
        pdf_engine: Option<EngineArg>,

        /// Build a single source (path, file name, or name without .md).
        #[arg(long)]
        file: Option<String>,
    },

    /// Report installed tools and buildable formats.
    Check,

    /// Remove the build directory.
    Clean,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "docbuild=info",
        1 => "docbuild=debug",
        _ => "docbuild=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let project_dir = std::fs::canonicalize(&cli.project_dir).map_err(|e| {
        eyre!(
            "cannot open project directory '{}': {e}",
            cli.project_dir.display()
        )
    })?;

    match cli.command {
        Command::Build {
            formats,
            pdf_engine,
            file,
        } => {
            let request = BuildRequest {
                formats: formats.into_iter().map(FormatRequest::from).collect(),
                pdf_engine: pdf_engine.map(PdfEngine::from),
                file,
            };
            cmd_build(&project_dir, cli.config.as_deref(), &request).await
        }
        Command::Check => cmd_check(&project_dir, cli.config.as_deref()).await,
        Command::Clean => cmd_clean(&project_dir, cli.config.as_deref()),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(&project_dir),
            ConfigAction::Show => cmd_config_show(&project_dir, cli.config.as_deref()),
        },
    }
}

fn resolve_config(project_dir: &Path, config: Option<&Path>) -> Result<(AppConfig, ProjectLayout)> {
    let config = match config {
        Some(path) => load_config_from(path)?,
        None => load_config(project_dir)?,
    };
    let layout = ProjectLayout::resolve(project_dir, &config.paths);
    Ok((config, layout))
}

fn rule(width: usize) -> String {
    "=".repeat(width)
}

fn kib(bytes: u64) -> String {
    format!("{:.1} KB", bytes as f64 / 1024.0)
}

// ---------------------------------------------------------------------------
// build
// ---------------------------------------------------------------------------

async fn cmd_build(project_dir: &Path, config: Option<&Path>, request: &BuildRequest) -> Result<()> {
    let (config, layout) = resolve_config(project_dir, config)?;
    let tools = ToolSet::detect();

    info!(
        project = %layout.root.display(),
        file = request.file.as_deref().unwrap_or("all"),
        "building documentation"
    );

    println!("{}", rule(60));
    println!("Documentation Build");
    println!("{}", rule(60));

    let reporter = CliProgress::new(layout.clone());
    let summary = match docbuild_core::pipeline::build(request, &config, &layout, &tools, &reporter).await
    {
        Ok(summary) => summary,
        Err(e) => {
            reporter.abandon();
            return Err(e.into());
        }
    };

    println!();
    println!("{}", rule(60));
    println!(
        "Build complete in {:.1}s",
        summary.elapsed.as_secs_f64()
    );
    println!("  Diagrams rendered: {}", summary.diagrams.len());
    for format in &summary.formats {
        let outputs: Vec<_> = summary
            .documents
            .iter()
            .filter(|d| d.format == *format)
            .collect();
        println!("  {} documents: {}", format.label(), outputs.len());
        for doc in outputs {
            println!("    - {}", layout.display_relative(&doc.output));
        }
    }
    println!("{}", rule(60));

    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
    layout: ProjectLayout,
}

impl CliProgress {
    fn new(layout: ProjectLayout) -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner, layout }
    }

    fn abandon(&self) {
        self.spinner.finish_and_clear();
    }

    fn name(path: &Path) -> String {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string())
    }
}

impl ProgressReporter for CliProgress {
    fn step(&self, current: usize, total: usize, label: &str) {
        self.spinner.println(format!("\n[{current}/{total}] {label}..."));
        self.spinner.set_message(label.to_string());
    }

    fn note(&self, message: &str) {
        self.spinner.println(format!("Note: {message}"));
    }

    fn validated(&self, report: &ValidationReport) {
        if report.is_clean() {
            self.spinner.println("Sources validated: no issues found.");
            return;
        }
        if !report.broken_links.is_empty() {
            self.spinner.println("\n  WARNING: broken internal links found:");
            for link in &report.broken_links {
                self.spinner.println(format!(
                    "    {}:{}  #{} (\"{}\")",
                    link.file, link.line, link.target, link.text
                ));
            }
        }
        if !report.bare_paths.is_empty() {
            self.spinner
                .println("\n  WARNING: bare Windows paths found (wrap in backticks):");
            for path in &report.bare_paths {
                self.spinner
                    .println(format!("    {}:{}  {}", path.file, path.line, path.path));
            }
        }
    }

    fn diagram_rendered(&self, diagram: &RenderedDiagram) {
        let status = if diagram.cached { "cached" } else { "rendered" };
        self.spinner.println(format!(
            "  {} -> {} ({}, {status})",
            Self::name(&diagram.source),
            Self::name(&diagram.output),
            kib(diagram.size)
        ));
    }

    fn document_built(&self, document: &BuiltDocument) {
        self.spinner.println(format!(
            "  {} -> {} ({})",
            Self::name(&document.source),
            self.layout.display_relative(&document.output),
            kib(document.size)
        ));
        for warning in &document.warnings {
            self.spinner.println(format!("    pandoc: {warning}"));
        }
    }

    fn done(&self, _summary: &BuildSummary) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// check / clean / config
// ---------------------------------------------------------------------------

async fn cmd_check(project_dir: &Path, config: Option<&Path>) -> Result<()> {
    let (config, layout) = resolve_config(project_dir, config)?;
    let tools = ToolSet::detect();
    let report = CheckReport::gather(&tools, &layout, &config).await?;

    println!("Documentation Build: Tool Check");
    println!("{}", rule(50));

    let pandoc = match (&report.pandoc, &report.pandoc_version) {
        (Some(path), Some(version)) => format!("{} ({version})", path.display()),
        (Some(path), None) => path.display().to_string(),
        (None, _) => "NOT FOUND".to_string(),
    };
    println!();
    println!("  {:.<18} {pandoc}", "pandoc ");
    println!("  {:.<18} {}", "renderer ", report.renderer);

    println!("\nPDF engines:");
    for status in &report.engines {
        let label = match &status.path {
            Some(path) if status.default => format!("{} (default)", path.display()),
            Some(path) => path.display().to_string(),
            None => "not found".to_string(),
        };
        println!("  {:16} {label}", status.engine.name());
    }

    println!("\nAvailable output formats:");
    for status in &report.formats {
        let answer = if status.available { "YES" } else { "NO" };
        if status.detail.is_empty() {
            println!("  {:.<18} {answer}", format!("{} ", status.format));
        } else {
            println!("  {:.<18} {answer} ({})", format!("{} ", status.format), status.detail);
        }
    }

    let ready = buildable_formats(&report);
    if ready.is_empty() {
        println!("\nNothing can be built yet.");
    } else {
        println!("\nReady to build: {}", ready.join(", "));
    }

    if !report.sources.is_empty() {
        println!("\nSource files ({}):", report.sources.len());
        for file in &report.sources {
            println!("  {}", layout.display_relative(file));
        }
    }
    if !report.diagrams.is_empty() {
        println!("\nDiagram sources ({}):", report.diagrams.len());
        for file in &report.diagrams {
            println!("  {}", layout.display_relative(file));
        }
    }
    println!();

    Ok(())
}

/// Names of the formats `build -f` would accept on this machine.
fn buildable_formats(report: &CheckReport) -> Vec<&'static str> {
    OutputFormat::ALL
        .into_iter()
        .filter(|format| report.can_build(*format))
        .map(OutputFormat::name)
        .collect()
}

fn cmd_clean(project_dir: &Path, config: Option<&Path>) -> Result<()> {
    let (_, layout) = resolve_config(project_dir, config)?;
    let relative = layout.display_relative(&layout.build_dir).into_owned();
    if sources::clean(&layout)? {
        println!("Removed {relative}/");
    } else {
        println!("Nothing to clean ({relative}/ does not exist).");
    }
    Ok(())
}

fn cmd_config_init(project_dir: &Path) -> Result<()> {
    let path = init_config(project_dir)?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(project_dir: &Path, config: Option<&Path>) -> Result<()> {
    let (config, _) = resolve_config(project_dir, config)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
