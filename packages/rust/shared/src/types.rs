//! Core domain types for documentation builds.

use serde::{Deserialize, Serialize};

use crate::error::DocBuildError;

// ---------------------------------------------------------------------------
// OutputFormat
// ---------------------------------------------------------------------------

/// A document format the pipeline can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Docx,
    Pdf,
    Html,
}

impl OutputFormat {
    /// Every format, in build order.
    pub const ALL: [OutputFormat; 3] = [OutputFormat::Docx, OutputFormat::Pdf, OutputFormat::Html];

    /// Lowercase name, as accepted on the command line.
    pub fn name(self) -> &'static str {
        match self {
            Self::Docx => "docx",
            Self::Pdf => "pdf",
            Self::Html => "html",
        }
    }

    /// File extension (without the dot) of the produced document.
    pub fn extension(self) -> &'static str {
        self.name()
    }

    /// Uppercase label used in build headers.
    pub fn label(self) -> String {
        self.name().to_uppercase()
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = DocBuildError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| DocBuildError::validation(format!("unknown output format '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// PdfEngine
// ---------------------------------------------------------------------------

/// A PDF engine pandoc can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PdfEngine {
    Xelatex,
    Pdflatex,
    Typst,
    Weasyprint,
}

impl PdfEngine {
    /// Default preference order when auto-detecting.
    pub const ALL: [PdfEngine; 4] = [
        PdfEngine::Xelatex,
        PdfEngine::Pdflatex,
        PdfEngine::Typst,
        PdfEngine::Weasyprint,
    ];

    /// Executable name, also the value passed to `--pdf-engine`.
    pub fn name(self) -> &'static str {
        match self {
            Self::Xelatex => "xelatex",
            Self::Pdflatex => "pdflatex",
            Self::Typst => "typst",
            Self::Weasyprint => "weasyprint",
        }
    }

    /// LaTeX engines accept `-V` template variables (geometry, fonts).
    pub fn is_latex(self) -> bool {
        matches!(self, Self::Xelatex | Self::Pdflatex)
    }

    /// Engines whose writer honors none of the injected page-break
    /// fragments; they get pandoc's own `--toc` instead.
    ///
    /// Weasyprint goes through HTML. The typst writer drops raw `latex` and
    /// `openxml` blocks, so an injected TOC would run into the first chapter.
    pub fn uses_builtin_toc(self) -> bool {
        matches!(self, Self::Weasyprint | Self::Typst)
    }
}

impl std::fmt::Display for PdfEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for PdfEngine {
    type Err = DocBuildError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|e| e.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| DocBuildError::validation(format!("unknown PDF engine '{s}'")))
    }
}

/// Comma-separated engine names, for error messages.
pub fn engine_list(engines: &[PdfEngine]) -> String {
    engines
        .iter()
        .map(|e| e.name())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_format_parse_and_display() {
        let fmt: OutputFormat = "PDF".parse().expect("parse format");
        assert_eq!(fmt, OutputFormat::Pdf);
        assert_eq!(fmt.to_string(), "pdf");
        assert_eq!(fmt.label(), "PDF");
        assert!("odt".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn pdf_engine_properties() {
        assert!(PdfEngine::Xelatex.is_latex());
        assert!(!PdfEngine::Typst.is_latex());
        assert!(PdfEngine::Weasyprint.uses_builtin_toc());
        assert!(PdfEngine::Typst.uses_builtin_toc());
        assert!(!PdfEngine::Pdflatex.uses_builtin_toc());
        assert!(!PdfEngine::Xelatex.uses_builtin_toc());
        assert_eq!(
            engine_list(&PdfEngine::ALL),
            "xelatex, pdflatex, typst, weasyprint"
        );
    }

    #[test]
    fn engines_serialize_lowercase() {
        let json = serde_json::to_string(&PdfEngine::ALL).expect("serialize");
        assert_eq!(json, r#"["xelatex","pdflatex","typst","weasyprint"]"#);
    }
}
