//! Heading numbering and TOC (Table of Contents) injection.
//!
//! Walks the headings of a pandoc document, including those inside `Div`s,
//! numbers them the same way `pandoc --number-sections` does (three levels,
//! `unnumbered` headings skipped), and inserts a linked table of contents
//! before the first top-level heading. The block ends with a page break for
//! each writer.

use std::borrow::Cow;

use tracing::{debug, instrument};

use docbuild_shared::{
    Attr, Block, Document, Inline, Node, Result, Target, TocOptions, stringify,
};

/// Deepest heading level that receives a number.
pub const MAX_NUMBERED_LEVEL: usize = 3;

/// Class that excludes a heading from numbering, both here and in pandoc.
pub const UNNUMBERED_CLASS: &str = "unnumbered";

/// Page break for the docx writer.
pub const OPENXML_PAGE_BREAK: &str = r#"<w:p><w:r><w:br w:type="page"/></w:r></w:p>"#;

/// Page break for LaTeX-based PDF engines.
pub const LATEX_PAGE_BREAK: &str = r"\newpage";

/// Page break for HTML (and print-to-PDF from HTML).
pub const HTML_PAGE_BREAK: &str = r#"<div style="page-break-after: always;"></div>"#;

const NBSP: char = '\u{a0}';

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A heading of the document being transformed.
///
/// Top-level headings are borrowed; headings decoded from `Div` content are
/// owned.
#[derive(Debug, Clone)]
pub struct HeadingRecord<'a> {
    pub level: u8,
    pub content: Cow<'a, [Inline]>,
    pub identifier: Cow<'a, str>,
    pub unnumbered: bool,
}

impl HeadingRecord<'_> {
    /// Numbered (and listed) headings: levels 1-3 without `unnumbered`.
    pub fn is_eligible(&self) -> bool {
        (1..=MAX_NUMBERED_LEVEL).contains(&usize::from(self.level)) && !self.unnumbered
    }
}

/// Section counters for levels 1-3 during one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SectionCounters([u32; MAX_NUMBERED_LEVEL]);

impl SectionCounters {
    /// Count a heading at `level` and return its number.
    ///
    /// Deeper counters reset to zero; unset ancestors stay zero, so a
    /// level-2 heading before any level-1 heading is numbered `0.1`.
    /// Levels outside 1-3 are not counted and return `None`.
    pub(crate) fn advance(&mut self, level: usize) -> Option<String> {
        if !(1..=MAX_NUMBERED_LEVEL).contains(&level) {
            return None;
        }
        self.0[level - 1] += 1;
        self.0[level..].fill(0);

        Some(
            self.0[..level]
                .iter()
                .map(u32::to_string)
                .collect::<Vec<_>>()
                .join("."),
        )
    }
}

/// One line of the generated table of contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocItem {
    pub level: u8,
    /// Non-breaking spaces; writers collapse ordinary leading spaces.
    pub indent: String,
    pub number: String,
    /// `number`, two non-breaking spaces, then the heading text.
    pub label: String,
    /// Heading identifier the entry links to.
    pub target: String,
}

impl TocItem {
    fn to_block(&self) -> Block {
        let mut inlines = Vec::with_capacity(2);
        if !self.indent.is_empty() {
            inlines.push(Inline::str(self.indent.clone()));
        }
        inlines.push(Inline::Link(
            Attr::default(),
            Inline::text_runs(&self.label),
            Target {
                url: format!("#{}", self.target),
                title: String::new(),
            },
        ));
        Block::Plain(inlines)
    }
}

// ---------------------------------------------------------------------------
// Transform
// ---------------------------------------------------------------------------

/// Insert a numbered table of contents before the first top-level heading.
///
/// A document without headings is returned unchanged, as is one whose
/// headings are all ineligible unless `options.inject_when_empty` is set.
/// When every heading sits inside a `Div`, the TOC is prepended.
#[instrument(skip_all, fields(blocks = doc.blocks.len()))]
pub fn transform(mut doc: Document, options: &TocOptions) -> Document {
    let (found, items) = {
        let headings = collect_headings(&doc);
        (!headings.is_empty(), number_headings(&headings))
    };
    if !found {
        debug!("no headings, leaving document unchanged");
        return doc;
    }

    if items.is_empty() && !options.inject_when_empty {
        debug!("no numbered headings, skipping TOC");
        return doc;
    }

    let toc = toc_blocks(&items, options);
    let at = doc
        .blocks
        .iter()
        .position(Block::is_header)
        .unwrap_or(0);
    doc.blocks.splice(at..at, toc);

    debug!(entries = items.len(), position = at, "TOC injected");
    doc
}

/// Decode a pandoc JSON document, inject the TOC, and encode it again.
pub fn filter_json(input: &str, options: &TocOptions) -> Result<String> {
    let doc = Document::from_json(input)?;
    transform(doc, options).to_json()
}

/// All headings in document order, descending into `Div`s.
///
/// pandoc numbers headings inside `Div`s (`::: note` fenced blocks) as
/// ordinary sections, so they count here too.
pub fn collect_headings(doc: &Document) -> Vec<HeadingRecord<'_>> {
    let mut headings = Vec::new();
    for block in &doc.blocks {
        match block {
            Block::Header {
                level,
                attr,
                content,
            } => headings.push(HeadingRecord {
                level: *level,
                content: Cow::Borrowed(content),
                identifier: Cow::Borrowed(&attr.identifier),
                unnumbered: attr.has_class(UNNUMBERED_CLASS),
            }),
            Block::Opaque(node) => collect_owned(div_children(node), &mut headings),
            _ => {}
        }
    }
    headings
}

fn collect_owned(blocks: Vec<Block>, headings: &mut Vec<HeadingRecord<'_>>) {
    for block in blocks {
        match block {
            Block::Header {
                level,
                attr,
                content,
            } => {
                let unnumbered = attr.has_class(UNNUMBERED_CLASS);
                headings.push(HeadingRecord {
                    level,
                    content: Cow::Owned(content),
                    identifier: Cow::Owned(attr.identifier),
                    unnumbered,
                });
            }
            Block::Opaque(node) => collect_owned(div_children(&node), headings),
            _ => {}
        }
    }
}

/// Child blocks of a `Div` node (`[attr, blocks]`); empty for anything else.
fn div_children(node: &Node) -> Vec<Block> {
    if node.t != "Div" {
        return Vec::new();
    }
    node.c
        .get(1)
        .and_then(|blocks| serde_json::from_value(blocks.clone()).ok())
        .unwrap_or_default()
}

/// Number the eligible headings and build one TOC entry for each.
pub fn number_headings(headings: &[HeadingRecord<'_>]) -> Vec<TocItem> {
    let mut counters = SectionCounters::default();

    headings
        .iter()
        .filter(|h| h.is_eligible())
        .filter_map(|h| {
            let level = usize::from(h.level);
            let number = counters.advance(level)?;
            let indent: String = std::iter::repeat_n(NBSP, 4 * (level - 1)).collect();
            let label = format!("{number}{NBSP}{NBSP}{}", stringify(&h.content));

            Some(TocItem {
                level: h.level,
                indent,
                number,
                label,
                target: h.identifier.to_string(),
            })
        })
        .collect()
}

/// The full TOC block sequence: title, entries, then the page breaks.
pub fn toc_blocks(items: &[TocItem], options: &TocOptions) -> Vec<Block> {
    let mut blocks = Vec::with_capacity(items.len() + 4);

    blocks.push(Block::header(
        1,
        Attr::new("", &[UNNUMBERED_CLASS]),
        Inline::text_runs(&options.title),
    ));
    blocks.extend(items.iter().map(TocItem::to_block));
    blocks.push(Block::raw("openxml", OPENXML_PAGE_BREAK));
    blocks.push(Block::raw("latex", LATEX_PAGE_BREAK));
    blocks.push(Block::raw("html", HTML_PAGE_BREAK));

    blocks
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
