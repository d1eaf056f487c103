//! Pandoc document model.
//!
//! A closed subset of pandoc's AST: the node kinds the build pipeline reads
//! or synthesizes get their own variants, everything else is carried as an
//! opaque [`Node`] so a document survives a decode/encode cycle unchanged.
//!
//! The serde representation is pandoc's JSON AST (`pandoc --to json`):
//! nodes are `{"t": tag, "c": content}`, attributes are
//! `[id, [classes], [[key, value]]]` and link targets are `[url, title]`.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{DocBuildError, Result};

/// API version stamped on documents built from scratch.
pub const PANDOC_API_VERSION: [u32; 3] = [1, 23, 1];

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// A whole parsed source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "pandoc-api-version")]
    pub api_version: Vec<u32>,
    /// Document metadata, passed through untouched.
    pub meta: Value,
    pub blocks: Vec<Block>,
}

impl Document {
    /// A document with empty metadata.
    pub fn new(blocks: Vec<Block>) -> Self {
        Self {
            api_version: PANDOC_API_VERSION.to_vec(),
            meta: json!({}),
            blocks,
        }
    }

    /// Decode pandoc's JSON AST.
    pub fn from_json(input: &str) -> Result<Self> {
        serde_json::from_str(input).map_err(|e| DocBuildError::ast(e.to_string()))
    }

    /// Encode as pandoc's JSON AST.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| DocBuildError::ast(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Generic node
// ---------------------------------------------------------------------------

/// A raw `{"t", "c"}` node, used for kinds this model does not interpret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub t: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub c: Value,
}

impl Node {
    fn new(t: &str, c: Value) -> Self {
        Self { t: t.to_string(), c }
    }

    fn unit(t: &str) -> Self {
        Self::new(t, Value::Null)
    }
}

fn decode<T: DeserializeOwned>(tag: &str, content: Value) -> Result<T> {
    serde_json::from_value(content)
        .map_err(|e| DocBuildError::ast(format!("malformed {tag} node: {e}")))
}

// ---------------------------------------------------------------------------
// Attr / Target
// ---------------------------------------------------------------------------

/// Identifier, classes and key-value attributes of a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "AttrRepr", into = "AttrRepr")]
pub struct Attr {
    pub identifier: String,
    pub classes: Vec<String>,
    pub attributes: Vec<(String, String)>,
}

#[derive(Serialize, Deserialize)]
struct AttrRepr(String, Vec<String>, Vec<(String, String)>);

impl From<AttrRepr> for Attr {
    fn from(AttrRepr(identifier, classes, attributes): AttrRepr) -> Self {
        Self {
            identifier,
            classes,
            attributes,
        }
    }
}

impl From<Attr> for AttrRepr {
    fn from(attr: Attr) -> Self {
        AttrRepr(attr.identifier, attr.classes, attr.attributes)
    }
}

impl Attr {
    /// An attribute with only an identifier and classes.
    pub fn new(identifier: impl Into<String>, classes: &[&str]) -> Self {
        Self {
            identifier: identifier.into(),
            classes: classes.iter().map(|c| c.to_string()).collect(),
            attributes: Vec::new(),
        }
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }
}

/// Destination of a link or image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct Target {
    pub url: String,
    pub title: String,
}

impl From<(String, String)> for Target {
    fn from((url, title): (String, String)) -> Self {
        Self { url, title }
    }
}

impl From<Target> for (String, String) {
    fn from(target: Target) -> Self {
        (target.url, target.title)
    }
}

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

/// A block-level node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Node", into = "Node")]
pub enum Block {
    Header {
        level: u8,
        attr: Attr,
        content: Vec<Inline>,
    },
    Plain(Vec<Inline>),
    /// Format-specific payload, only honored by the matching writer.
    RawMarkup {
        format: String,
        text: String,
    },
    Opaque(Node),
}

impl Block {
    pub fn header(level: u8, attr: Attr, content: Vec<Inline>) -> Self {
        Self::Header {
            level,
            attr,
            content,
        }
    }

    pub fn raw(format: impl Into<String>, text: impl Into<String>) -> Self {
        Self::RawMarkup {
            format: format.into(),
            text: text.into(),
        }
    }

    pub fn is_header(&self) -> bool {
        matches!(self, Self::Header { .. })
    }
}

impl TryFrom<Node> for Block {
    type Error = DocBuildError;

    fn try_from(Node { t, c }: Node) -> Result<Self> {
        let block = match t.as_str() {
            "Header" => {
                let (level, attr, content): (u8, Attr, Vec<Inline>) = decode(&t, c)?;
                Block::Header {
                    level,
                    attr,
                    content,
                }
            }
            "Plain" => Block::Plain(decode(&t, c)?),
            "RawBlock" => {
                let (format, text): (String, String) = decode(&t, c)?;
                Block::RawMarkup { format, text }
            }
            _ => Block::Opaque(Node { t, c }),
        };
        Ok(block)
    }
}

impl From<Block> for Node {
    fn from(block: Block) -> Self {
        match block {
            Block::Header {
                level,
                attr,
                content,
            } => Node::new("Header", json!([level, attr, content])),
            Block::Plain(inlines) => Node::new("Plain", json!(inlines)),
            Block::RawMarkup { format, text } => Node::new("RawBlock", json!([format, text])),
            Block::Opaque(node) => node,
        }
    }
}

// ---------------------------------------------------------------------------
// Inline
// ---------------------------------------------------------------------------

/// Inline containers whose content is a bare inline list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Emph,
    Underline,
    Strong,
    Strikeout,
    Superscript,
    Subscript,
    SmallCaps,
}

impl Style {
    const ALL: [Style; 7] = [
        Style::Emph,
        Style::Underline,
        Style::Strong,
        Style::Strikeout,
        Style::Superscript,
        Style::Subscript,
        Style::SmallCaps,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            Self::Emph => "Emph",
            Self::Underline => "Underline",
            Self::Strong => "Strong",
            Self::Strikeout => "Strikeout",
            Self::Superscript => "Superscript",
            Self::Subscript => "Subscript",
            Self::SmallCaps => "SmallCaps",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.tag() == tag)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum QuoteType {
    SingleQuote,
    DoubleQuote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "t")]
pub enum MathType {
    DisplayMath,
    InlineMath,
}

/// An inline node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Node", into = "Node")]
pub enum Inline {
    Str(String),
    Space,
    SoftBreak,
    LineBreak,
    Styled(Style, Vec<Inline>),
    Quoted(QuoteType, Vec<Inline>),
    Code(Attr, String),
    Math(MathType, String),
    RawInline(String, String),
    Link(Attr, Vec<Inline>, Target),
    Image(Attr, Vec<Inline>, Target),
    Span(Attr, Vec<Inline>),
    Note(Vec<Block>),
    Opaque(Node),
}

impl Inline {
    pub fn str(text: impl Into<String>) -> Self {
        Self::Str(text.into())
    }

    /// Split plain text into `Str` words separated by `Space`/`SoftBreak`,
    /// the way pandoc turns a string into inlines. Only ASCII whitespace
    /// separates words, so non-breaking spaces stay inside a `Str`.
    pub fn text_runs(text: &str) -> Vec<Inline> {
        let mut inlines = Vec::new();
        let mut word = String::new();
        let mut pending_break: Option<Inline> = None;

        for ch in text.chars() {
            match ch {
                ' ' | '\t' | '\r' | '\n' => {
                    if !word.is_empty() {
                        inlines.push(Inline::Str(std::mem::take(&mut word)));
                    }
                    if ch == '\n' {
                        pending_break = Some(Inline::SoftBreak);
                    } else if pending_break.is_none() {
                        pending_break = Some(Inline::Space);
                    }
                }
                _ => {
                    if let Some(brk) = pending_break.take() {
                        if !inlines.is_empty() {
                            inlines.push(brk);
                        }
                    }
                    word.push(ch);
                }
            }
        }
        if !word.is_empty() {
            inlines.push(Inline::Str(word));
        }
        inlines
    }
}

impl TryFrom<Node> for Inline {
    type Error = DocBuildError;

    fn try_from(Node { t, c }: Node) -> Result<Self> {
        if let Some(style) = Style::from_tag(&t) {
            return Ok(Inline::Styled(style, decode(&t, c)?));
        }

        let inline = match t.as_str() {
            "Str" => Inline::Str(decode(&t, c)?),
            "Space" => Inline::Space,
            "SoftBreak" => Inline::SoftBreak,
            "LineBreak" => Inline::LineBreak,
            "Quoted" => {
                let (kind, content): (QuoteType, Vec<Inline>) = decode(&t, c)?;
                Inline::Quoted(kind, content)
            }
            "Code" => {
                let (attr, text): (Attr, String) = decode(&t, c)?;
                Inline::Code(attr, text)
            }
            "Math" => {
                let (kind, text): (MathType, String) = decode(&t, c)?;
                Inline::Math(kind, text)
            }
            "RawInline" => {
                let (format, text): (String, String) = decode(&t, c)?;
                Inline::RawInline(format, text)
            }
            "Link" => {
                let (attr, content, target): (Attr, Vec<Inline>, Target) = decode(&t, c)?;
                Inline::Link(attr, content, target)
            }
            "Image" => {
                let (attr, content, target): (Attr, Vec<Inline>, Target) = decode(&t, c)?;
                Inline::Image(attr, content, target)
            }
            "Span" => {
                let (attr, content): (Attr, Vec<Inline>) = decode(&t, c)?;
                Inline::Span(attr, content)
            }
            "Note" => Inline::Note(decode(&t, c)?),
            _ => Inline::Opaque(Node { t, c }),
        };
        Ok(inline)
    }
}

impl From<Inline> for Node {
    fn from(inline: Inline) -> Self {
        match inline {
            Inline::Str(text) => Node::new("Str", json!(text)),
            Inline::Space => Node::unit("Space"),
            Inline::SoftBreak => Node::unit("SoftBreak"),
            Inline::LineBreak => Node::unit("LineBreak"),
            Inline::Styled(style, content) => Node::new(style.tag(), json!(content)),
            Inline::Quoted(kind, content) => Node::new("Quoted", json!([kind, content])),
            Inline::Code(attr, text) => Node::new("Code", json!([attr, text])),
            Inline::Math(kind, text) => Node::new("Math", json!([kind, text])),
            Inline::RawInline(format, text) => Node::new("RawInline", json!([format, text])),
            Inline::Link(attr, content, target) => {
                Node::new("Link", json!([attr, content, target]))
            }
            Inline::Image(attr, content, target) => {
                Node::new("Image", json!([attr, content, target]))
            }
            Inline::Span(attr, content) => Node::new("Span", json!([attr, content])),
            Inline::Note(blocks) => Node::new("Note", json!(blocks)),
            Inline::Opaque(node) => node,
        }
    }
}

// ---------------------------------------------------------------------------
// Text flattening
// ---------------------------------------------------------------------------

/// Plain text of an inline list with all formatting stripped.
///
/// Mirrors pandoc's `stringify`: breaks become single spaces, quotes become
/// curly quote characters, footnotes and raw fragments are dropped.
pub fn stringify(inlines: &[Inline]) -> String {
    let mut out = String::new();
    for inline in inlines {
        push_text(inline, &mut out);
    }
    out
}

fn push_text(inline: &Inline, out: &mut String) {
    match inline {
        Inline::Str(text) => out.push_str(text),
        Inline::Space | Inline::SoftBreak | Inline::LineBreak => out.push(' '),
        Inline::Code(_, text) | Inline::Math(_, text) => out.push_str(text),
        Inline::RawInline(format, text) => {
            if format == "html" && text.starts_with("<br") {
                out.push(' ');
            }
        }
        Inline::Quoted(kind, content) => {
            let (open, close) = match kind {
                QuoteType::SingleQuote => ('\u{2018}', '\u{2019}'),
                QuoteType::DoubleQuote => ('\u{201C}', '\u{201D}'),
            };
            out.push(open);
            content.iter().for_each(|i| push_text(i, out));
            out.push(close);
        }
        Inline::Styled(_, content)
        | Inline::Link(_, content, _)
        | Inline::Image(_, content, _)
        | Inline::Span(_, content) => content.iter().for_each(|i| push_text(i, out)),
        Inline::Note(_) => {}
        Inline::Opaque(node) => push_value_text(&node.c, out),
    }
}

/// Text of an uninterpreted subtree (e.g. the content of a `Cite`).
fn push_value_text(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => match (map.get("t").and_then(Value::as_str), map.get("c")) {
            (Some("Str"), Some(Value::String(text))) => out.push_str(text),
            (Some("Space" | "SoftBreak" | "LineBreak"), _) => out.push(' '),
            (Some("Note"), _) => {}
            (_, Some(content)) => push_value_text(content, out),
            _ => {}
        },
        Value::Array(items) => items.iter().for_each(|v| push_value_text(v, out)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"{"pandoc-api-version":[1,23,1],"meta":{"title":{"t":"MetaInlines","c":[{"t":"Str","c":"Guide"}]}},"blocks":[{"t":"Header","c":[1,["intro",[],[]],[{"t":"Str","c":"Intro"}]]},{"t":"Para","c":[{"t":"Str","c":"Hello"},{"t":"Space"},{"t":"Emph","c":[{"t":"Str","c":"world"}]}]},{"t":"Header","c":[2,["the-api",["unnumbered"],[["lang","en"]]],[{"t":"Str","c":"The"},{"t":"Space"},{"t":"Code","c":[["",[],[]],"api"]}]]},{"t":"RawBlock","c":["html","<hr/>"]}]}"##;

    #[test]
    fn decode_known_and_opaque_blocks() {
        let doc = Document::from_json(SAMPLE).expect("decode");
        assert_eq!(doc.blocks.len(), 4);

        match &doc.blocks[0] {
            Block::Header {
                level,
                attr,
                content,
            } => {
                assert_eq!(*level, 1);
                assert_eq!(attr.identifier, "intro");
                assert_eq!(content, &vec![Inline::str("Intro")]);
            }
            other => panic!("expected header, got {other:?}"),
        }

        match &doc.blocks[1] {
            Block::Opaque(node) => assert_eq!(node.t, "Para"),
            other => panic!("expected opaque para, got {other:?}"),
        }

        match &doc.blocks[2] {
            Block::Header { attr, .. } => {
                assert!(attr.has_class("unnumbered"));
                assert_eq!(attr.attributes, vec![("lang".into(), "en".into())]);
            }
            other => panic!("expected header, got {other:?}"),
        }

        assert_eq!(doc.blocks[3], Block::raw("html", "<hr/>"));
    }

    #[test]
    fn reencoding_preserves_json() {
        let doc = Document::from_json(SAMPLE).expect("decode");
        let encoded = doc.to_json().expect("encode");

        let original: Value = serde_json::from_str(SAMPLE).expect("parse sample");
        let reencoded: Value = serde_json::from_str(&encoded).expect("parse output");
        assert_eq!(original, reencoded);
    }

    #[test]
    fn malformed_known_node_is_an_error() {
        let bad = r#"{"pandoc-api-version":[1,23,1],"meta":{},"blocks":[{"t":"Header","c":["one"]}]}"#;
        let err = Document::from_json(bad).unwrap_err();
        assert!(err.to_string().contains("Header"));
    }

    #[test]
    fn stringify_strips_formatting() {
        let inlines = vec![
            Inline::Styled(Style::Strong, vec![Inline::str("Bold")]),
            Inline::Space,
            Inline::Code(Attr::default(), "code()".into()),
            Inline::SoftBreak,
            Inline::Quoted(QuoteType::DoubleQuote, vec![Inline::str("quoted")]),
            Inline::Note(vec![Block::Plain(vec![Inline::str("footnote")])]),
            Inline::RawInline("html".into(), "<br/>".into()),
            Inline::RawInline("latex".into(), r"\relax".into()),
            Inline::str("end"),
        ];
        assert_eq!(stringify(&inlines), "Bold code() \u{201C}quoted\u{201D} end");
    }

    #[test]
    fn stringify_walks_opaque_nodes() {
        let cite: Inline = serde_json::from_value(json!({
            "t": "Cite",
            "c": [[], [{"t": "Str", "c": "[@doe]"}, {"t": "Space"}, {"t": "Str", "c": "x"}]]
        }))
        .expect("decode cite");
        assert!(matches!(cite, Inline::Opaque(_)));
        assert_eq!(stringify(&[cite]), "[@doe] x");
    }

    #[test]
    fn text_runs_split_on_ascii_whitespace_only() {
        let runs = Inline::text_runs("1.1\u{a0}\u{a0}Getting  Started\nNow");
        assert_eq!(
            runs,
            vec![
                Inline::str("1.1\u{a0}\u{a0}Getting"),
                Inline::Space,
                Inline::str("Started"),
                Inline::SoftBreak,
                Inline::str("Now"),
            ]
        );
        assert!(Inline::text_runs("  ").is_empty());
    }
}
