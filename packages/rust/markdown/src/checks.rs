//! Line-oriented checks over Markdown source text.
//!
//! Each check is a function `(name, content) -> Vec<Finding>`; they never
//! fail, a finding is a warning for the author.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::{BarePath, BrokenLink, heading_to_anchor};

// ---------------------------------------------------------------------------
// Check 1: Internal anchor links
// ---------------------------------------------------------------------------

/// Report `[text](#anchor)` links whose anchor matches no ATX heading.
pub(crate) fn broken_links(file: &str, content: &str) -> Vec<BrokenLink> {
    static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^(#{1,6})\s+(.+?)(?:\s*#*\s*)?$").expect("valid regex")
    });
    static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\[([^\]]*)\]\(#([^)]+)\)").expect("valid regex")
    });

    let anchors: HashSet<String> = content
        .lines()
        .filter_map(|line| HEADING_RE.captures(line))
        .map(|caps| heading_to_anchor(&caps[2]))
        .collect();

    LINK_RE
        .captures_iter(content)
        .filter(|caps| !anchors.contains(&caps[2]))
        .map(|caps| {
            let start = caps.get(0).map_or(0, |m| m.start());
            BrokenLink {
                file: file.to_string(),
                line: line_number(content, start),
                target: caps[2].to_string(),
                text: caps[1].to_string(),
            }
        })
        .collect()
}

/// 1-based line number of a byte offset.
fn line_number(content: &str, offset: usize) -> usize {
    content[..offset].matches('\n').count() + 1
}

// ---------------------------------------------------------------------------
// Check 2: Bare Windows paths
// ---------------------------------------------------------------------------

/// Report Windows drive paths outside code; LaTeX chokes on the backslashes.
pub(crate) fn bare_paths(file: &str, content: &str) -> Vec<BarePath> {
    static CODE_SPAN_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"`[^`]+`").expect("valid regex"));
    static DRIVE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[A-Z]:\\[\w\\]").expect("valid regex"));
    static FULL_PATH_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[A-Z]:\\[^\s,)]+").expect("valid regex"));

    let mut findings = Vec::new();
    let mut in_code_block = false;

    for (idx, line) in content.lines().enumerate() {
        if line.trim().starts_with("```") {
            in_code_block = !in_code_block;
            continue;
        }
        if in_code_block {
            continue;
        }

        let stripped = CODE_SPAN_RE.replace_all(line, "");
        for m in DRIVE_RE.find_iter(&stripped) {
            let path = FULL_PATH_RE
                .find(&stripped[m.start()..])
                .map_or(m.as_str(), |full| full.as_str());
            findings.push(BarePath {
                file: file.to_string(),
                line: idx + 1,
                path: path.to_string(),
            });
        }
    }

    findings
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
