//! Source normalization for generated or pasted contracts
//!
//! Model output usually arrives wrapped in markdown fences and sometimes
//! preceded by prose. Normalization recovers the bare Solidity file.

use crate::extractor;
use regex::Regex;
use std::sync::LazyLock;

const FENCE: &str = "```";

static LICENSE_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"//[ \t]*SPDX-License-Identifier").expect("Invalid license marker regex")
});

static PRAGMA_KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bpragma\s+(solidity|abicoder|experimental)\b").expect("Invalid pragma regex")
});

static CODE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```([\w+-]*)[ \t]*\r?\n(.*?)```").expect("Invalid code block regex")
});

/// Strip markdown fences and leading noise
///
/// Never fails and is idempotent: the single cleaning step only ever removes
/// text, and it is repeated until the text stops changing.
pub fn normalize(text: &str) -> String {
    let mut current = normalize_step(text);
    loop {
        let next = normalize_step(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn normalize_step(text: &str) -> String {
    let trimmed = text.trim();
    let unfenced = strip_fences(trimmed);
    skip_leading_prose(unfenced.trim()).to_string()
}

fn strip_fences(text: &str) -> String {
    if let Some(rest) = text.strip_prefix(FENCE) {
        // Opening fence, optionally followed by a language tag
        let rest = rest.trim_start_matches('`');
        let rest = rest.trim_start_matches(|c: char| c.is_alphanumeric() || "_+-".contains(c));
        let body = rest.trim_end();
        let body = body.strip_suffix(FENCE).unwrap_or(body);
        return body.trim_end_matches('`').to_string();
    }

    // An embedded block only counts when it comes before the header, so a
    // fenced example inside a doc comment stays part of the contract
    if !starts_with_header(text) {
        if let Some(caps) = CODE_BLOCK.captures(text) {
            let fence_start = caps.get(0).map_or(0, |m| m.start());
            if first_marker(text).map_or(true, |marker| fence_start < marker) {
                return caps[2].to_string();
            }
        }
    }

    match text.strip_suffix(FENCE) {
        Some(body) => body.trim_end_matches('`').to_string(),
        None => text.to_string(),
    }
}

fn skip_leading_prose(text: &str) -> &str {
    if starts_with_header(text) {
        return text;
    }

    match first_marker(text) {
        Some(start) => &text[start..],
        None => text,
    }
}

/// Offset of the earlier of the first license comment and the first pragma
fn first_marker(text: &str) -> Option<usize> {
    let license = LICENSE_MARKER.find(text).map(|m| m.start());
    let pragma = PRAGMA_KEYWORD.find(text).map(|m| m.start());

    match (license, pragma) {
        (Some(l), Some(p)) => Some(l.min(p)),
        (start, None) | (None, start) => start,
    }
}

fn starts_with_header(text: &str) -> bool {
    text.starts_with("//")
        || text.starts_with("/*")
        || PRAGMA_KEYWORD.find(text).is_some_and(|m| m.start() == 0)
}

/// Whether the text starts like a Solidity file (comment or pragma first)
/// and carries a license or pragma at all
pub fn looks_like_solidity(text: &str) -> bool {
    let text = text.trim_start();
    starts_with_header(text)
        && (extractor::extract_license(text).is_some() || extractor::extract_pragma(text).is_some())
}

/// Concatenated bodies of all fenced code blocks
///
/// When `language` is given only blocks tagged with it (case-insensitive) are
/// kept. Returns the input unchanged when no block matches.
pub fn extract_code_blocks(markdown: &str, language: Option<&str>) -> String {
    let blocks: Vec<&str> = CODE_BLOCK
        .captures_iter(markdown)
        .filter(|caps| match language {
            Some(lang) => caps[1].eq_ignore_ascii_case(lang),
            None => true,
        })
        .filter_map(|caps| caps.get(2).map(|m| m.as_str().trim_end()))
        .collect();

    if blocks.is_empty() {
        return markdown.to_string();
    }

    blocks.join("\n\n").trim().to_string()
}

/// Whether any import statement is left in the text
pub fn has_imports(text: &str) -> bool {
    !extractor::extract_imports(text).is_empty()
}
