//! Import, pragma, license and declaration extraction from Solidity source
//!
//! Extraction is regex based and runs over a masked copy of the source.
//! Masking replaces comment bytes (and, for pragmas and declarations, string
//! contents) with spaces and keeps newlines, so byte offsets and line numbers
//! found on the masked text are valid on the source text as well.
//!
//! A pragma ends at its semicolon or, when the semicolon is missing, at the
//! end of its line.

use crate::{Import, ImportKind, ImportedSymbol};
use indexmap::IndexSet;
use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

static EXTRACTOR: LazyLock<ImportExtractor> = LazyLock::new(ImportExtractor::new);

static PRAGMA_SOLIDITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bpragma\s+solidity\b[^;{}\r\n]*;?").expect("Invalid solidity pragma regex")
});

static PRAGMA_ANY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\bpragma\s+[A-Za-z_]\w*\b[^;{}\r\n]*;?").expect("Invalid pragma regex")
});

static LICENSE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*//[ \t]*SPDX-License-Identifier:[ \t]*([^\r\n]*?)[ \t]*\r?$")
        .expect("Invalid license regex")
});

static DECLARATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(abstract\s+contract|contract|interface|library)\s+([A-Za-z_$][\w$]*)")
        .expect("Invalid declaration regex")
});

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Invalid whitespace regex"));

/// Extracts import statements from Solidity source code
pub struct ImportExtractor {
    statement: Regex,
    simple_import: Regex,
    named_import: Regex,
    aliased_import: Regex,
    wildcard_import: Regex,
}

impl Default for ImportExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportExtractor {
    /// Create a new import extractor
    pub fn new() -> Self {
        // Any statement introduced by the import keyword, possibly spanning lines
        let statement = Regex::new(r"\bimport\b([^;]*);").expect("Invalid import statement regex");

        // Simple import: "path"
        let simple_import =
            Regex::new(r#"^["']([^"']+)["']$"#).expect("Invalid simple import regex");

        // Named import: {A, B as C} from "path"
        let named_import = Regex::new(r#"^\{([^}]*)\}\s*from\s*["']([^"']+)["']$"#)
            .expect("Invalid named import regex");

        // Aliased import: "path" as X
        let aliased_import = Regex::new(r#"^["']([^"']+)["']\s+as\s+([A-Za-z_$][\w$]*)$"#)
            .expect("Invalid aliased import regex");

        // Wildcard import: * as X from "path"
        let wildcard_import =
            Regex::new(r#"^\*\s*as\s+([A-Za-z_$][\w$]*)\s+from\s*["']([^"']+)["']$"#)
                .expect("Invalid wildcard import regex");

        Self {
            statement,
            simple_import,
            named_import,
            aliased_import,
            wildcard_import,
        }
    }

    /// Extract all imports from source code, in source order
    pub fn extract(&self, source: &str) -> Vec<Import> {
        let masked = mask_comments(source);
        let mut imports = Vec::new();

        for caps in self.statement.captures_iter(&masked) {
            let (Some(whole), Some(body)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let line = line_of(&masked, whole.start());

            if let Some(import) = self.classify(body.as_str().trim(), line, whole.range()) {
                imports.push(import);
            } else {
                tracing::debug!("Ignoring unrecognised import statement on line {}", line);
            }
        }

        imports
    }

    fn classify(&self, body: &str, line: usize, span: Range<usize>) -> Option<Import> {
        if let Some(caps) = self.simple_import.captures(body) {
            return Some(Import {
                path: caps[1].to_string(),
                kind: ImportKind::Simple,
                line,
                span,
            });
        }

        if let Some(caps) = self.named_import.captures(body) {
            return Some(Import {
                path: caps[2].to_string(),
                kind: ImportKind::Named(parse_named_symbols(&caps[1])),
                line,
                span,
            });
        }

        if let Some(caps) = self.aliased_import.captures(body) {
            return Some(Import {
                path: caps[1].to_string(),
                kind: ImportKind::Aliased(caps[2].to_string()),
                line,
                span,
            });
        }

        self.wildcard_import.captures(body).map(|caps| Import {
            path: caps[2].to_string(),
            kind: ImportKind::Wildcard(caps[1].to_string()),
            line,
            span,
        })
    }
}

/// Parse named import symbols (e.g., "A, B as C, D")
fn parse_named_symbols(symbols_str: &str) -> Vec<ImportedSymbol> {
    symbols_str
        .split(',')
        .filter_map(|s| {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }

            let mut parts = s.split_whitespace();
            let name = parts.next()?.to_string();
            let alias = match (parts.next(), parts.next()) {
                (Some("as"), Some(alias)) => Some(alias.to_string()),
                _ => None,
            };

            Some(ImportedSymbol { name, alias })
        })
        .collect()
}

/// Import paths in first-seen order, without duplicates
pub fn extract_import_paths(source: &str) -> Vec<String> {
    let paths: IndexSet<String> = EXTRACTOR
        .extract(source)
        .into_iter()
        .map(|import| import.path)
        .collect();
    paths.into_iter().collect()
}

/// All import statements of the source
pub fn extract_imports(source: &str) -> Vec<Import> {
    EXTRACTOR.extract(source)
}

/// Names of top-level contracts, abstract contracts, interfaces and libraries
///
/// Only headers at brace depth zero count, so nothing inside a contract body
/// (or inside a comment or string) is reported.
pub fn extract_declared_symbol_names(source: &str) -> Vec<String> {
    let masked = mask_comments_and_strings(source);
    let mut names = IndexSet::new();
    let mut depth: i64 = 0;
    let mut scanned = 0;

    for caps in DECLARATION.captures_iter(&masked) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(2)) else {
            continue;
        };
        depth += brace_delta(&masked[scanned..whole.start()]);
        scanned = whole.start();

        if depth == 0 {
            names.insert(name.as_str().to_string());
        }
    }

    names.into_iter().collect()
}

/// The first `pragma solidity ...;` statement, with whitespace normalised
pub fn extract_pragma(source: &str) -> Option<String> {
    let masked = mask_comments_and_strings(source);
    PRAGMA_SOLIDITY
        .find(&masked)
        .map(|m| normalize_statement(&source[m.range()]))
}

/// The version constraint of the first solidity pragma (e.g. `^0.8.0`)
pub fn extract_pragma_version(source: &str) -> Option<String> {
    extract_pragma(source).and_then(|pragma| {
        pragma
            .strip_prefix("pragma solidity")
            .map(|rest| rest.trim_end_matches(';').trim().to_string())
            .filter(|version| !version.is_empty())
    })
}

/// Pragmas other than the version pragma (`abicoder`, `experimental`, ...)
pub fn extract_other_pragmas(source: &str) -> Vec<String> {
    let masked = mask_comments_and_strings(source);
    PRAGMA_ANY
        .find_iter(&masked)
        .filter(|m| !PRAGMA_SOLIDITY.is_match(m.as_str()))
        .map(|m| normalize_statement(&source[m.range()]))
        .collect()
}

/// The identifier of the first SPDX license comment (e.g. `MIT`)
pub fn extract_license(source: &str) -> Option<String> {
    LICENSE_LINE
        .captures(source)
        .map(|caps| caps[1].trim().to_string())
        .filter(|license| !license.is_empty())
}

/// Remove every import statement
pub fn strip_imports(source: &str) -> String {
    let spans: Vec<Range<usize>> = EXTRACTOR
        .extract(source)
        .into_iter()
        .map(|import| import.span)
        .collect();
    remove_spans(source, &spans)
}

/// Remove every pragma statement, version pragma included
pub fn strip_pragmas(source: &str) -> String {
    let masked = mask_comments_and_strings(source);
    let spans: Vec<Range<usize>> = PRAGMA_ANY.find_iter(&masked).map(|m| m.range()).collect();
    remove_spans(source, &spans)
}

/// Remove every SPDX license line
pub fn strip_license_lines(source: &str) -> String {
    let spans: Vec<Range<usize>> = LICENSE_LINE.find_iter(source).map(|m| m.range()).collect();
    remove_spans(source, &spans)
}

/// Replace comments with spaces, keeping newlines and byte offsets
pub fn mask_comments(source: &str) -> String {
    mask(source, false)
}

fn mask_comments_and_strings(source: &str) -> String {
    mask(source, true)
}

#[derive(Clone, Copy)]
enum MaskState {
    Code,
    LineComment,
    BlockComment,
    Str(char),
}

fn mask(source: &str, blank_strings: bool) -> String {
    let mut out = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut state = MaskState::Code;

    while let Some(c) = chars.next() {
        match state {
            MaskState::Code => match c {
                '/' if chars.peek() == Some(&'/') => {
                    chars.next();
                    out.push_str("  ");
                    state = MaskState::LineComment;
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    out.push_str("  ");
                    state = MaskState::BlockComment;
                }
                '"' | '\'' => {
                    out.push(c);
                    state = MaskState::Str(c);
                }
                _ => out.push(c),
            },
            MaskState::LineComment => {
                if c == '\n' {
                    out.push('\n');
                    state = MaskState::Code;
                } else {
                    blank(&mut out, c);
                }
            }
            MaskState::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    out.push_str("  ");
                    state = MaskState::Code;
                } else if c == '\n' {
                    out.push('\n');
                } else {
                    blank(&mut out, c);
                }
            }
            MaskState::Str(quote) => {
                if c == quote || c == '\n' {
                    out.push(c);
                    state = MaskState::Code;
                } else if c == '\\' {
                    push_string_char(&mut out, c, blank_strings);
                    if let Some(escaped) = chars.next() {
                        push_string_char(&mut out, escaped, blank_strings);
                    }
                } else {
                    push_string_char(&mut out, c, blank_strings);
                }
            }
        }
    }

    out
}

fn push_string_char(out: &mut String, c: char, blank_strings: bool) {
    if blank_strings && c != '\n' {
        blank(out, c);
    } else {
        out.push(c);
    }
}

fn blank(out: &mut String, c: char) {
    for _ in 0..c.len_utf8() {
        out.push(' ');
    }
}

fn brace_delta(text: &str) -> i64 {
    text.bytes().fold(0, |acc, b| match b {
        b'{' => acc + 1,
        b'}' => acc - 1,
        _ => acc,
    })
}

fn line_of(text: &str, offset: usize) -> usize {
    text[..offset].bytes().filter(|&b| b == b'\n').count() + 1
}

fn normalize_statement(statement: &str) -> String {
    let collapsed = WHITESPACE.replace_all(statement.trim(), " ");
    let statement = collapsed.replace(" ;", ";");
    if statement.ends_with(';') {
        statement
    } else {
        statement + ";"
    }
}

fn remove_spans(source: &str, spans: &[Range<usize>]) -> String {
    if spans.is_empty() {
        return source.to_string();
    }

    let mut sorted = spans.to_vec();
    sorted.sort_by_key(|span| span.start);

    let mut out = String::with_capacity(source.len());
    let mut cursor = 0;
    for span in sorted {
        if span.start < cursor {
            continue;
        }
        out.push_str(&source[cursor..span.start]);
        cursor = span.end;
    }
    out.push_str(&source[cursor..]);
    out
}
