//! Assembly of a single compilation unit
//!
//! The assembler never looks anything up. It takes a root unit and the
//! dependencies the resolver produced and concatenates them behind one license
//! line and one pragma block.

use crate::extractor;
use crate::resolver::DependencySet;
use crate::SourceUnit;
use indexmap::IndexSet;

pub const DEFAULT_LICENSE: &str = "MIT";
pub const DEFAULT_SOLIDITY_VERSION: &str = "^0.8.0";

pub const DEPENDENCIES_MARKER: &str = "// AUTO-INLINED DEPENDENCIES";
pub const MAIN_CONTRACT_MARKER: &str = "// MAIN CONTRACT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembleOptions {
    /// License identifier used when the root has none
    pub default_license: String,
    /// Version constraint used when the root has no solidity pragma
    pub default_solidity_version: String,
}

impl Default for AssembleOptions {
    fn default() -> Self {
        Self {
            default_license: DEFAULT_LICENSE.to_string(),
            default_solidity_version: DEFAULT_SOLIDITY_VERSION.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Assembler {
    options: AssembleOptions,
}

impl Assembler {
    pub fn new(options: AssembleOptions) -> Self {
        Self { options }
    }

    /// Merge `root` and `deps` into one source string
    ///
    /// Dependencies are emitted in the order of `deps`, each under an
    /// `// Inlined from <path>` line, followed by the cleaned root body.
    pub fn assemble(&self, root: &SourceUnit, deps: &DependencySet) -> String {
        let license = extractor::extract_license(&root.raw_text)
            .unwrap_or_else(|| self.options.default_license.clone());
        let pragma = extractor::extract_pragma(&root.raw_text).unwrap_or_else(|| {
            format!("pragma solidity {};", self.options.default_solidity_version)
        });

        let mut other_pragmas: IndexSet<String> = IndexSet::new();
        other_pragmas.extend(extractor::extract_other_pragmas(&root.raw_text));
        for dep in deps {
            other_pragmas.extend(extractor::extract_other_pragmas(&dep.raw_text));
        }

        let mut out = String::new();
        out.push_str(&format!("// SPDX-License-Identifier: {}\n", license));
        out.push_str(&pragma);
        out.push('\n');
        for other in &other_pragmas {
            out.push_str(other);
            out.push('\n');
        }

        let blocks: Vec<(&str, String)> = deps
            .iter()
            .map(|dep| (dep.path.as_str(), clean_body(&dep.raw_text)))
            .filter(|(_, body)| !body.is_empty())
            .collect();
        let main = clean_body(&root.raw_text);

        if !blocks.is_empty() {
            out.push('\n');
            out.push_str(DEPENDENCIES_MARKER);
            out.push('\n');
            for (path, body) in &blocks {
                out.push_str(&format!("\n// Inlined from {}\n", path));
                out.push_str(body);
                out.push('\n');
            }
            out.push('\n');
            out.push_str(MAIN_CONTRACT_MARKER);
            out.push('\n');
        }

        if !main.is_empty() {
            out.push('\n');
            out.push_str(&main);
            out.push('\n');
        }

        tracing::debug!(
            "Assembled {} bytes from {} dependencies",
            out.len(),
            blocks.len()
        );

        out
    }
}

/// Assemble with default options
pub fn assemble(root: &SourceUnit, deps: &DependencySet) -> String {
    Assembler::default().assemble(root, deps)
}

/// Body of a unit without imports, pragmas and license lines
pub fn clean_body(source: &str) -> String {
    let stripped = extractor::strip_imports(source);
    let stripped = extractor::strip_pragmas(&stripped);
    let stripped = extractor::strip_license_lines(&stripped);
    collapse_blank_lines(&stripped).trim().to_string()
}

/// Collapse runs of blank lines into one and drop trailing whitespace
pub fn collapse_blank_lines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous_blank = false;

    for line in text.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            if !previous_blank {
                out.push('\n');
            }
            previous_blank = true;
        } else {
            out.push_str(line);
            out.push('\n');
            previous_blank = false;
        }
    }

    out
}
