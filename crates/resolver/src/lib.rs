//! Import resolution and dependency inlining for Solidity sources
//!
//! This crate turns a contract that references external modules into a single
//! self-contained compilation unit:
//! - Source normalization (markdown fences and leading prose are removed)
//! - Import extraction from Solidity source files
//! - Recursive dependency resolution against a built-in dependency table and
//!   the local filesystem, with cycle and depth protection
//! - Assembly of one compilation unit with a single license and pragma
//! - Import graph construction for dependency tree views

pub mod assembler;
pub mod extractor;
pub mod graph;
pub mod lookup;
pub mod normalizer;
pub mod pipeline;
pub mod remapper;
pub mod resolver;
pub mod stdlib;

pub use assembler::{assemble, AssembleOptions, Assembler};
pub use extractor::ImportExtractor;
pub use graph::{DependencyNode, ImportGraph, NodeStatus};
pub use lookup::{FsLookup, LayeredLookup, MemoryLookup, SourceLookup};
pub use normalizer::normalize;
pub use pipeline::{prepare_for_compilation, Pipeline, Prepared};
pub use remapper::ImportRemapper;
pub use resolver::{resolve, DependencySet, Resolution, ResolveOptions, Resolver};
pub use stdlib::StdLibrary;

use indexmap::IndexSet;
use serde::Serialize;
use std::fmt;
use std::ops::Range;
use thiserror::Error;

/// Path given to the main contract when it has no file name of its own
pub const ROOT_PATH: &str = "root";

/// Errors that can occur during import resolution
#[derive(Error, Debug)]
pub enum ResolverError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Source is empty: nothing to resolve")]
    EmptySource,

    #[error("Circular dependency detected: {0}")]
    CircularDependency(String),

    #[error("Invalid dependency table: {0}")]
    StdLibrary(String),
}

/// Result type for resolver operations
pub type ResolverResult<T> = Result<T, ResolverError>;

/// A named chunk of Solidity text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    /// Import path of the unit, or [`ROOT_PATH`] for the main contract
    pub path: String,
    /// Source text including its own license, pragma and import lines
    pub raw_text: String,
    /// Top-level contract, interface and library names, in declaration order
    pub declared_symbols: IndexSet<String>,
}

impl SourceUnit {
    pub fn new(path: impl Into<String>, raw_text: impl Into<String>) -> Self {
        let raw_text = raw_text.into();
        let declared_symbols = extractor::extract_declared_symbol_names(&raw_text)
            .into_iter()
            .collect();

        Self {
            path: path.into(),
            raw_text,
            declared_symbols,
        }
    }

    /// The main contract of a resolution run
    pub fn root(raw_text: impl Into<String>) -> Self {
        Self::new(ROOT_PATH, raw_text)
    }
}

/// Directed edge from an importing unit to an import path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ImportEdge {
    pub from: String,
    pub to: String,
}

/// Represents an imported symbol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedSymbol {
    /// Name of the symbol in the source file
    pub name: String,
    /// Alias for the symbol (for "import {X as Y}")
    pub alias: Option<String>,
}

/// Types of Solidity import statements
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportKind {
    /// Simple import: `import "path";`
    Simple,
    /// Named imports: `import {A, B} from "path";`
    Named(Vec<ImportedSymbol>),
    /// Aliased import: `import "path" as X;`
    Aliased(String),
    /// Wildcard import: `import * as X from "path";`
    Wildcard(String),
}

impl ImportKind {
    /// Namespace or symbol aliases that do not survive inlining
    pub fn aliases(&self) -> Vec<&str> {
        match self {
            ImportKind::Simple => vec![],
            ImportKind::Named(symbols) => symbols
                .iter()
                .filter_map(|symbol| symbol.alias.as_deref())
                .collect(),
            ImportKind::Aliased(alias) | ImportKind::Wildcard(alias) => vec![alias.as_str()],
        }
    }
}

/// Represents a parsed import statement
#[derive(Debug, Clone)]
pub struct Import {
    /// The import path as written in source
    pub path: String,
    /// Type of import
    pub kind: ImportKind,
    /// Line number in source file
    pub line: usize,
    /// Byte range of the whole statement, terminating semicolon included
    pub span: Range<usize>,
}

/// Category of a non-fatal resolution message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    UnresolvedImport,
    CyclicImport,
    DuplicateSymbol,
    DepthLimitExceeded,
    ImportAlias,
    MissingHeader,
}

/// A non-fatal anomaly reported alongside the best-effort output
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// Import path the message is about
    pub path: String,
    /// Unit containing the offending import, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn unresolved_import(path: &str, from: &str) -> Self {
        Self {
            kind: DiagnosticKind::UnresolvedImport,
            path: path.to_string(),
            from: Some(from.to_string()),
            message: format!("unresolved import: `{}`", path),
        }
    }

    pub fn cyclic_import(path: &str, from: &str) -> Self {
        Self {
            kind: DiagnosticKind::CyclicImport,
            path: path.to_string(),
            from: Some(from.to_string()),
            message: format!(
                "circular import of `{}` from `{}` skipped; it is inlined by its first importer",
                path, from
            ),
        }
    }

    pub fn duplicate_symbol(path: &str, from: &str, symbols: &[String]) -> Self {
        Self {
            kind: DiagnosticKind::DuplicateSymbol,
            path: path.to_string(),
            from: Some(from.to_string()),
            message: format!(
                "`{}` dropped: {} already defined by an earlier dependency",
                path,
                symbols
                    .iter()
                    .map(|s| format!("`{}`", s))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }

    pub fn depth_limit_exceeded(path: &str, from: &str, max_depth: usize) -> Self {
        Self {
            kind: DiagnosticKind::DepthLimitExceeded,
            path: path.to_string(),
            from: Some(from.to_string()),
            message: format!(
                "import `{}` not inlined: dependency depth limit of {} reached",
                path, max_depth
            ),
        }
    }

    pub fn import_alias(path: &str, from: &str, aliases: &[&str]) -> Self {
        Self {
            kind: DiagnosticKind::ImportAlias,
            path: path.to_string(),
            from: Some(from.to_string()),
            message: format!(
                "import of `{}` uses alias {}; aliases are not preserved when inlining",
                path,
                aliases
                    .iter()
                    .map(|a| format!("`{}`", a))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }

    pub fn missing_header(path: &str) -> Self {
        Self {
            kind: DiagnosticKind::MissingHeader,
            path: path.to_string(),
            from: None,
            message: "no SPDX license or pragma found; default license and pragma are used"
                .to_string(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}
