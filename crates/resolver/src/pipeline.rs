//! Normalize, resolve and assemble in one call

use crate::assembler::{AssembleOptions, Assembler};
use crate::lookup::SourceLookup;
use crate::normalizer::normalize;
use crate::resolver::{Resolution, ResolveOptions, Resolver};
use crate::{extractor, Diagnostic, ResolverError, ResolverResult, SourceUnit, ROOT_PATH};

/// Output of [`Pipeline::prepare`]
#[derive(Debug, Clone)]
pub struct Prepared {
    /// Single self-contained compilation unit
    pub source: String,
    /// Every non-fatal message, in the order it was raised
    pub diagnostics: Vec<Diagnostic>,
    pub resolution: Resolution,
}

impl Prepared {
    pub fn has_diagnostics(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    /// Diagnostic messages only
    pub fn messages(&self) -> Vec<String> {
        self.diagnostics.iter().map(ToString::to_string).collect()
    }
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    pub resolve_options: ResolveOptions,
    pub assemble_options: AssembleOptions,
    /// Path given to the main contract
    pub root_path: String,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self {
            resolve_options: ResolveOptions::default(),
            assemble_options: AssembleOptions::default(),
            root_path: ROOT_PATH.to_string(),
        }
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resolve_options(mut self, options: ResolveOptions) -> Self {
        self.resolve_options = options;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.resolve_options.max_depth = max_depth;
        self
    }

    pub fn with_assemble_options(mut self, options: AssembleOptions) -> Self {
        self.assemble_options = options;
        self
    }

    pub fn with_root_path(mut self, root_path: impl Into<String>) -> Self {
        self.root_path = root_path.into();
        self
    }

    /// Turn raw generated or pasted text into one compilable source
    pub fn prepare<L: SourceLookup + ?Sized>(
        &self,
        text: &str,
        lookup: &L,
    ) -> ResolverResult<Prepared> {
        let normalized = normalize(text);
        if normalized.is_empty() {
            return Err(ResolverError::EmptySource);
        }

        let root = SourceUnit::new(self.root_path.clone(), normalized);
        let mut diagnostics = Vec::new();
        if extractor::extract_license(&root.raw_text).is_none()
            && extractor::extract_pragma(&root.raw_text).is_none()
        {
            tracing::warn!("No license or pragma in {}; using defaults", root.path);
            diagnostics.push(Diagnostic::missing_header(&root.path));
        }

        let resolution = Resolver::with_options(lookup, self.resolve_options).resolve(&root)?;
        diagnostics.extend(resolution.diagnostics.iter().cloned());

        let source =
            Assembler::new(self.assemble_options.clone()).assemble(&root, &resolution.dependencies);

        Ok(Prepared {
            source,
            diagnostics,
            resolution,
        })
    }
}

/// [`Pipeline::prepare`] with default options
pub fn prepare_for_compilation<L: SourceLookup + ?Sized>(
    text: &str,
    lookup: &L,
) -> ResolverResult<Prepared> {
    Pipeline::default().prepare(text, lookup)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::MemoryLookup;
    use crate::DiagnosticKind;

    #[test]
    fn test_prepare_without_imports() {
        let text = "```solidity\n// SPDX-License-Identifier: MIT\npragma solidity ^0.8.0;\ncontract A {}\n```";
        let prepared = prepare_for_compilation(text, &MemoryLookup::new()).unwrap();

        assert_eq!(
            prepared.source,
            "// SPDX-License-Identifier: MIT\npragma solidity ^0.8.0;\n\ncontract A {}\n"
        );
        assert!(!prepared.has_diagnostics());
    }

    #[test]
    fn test_missing_header_diagnostic() {
        let prepared = prepare_for_compilation("contract A {}", &MemoryLookup::new()).unwrap();

        assert_eq!(prepared.diagnostics.len(), 1);
        assert_eq!(prepared.diagnostics[0].kind, DiagnosticKind::MissingHeader);
        assert!(prepared.source.starts_with("// SPDX-License-Identifier: MIT\n"));
    }

    #[test]
    fn test_empty_input_is_an_error() {
        assert!(matches!(
            prepare_for_compilation("```solidity\n```", &MemoryLookup::new()),
            Err(ResolverError::EmptySource)
        ));
    }

    #[test]
    fn test_custom_root_path_and_depth() {
        let lookup = MemoryLookup::new().with_source("./B.sol", "import \"./C.sol\";\ncontract B {}");
        let pipeline = Pipeline::new().with_root_path("A.sol").with_max_depth(1);
        let prepared = pipeline
            .prepare("pragma solidity ^0.8.0;\nimport \"./B.sol\";\ncontract A {}", &lookup)
            .unwrap();

        assert_eq!(prepared.resolution.root, "A.sol");
        assert!(prepared.source.contains("contract B {}"));
        assert_eq!(
            prepared.messages(),
            vec!["import `./C.sol` not inlined: dependency depth limit of 1 reached".to_string()]
        );
    }
}
