//! Recursive dependency resolution
//!
//! Resolution walks the import statements of the root unit depth first. Each
//! dependency is looked up once, its own imports are resolved before it is
//! added, so the resulting [`DependencySet`] lists dependencies before the
//! units that use them.

use crate::extractor::{self, ImportExtractor};
use crate::lookup::SourceLookup;
use crate::{Diagnostic, ImportEdge, ResolverError, ResolverResult, SourceUnit};
use indexmap::{IndexMap, IndexSet};
use std::collections::{HashMap, HashSet};

/// Default bound on dependency nesting
pub const DEFAULT_MAX_DEPTH: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Imports nested deeper than this are reported instead of inlined
    pub max_depth: usize,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Resolved dependencies keyed by import path, in discovery order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencySet {
    units: IndexMap<String, SourceUnit>,
}

impl DependencySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a unit unless its path is already present; first resolution wins
    pub fn insert(&mut self, unit: SourceUnit) -> bool {
        if self.units.contains_key(&unit.path) {
            return false;
        }
        self.units.insert(unit.path.clone(), unit);
        true
    }

    pub fn get(&self, path: &str) -> Option<&SourceUnit> {
        self.units.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.units.contains_key(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceUnit> {
        self.units.values()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.units.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl<'a> IntoIterator for &'a DependencySet {
    type Item = &'a SourceUnit;
    type IntoIter = indexmap::map::Values<'a, String, SourceUnit>;

    fn into_iter(self) -> Self::IntoIter {
        self.units.values()
    }
}

/// Outcome of one resolution run
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Path of the root unit
    pub root: String,
    pub dependencies: DependencySet,
    pub diagnostics: Vec<Diagnostic>,
    /// Every import edge seen, in discovery order
    pub edges: Vec<ImportEdge>,
}

/// Per-run mutable state; never shared between runs
#[derive(Default)]
struct ResolutionContext {
    /// Recursion stack, by cycle key
    visiting: IndexSet<String>,
    /// Flattened text of each resolved path
    resolved_cache: HashMap<String, String>,
    /// Paths the lookup could not serve
    missing: HashSet<String>,
    included_symbols: HashSet<String>,
    dependencies: DependencySet,
    diagnostics: Vec<Diagnostic>,
    edges: Vec<ImportEdge>,
}

/// Resolves the imports of a root unit through a [`SourceLookup`]
pub struct Resolver<'a, L: SourceLookup + ?Sized> {
    lookup: &'a L,
    extractor: ImportExtractor,
    options: ResolveOptions,
}

impl<'a, L: SourceLookup + ?Sized> Resolver<'a, L> {
    pub fn new(lookup: &'a L) -> Self {
        Self::with_options(lookup, ResolveOptions::default())
    }

    pub fn with_options(lookup: &'a L, options: ResolveOptions) -> Self {
        Self {
            lookup,
            extractor: ImportExtractor::new(),
            options,
        }
    }

    /// Resolve every dependency of `root`
    ///
    /// Unresolvable, cyclic and duplicate imports are reported as diagnostics;
    /// only an empty root is an error.
    pub fn resolve(&self, root: &SourceUnit) -> ResolverResult<Resolution> {
        if root.raw_text.trim().is_empty() {
            return Err(ResolverError::EmptySource);
        }

        let mut ctx = ResolutionContext::default();
        ctx.visiting.insert(cycle_key(&root.path).to_string());
        // The root's own declarations always win over inlined copies
        ctx.included_symbols
            .extend(root.declared_symbols.iter().cloned());

        self.resolve_imports(&root.path, &root.raw_text, true, 0, &mut ctx);

        tracing::info!(
            "Resolved {} dependencies for {} ({} diagnostics)",
            ctx.dependencies.len(),
            root.path,
            ctx.diagnostics.len()
        );

        Ok(Resolution {
            root: root.path.clone(),
            dependencies: ctx.dependencies,
            diagnostics: ctx.diagnostics,
            edges: ctx.edges,
        })
    }

    fn resolve_imports(
        &self,
        from: &str,
        text: &str,
        from_root: bool,
        depth: usize,
        ctx: &mut ResolutionContext,
    ) {
        let mut seen = HashSet::new();

        for import in self.extractor.extract(text) {
            let path = if from_root {
                import.path.clone()
            } else {
                join_import_path(from, &import.path)
            };

            let aliases = import.kind.aliases();
            if !aliases.is_empty() {
                ctx.diagnostics
                    .push(Diagnostic::import_alias(&path, from, &aliases));
            }

            if !seen.insert(path.clone()) {
                continue;
            }

            ctx.edges.push(ImportEdge {
                from: from.to_string(),
                to: path.clone(),
            });

            if ctx.visiting.contains(cycle_key(&path)) {
                tracing::debug!("Skipping circular import '{}' from {}", path, from);
                ctx.diagnostics.push(Diagnostic::cyclic_import(&path, from));
                continue;
            }

            if ctx.resolved_cache.contains_key(&path) || ctx.missing.contains(&path) {
                continue;
            }

            if depth >= self.options.max_depth {
                tracing::warn!(
                    "Dependency depth limit {} reached at '{}'",
                    self.options.max_depth,
                    path
                );
                ctx.diagnostics.push(Diagnostic::depth_limit_exceeded(
                    &path,
                    from,
                    self.options.max_depth,
                ));
                continue;
            }

            let Some(source) = self.lookup.lookup(&path) else {
                tracing::warn!("Could not resolve import '{}' in {}", path, from);
                ctx.missing.insert(path.clone());
                ctx.diagnostics
                    .push(Diagnostic::unresolved_import(&path, from));
                continue;
            };

            ctx.visiting.insert(cycle_key(&path).to_string());
            self.resolve_imports(&path, &source, false, depth + 1, ctx);
            ctx.visiting.pop();

            let flattened = extractor::strip_imports(&source);
            ctx.resolved_cache.insert(path.clone(), flattened.clone());
            admit(SourceUnit::new(path, flattened), from, ctx);
        }
    }
}

/// Add a resolved unit unless one of its symbols is already defined
fn admit(unit: SourceUnit, from: &str, ctx: &mut ResolutionContext) {
    let duplicates: Vec<String> = unit
        .declared_symbols
        .iter()
        .filter(|symbol| ctx.included_symbols.contains(*symbol))
        .cloned()
        .collect();

    if !duplicates.is_empty() {
        tracing::debug!(
            "Dropping {}: duplicate definition of {}",
            unit.path,
            duplicates.join(", ")
        );
        ctx.diagnostics
            .push(Diagnostic::duplicate_symbol(&unit.path, from, &duplicates));
        return;
    }

    ctx.included_symbols
        .extend(unit.declared_symbols.iter().cloned());
    ctx.dependencies.insert(unit);
}

/// Resolve with default options
pub fn resolve<L: SourceLookup + ?Sized>(
    root: &SourceUnit,
    lookup: &L,
) -> ResolverResult<Resolution> {
    Resolver::new(lookup).resolve(root)
}

/// Spelling-insensitive key used for cycle detection (`./A.sol` == `A.sol`)
pub(crate) fn cycle_key(path: &str) -> &str {
    let mut key = path;
    while let Some(rest) = key.strip_prefix("./") {
        key = rest;
    }
    key
}

/// Join a relative import onto the directory of the importing path
///
/// Non-relative imports and imports from a path without a directory are
/// returned unchanged. `..` segments that cannot be popped are kept.
pub fn join_import_path(from: &str, import: &str) -> String {
    if !(import.starts_with("./") || import.starts_with("../")) {
        return import.to_string();
    }

    let (scheme, from_path) = match from.find("://") {
        Some(idx) => from.split_at(idx + 3),
        None => ("", from),
    };

    let dir = match from_path.rsplit_once('/') {
        Some((dir, _)) if !cycle_key(&format!("{}/", dir)).is_empty() => dir,
        _ => return import.to_string(),
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in dir.split('/').chain(import.split('/')) {
        match segment {
            "." => {}
            "" if !segments.is_empty() => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." && !last.is_empty() => {
                    segments.pop();
                }
                _ => segments.push(".."),
            },
            _ => segments.push(segment),
        }
    }

    format!("{}{}", scheme, segments.join("/"))
}
