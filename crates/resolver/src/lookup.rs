//! Source lookup for import paths
//!
//! A lookup maps an import path to Solidity source text, or `None` when the
//! path is unknown. The resolver only ever talks to this trait.

use crate::remapper::ImportRemapper;
use crate::stdlib::StdLibrary;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

/// Maps import paths to source text
pub trait SourceLookup {
    fn lookup(&self, path: &str) -> Option<String>;
}

impl<F> SourceLookup for F
where
    F: Fn(&str) -> Option<String>,
{
    fn lookup(&self, path: &str) -> Option<String> {
        self(path)
    }
}

/// In-memory lookup keyed by exact import path
#[derive(Debug, Clone, Default)]
pub struct MemoryLookup {
    sources: HashMap<String, String>,
}

impl MemoryLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, path: impl Into<String>, source: impl Into<String>) -> Self {
        self.insert(path, source);
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, source: impl Into<String>) {
        self.sources.insert(path.into(), source.into());
    }
}

impl SourceLookup for MemoryLookup {
    fn lookup(&self, path: &str) -> Option<String> {
        self.sources.get(path).cloned()
    }
}

/// Reads `.sol` files relative to a dependency root
///
/// Any failure to read is reported as "not found".
#[derive(Debug, Clone)]
pub struct FsLookup {
    /// Dependency root directory
    root: PathBuf,
    /// Import remapper
    remapper: ImportRemapper,
    /// Library directories to search
    lib_dirs: Vec<PathBuf>,
}

impl FsLookup {
    pub fn new(
        root: impl AsRef<Path>,
        remappings: Vec<(String, String)>,
        lib_dirs: Vec<PathBuf>,
    ) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            remapper: ImportRemapper::new(remappings),
            lib_dirs,
        }
    }

    /// Locate the file an import path refers to
    pub fn locate(&self, import_path: &str) -> Option<PathBuf> {
        if import_path.contains("://") || Path::new(import_path).is_absolute() {
            return None;
        }

        let with_ext = if import_path.ends_with(".sol") {
            import_path.to_string()
        } else {
            format!("{}.sol", import_path)
        };

        // 1. Remapped path
        if let Some(remapped) = self.remapper.remap(&with_ext) {
            if let Some(found) = contained_file(&self.root, &remapped) {
                return Some(found);
            }
        }

        // 2. Relative to the dependency root
        if let Some(found) = contained_file(&self.root, &with_ext) {
            return Some(found);
        }

        // 3. Library directories
        self.lib_dirs
            .iter()
            .find_map(|lib_dir| contained_file(lib_dir, &with_ext))
    }
}

impl SourceLookup for FsLookup {
    fn lookup(&self, path: &str) -> Option<String> {
        let file = self.locate(path)?;
        match std::fs::read_to_string(&file) {
            Ok(source) => {
                tracing::debug!("Import '{}' read from {}", path, file.display());
                Some(source)
            }
            Err(e) => {
                tracing::debug!("Could not read {}: {}", file.display(), e);
                None
            }
        }
    }
}

/// Join `relative` onto `base` lexically; `None` if it escapes `base` or is not a file
fn contained_file(base: &Path, relative: &str) -> Option<PathBuf> {
    let mut joined = base.to_path_buf();
    let mut depth = 0usize;

    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => {
                joined.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    tracing::debug!("Import '{}' escapes {}", relative, base.display());
                    return None;
                }
                joined.pop();
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }

    joined.is_file().then_some(joined)
}

/// Tries each lookup in turn and returns the first hit
#[derive(Default)]
pub struct LayeredLookup {
    layers: Vec<(String, Box<dyn SourceLookup + Send + Sync>)>,
}

impl LayeredLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in dependencies first, then the filesystem when configured
    pub fn standard(stdlib: StdLibrary, fs: Option<FsLookup>) -> Self {
        let lookup = Self::new().with_layer("stdlib", stdlib);
        match fs {
            Some(fs) => lookup.with_layer("filesystem", fs),
            None => lookup,
        }
    }

    pub fn with_layer(
        mut self,
        name: impl Into<String>,
        lookup: impl SourceLookup + Send + Sync + 'static,
    ) -> Self {
        self.layers.push((name.into(), Box::new(lookup)));
        self
    }

    pub fn layer_names(&self) -> Vec<&str> {
        self.layers.iter().map(|(name, _)| name.as_str()).collect()
    }
}

impl SourceLookup for LayeredLookup {
    fn lookup(&self, path: &str) -> Option<String> {
        self.layers.iter().find_map(|(name, layer)| {
            let found = layer.lookup(path);
            if found.is_some() {
                tracing::trace!("Import '{}' served by {} lookup", path, name);
            }
            found
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_project() -> TempDir {
        let temp = TempDir::new().unwrap();

        std::fs::create_dir_all(temp.path().join("contracts/utils")).unwrap();
        std::fs::create_dir_all(temp.path().join("node_modules/@acme/contracts")).unwrap();
        std::fs::create_dir_all(temp.path().join("lib/solmate/src")).unwrap();

        std::fs::write(temp.path().join("contracts/Token.sol"), "contract Token {}").unwrap();
        std::fs::write(temp.path().join("contracts/utils/Math.sol"), "library Math {}").unwrap();
        std::fs::write(
            temp.path().join("node_modules/@acme/contracts/Vault.sol"),
            "contract Vault {}",
        )
        .unwrap();
        std::fs::write(temp.path().join("lib/solmate/src/ERC4626.sol"), "contract ERC4626 {}")
            .unwrap();

        temp
    }

    #[test]
    fn test_lookup_relative_to_root() {
        let temp = create_test_project();
        let lookup = FsLookup::new(temp.path(), vec![], vec![]);

        assert_eq!(
            lookup.lookup("./contracts/Token.sol").as_deref(),
            Some("contract Token {}")
        );
        assert_eq!(
            lookup.lookup("contracts/utils/../utils/Math").as_deref(),
            Some("library Math {}")
        );
    }

    #[test]
    fn test_lookup_with_remapping() {
        let temp = create_test_project();
        let lookup = FsLookup::new(
            temp.path(),
            vec![("@acme/".to_string(), "node_modules/@acme/".to_string())],
            vec![],
        );

        assert_eq!(
            lookup.lookup("@acme/contracts/Vault.sol").as_deref(),
            Some("contract Vault {}")
        );
    }

    #[test]
    fn test_lookup_in_library_dirs() {
        let temp = create_test_project();
        let lookup = FsLookup::new(
            temp.path().join("contracts"),
            vec![],
            vec![temp.path().join("lib/solmate/src")],
        );

        assert_eq!(lookup.lookup("ERC4626.sol").as_deref(), Some("contract ERC4626 {}"));
    }

    #[test]
    fn test_escaping_and_remote_paths_are_not_found() {
        let temp = create_test_project();
        let lookup = FsLookup::new(temp.path().join("contracts"), vec![], vec![]);

        assert!(lookup.lookup("../lib/solmate/src/ERC4626.sol").is_none());
        assert!(lookup.lookup("https://example.com/Token.sol").is_none());
        assert!(lookup.lookup("/etc/passwd").is_none());
        assert!(lookup.lookup("nonexistent.sol").is_none());
    }

    #[test]
    fn test_layered_lookup_prefers_first_layer() {
        let temp = create_test_project();
        std::fs::write(temp.path().join("Ownable.sol"), "contract Local {}").unwrap();

        let lookup = LayeredLookup::standard(
            StdLibrary::builtin(),
            Some(FsLookup::new(temp.path(), vec![], vec![])),
        );

        assert_eq!(lookup.layer_names(), vec!["stdlib", "filesystem"]);
        assert!(lookup.lookup("Ownable.sol").unwrap().contains("abstract contract Ownable"));
        assert_eq!(
            lookup.lookup("contracts/Token.sol").as_deref(),
            Some("contract Token {}")
        );
    }

    #[test]
    fn test_closure_and_memory_lookups() {
        let closure = |path: &str| (path == "A.sol").then(|| "contract A {}".to_string());
        assert!(closure.lookup("A.sol").is_some());
        assert!(closure.lookup("B.sol").is_none());

        let memory = MemoryLookup::new().with_source("B.sol", "contract B {}");
        assert_eq!(memory.lookup("B.sol").as_deref(), Some("contract B {}"));
    }
}
