//! Built-in dependency table
//!
//! Generated contracts reference the same dependency in many spellings
//! (`Ownable.sol`, `./Ownable.sol`, `@openzeppelin/contracts/access/Ownable.sol`,
//! a GitHub URL, ...). The table maps every known alias onto one canonical
//! source. Which aliases map where is data (`stdlib/index.yaml`), not code.

use crate::lookup::SourceLookup;
use crate::{ResolverError, ResolverResult};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

const BUILTIN_INDEX: &str = include_str!("../stdlib/index.yaml");

const BUILTIN_SOURCES: &[(&str, &str)] = &[
    ("Context.sol", include_str!("../stdlib/Context.sol")),
    ("Ownable.sol", include_str!("../stdlib/Ownable.sol")),
    ("Pausable.sol", include_str!("../stdlib/Pausable.sol")),
    ("ReentrancyGuard.sol", include_str!("../stdlib/ReentrancyGuard.sol")),
    ("Strings.sol", include_str!("../stdlib/Strings.sol")),
    ("IERC20.sol", include_str!("../stdlib/IERC20.sol")),
    ("ERC20.sol", include_str!("../stdlib/ERC20.sol")),
    ("ERC721.sol", include_str!("../stdlib/ERC721.sol")),
];

static GITHUB_OPENZEPPELIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^https?://(?:www\.)?github\.com/openzeppelin/openzeppelin-contracts/(?:blob|raw)/[^/]+/(contracts/.+)$",
    )
    .expect("Invalid GitHub URL regex")
});

static RAW_OPENZEPPELIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^https?://raw\.githubusercontent\.com/openzeppelin/openzeppelin-contracts/(?:refs/(?:heads|tags)/)?[^/]+/(contracts/.+)$",
    )
    .expect("Invalid raw GitHub URL regex")
});

static VERSIONED_PACKAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@openzeppelin/contracts@[^/]+/(.+)$").expect("Invalid versioned package regex")
});

#[derive(Debug, Deserialize)]
struct IndexEntry {
    name: String,
    file: String,
    #[serde(default)]
    aliases: Vec<String>,
}

/// One canonical dependency and every alias it is known by
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryEntry {
    pub name: String,
    pub source: String,
    pub aliases: Vec<String>,
}

/// Immutable alias table from import paths to dependency sources
#[derive(Debug, Clone, Default)]
pub struct StdLibrary {
    entries: Vec<LibraryEntry>,
    aliases: HashMap<String, usize>,
}

impl StdLibrary {
    /// An empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// The table shipped with the crate
    pub fn builtin() -> Self {
        Self::from_index(BUILTIN_INDEX, |file| {
            BUILTIN_SOURCES
                .iter()
                .find(|(name, _)| *name == file)
                .map(|(_, source)| source.to_string())
        })
        .expect("built-in dependency index is valid")
    }

    /// Build a table from a YAML index, reading each entry's file through `read`
    pub fn from_index(
        index_yaml: &str,
        mut read: impl FnMut(&str) -> Option<String>,
    ) -> ResolverResult<Self> {
        let index: Vec<IndexEntry> = serde_yaml::from_str(index_yaml)
            .map_err(|e| ResolverError::StdLibrary(format!("cannot parse index: {}", e)))?;

        let mut library = Self::new();
        for entry in index {
            let source = read(&entry.file).ok_or_else(|| {
                ResolverError::StdLibrary(format!(
                    "source file '{}' for '{}' not found",
                    entry.file, entry.name
                ))
            })?;
            library.insert(entry.name, source, entry.aliases);
        }

        Ok(library)
    }

    /// Load a table from a directory holding an `index.yaml` and its sources
    pub fn load_dir(dir: impl AsRef<Path>) -> ResolverResult<Self> {
        let dir = dir.as_ref();
        let index = std::fs::read_to_string(dir.join("index.yaml"))?;
        Self::from_index(&index, |file| std::fs::read_to_string(dir.join(file)).ok())
    }

    /// Builder-style [`StdLibrary::insert`]
    pub fn with_entry<I, S>(mut self, name: &str, source: &str, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.insert(
            name.to_string(),
            source.to_string(),
            aliases.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Add a dependency; an alias already taken now points at the new entry
    pub fn insert(&mut self, name: String, source: String, aliases: Vec<String>) {
        let idx = self.entries.len();
        for alias in &aliases {
            self.aliases.insert(alias.clone(), idx);
        }
        self.entries.push(LibraryEntry {
            name,
            source,
            aliases,
        });
    }

    /// Add every entry of `other`, letting its aliases take precedence
    pub fn extend(&mut self, other: StdLibrary) {
        for entry in other.entries {
            self.insert(entry.name, entry.source, entry.aliases);
        }
    }

    /// Find the entry an import path refers to
    pub fn get(&self, import_path: &str) -> Option<&LibraryEntry> {
        if let Some(&idx) = self.aliases.get(import_path) {
            return Some(&self.entries[idx]);
        }

        let canonical = canonical_import_path(import_path);
        if let Some(&idx) = self.aliases.get(canonical.as_str()) {
            return Some(&self.entries[idx]);
        }

        let stripped = strip_relative_prefix(&canonical);
        if stripped.is_empty() {
            return None;
        }
        if let Some(&idx) = self.aliases.get(stripped) {
            return Some(&self.entries[idx]);
        }

        // Segment-boundary suffix match in either direction. Later entries
        // win, matching exact alias precedence.
        self.entries.iter().rev().find(|entry| {
            entry
                .aliases
                .iter()
                .any(|alias| suffix_match(strip_relative_prefix(alias), stripped))
        })
    }

    /// All entries in insertion order
    pub fn entries(&self) -> &[LibraryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SourceLookup for StdLibrary {
    fn lookup(&self, path: &str) -> Option<String> {
        let entry = self.get(path)?;
        tracing::debug!("Import '{}' matched built-in dependency {}", path, entry.name);
        Some(entry.source.clone())
    }
}

/// Rewrite URL and version-pinned spellings of OpenZeppelin imports to the
/// plain package path
pub fn canonical_import_path(import_path: &str) -> String {
    for pattern in [&*GITHUB_OPENZEPPELIN, &*RAW_OPENZEPPELIN] {
        if let Some(caps) = pattern.captures(import_path) {
            return format!("@openzeppelin/{}", &caps[1]);
        }
    }

    if let Some(caps) = VERSIONED_PACKAGE.captures(import_path) {
        return format!("@openzeppelin/contracts/{}", &caps[1]);
    }

    import_path.to_string()
}

fn strip_relative_prefix(path: &str) -> &str {
    let mut rest = path;
    loop {
        if let Some(r) = rest.strip_prefix("./") {
            rest = r;
        } else if let Some(r) = rest.strip_prefix("../") {
            rest = r;
        } else {
            return rest;
        }
    }
}

fn suffix_match(alias: &str, path: &str) -> bool {
    if alias.is_empty() {
        return false;
    }
    alias == path || ends_with_segment(alias, path) || ends_with_segment(path, alias)
}

fn ends_with_segment(haystack: &str, suffix: &str) -> bool {
    haystack.len() > suffix.len()
        && haystack.ends_with(suffix)
        && haystack.as_bytes()[haystack.len() - suffix.len() - 1] == b'/'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_table_loads() {
        let library = StdLibrary::builtin();
        assert_eq!(library.len(), BUILTIN_SOURCES.len());
        for entry in library.entries() {
            assert!(!entry.aliases.is_empty(), "{} has no aliases", entry.name);
            assert!(entry.source.contains(&entry.name));
        }
    }

    #[test]
    fn test_aliases_resolve_to_same_source() {
        let library = StdLibrary::builtin();
        let a = library.lookup("./Ownable.sol").unwrap();
        let b = library
            .lookup("@openzeppelin/contracts/access/Ownable.sol")
            .unwrap();
        let c = library.lookup("Ownable.sol").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[test]
    fn test_github_url_alias() {
        let library = StdLibrary::builtin();
        let url = "https://github.com/OpenZeppelin/openzeppelin-contracts/blob/master/contracts/token/ERC20/ERC20.sol";
        assert_eq!(library.get(url).map(|e| e.name.as_str()), Some("ERC20"));

        let raw = "https://raw.githubusercontent.com/OpenZeppelin/openzeppelin-contracts/v4.9.0/contracts/access/Ownable.sol";
        assert_eq!(library.get(raw).map(|e| e.name.as_str()), Some("Ownable"));
    }

    #[test]
    fn test_versioned_package_alias() {
        let library = StdLibrary::builtin();
        let path = "@openzeppelin/contracts@4.9.3/security/ReentrancyGuard.sol";
        assert_eq!(
            library.get(path).map(|e| e.name.as_str()),
            Some("ReentrancyGuard")
        );
    }

    #[test]
    fn test_relative_suffix_match() {
        let library = StdLibrary::builtin();
        assert_eq!(
            library.get("../../utils/Context.sol").map(|e| e.name.as_str()),
            Some("Context")
        );
        assert_eq!(
            library
                .get("lib/openzeppelin-contracts/contracts/utils/Strings.sol")
                .map(|e| e.name.as_str()),
            Some("Strings")
        );
    }

    #[test]
    fn test_suffix_match_respects_segment_boundaries() {
        let library = StdLibrary::builtin();
        assert_eq!(library.get("IERC20.sol").map(|e| e.name.as_str()), Some("IERC20"));
        assert_eq!(library.get("MyERC20.sol"), None);
        assert_eq!(library.get("./Unknown.sol"), None);
        assert_eq!(library.get(".."), None);
    }

    #[test]
    fn test_later_entries_override_aliases() {
        let mut library = StdLibrary::builtin();
        library.extend(StdLibrary::new().with_entry(
            "Ownable",
            "contract Ownable { address public owner; }",
            ["./Ownable.sol"],
        ));
        assert!(library.lookup("./Ownable.sol").unwrap().contains("address public owner"));
    }

    #[test]
    fn test_from_index_reports_missing_file() {
        let index = "- name: Missing\n  file: Missing.sol\n  aliases: [\"Missing.sol\"]\n";
        let result = StdLibrary::from_index(index, |_| None);
        assert!(matches!(result, Err(ResolverError::StdLibrary(_))));
    }

    #[test]
    fn test_load_dir() {
        let temp = tempfile::TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("index.yaml"),
            "- name: Vault\n  file: Vault.sol\n  aliases: [\"@acme/Vault.sol\"]\n",
        )
        .unwrap();
        std::fs::write(temp.path().join("Vault.sol"), "contract Vault {}").unwrap();

        let library = StdLibrary::load_dir(temp.path()).unwrap();
        assert_eq!(library.lookup("@acme/Vault.sol").as_deref(), Some("contract Vault {}"));
    }
}
