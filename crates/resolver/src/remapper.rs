//! Import remapping for filesystem lookups
//!
//! Remappings use the `prefix=target` form of Foundry `remappings.txt` and
//! solc `--remap`. The longest matching prefix wins.

use std::path::Path;

/// Applies prefix remappings to import paths
#[derive(Debug, Clone, Default)]
pub struct ImportRemapper {
    /// Remappings sorted by prefix length (longest first)
    remappings: Vec<(String, String)>,
}

impl ImportRemapper {
    pub fn new(remappings: Vec<(String, String)>) -> Self {
        let mut remapper = Self { remappings };
        remapper.sort();
        remapper
    }

    /// Parse `prefix=target` lines, skipping blanks and `#` comments
    pub fn parse(text: &str) -> Self {
        Self::new(text.lines().filter_map(parse_remapping).collect())
    }

    /// Load a `remappings.txt` style file
    pub fn load(path: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(Self::parse(&std::fs::read_to_string(path)?))
    }

    /// Apply remappings to an import path
    ///
    /// Returns `None` when no remapping matches.
    pub fn remap(&self, import_path: &str) -> Option<String> {
        self.remappings.iter().find_map(|(prefix, target)| {
            import_path
                .strip_prefix(prefix.as_str())
                .map(|remainder| format!("{}{}", target, remainder))
        })
    }

    pub fn remappings(&self) -> &[(String, String)] {
        &self.remappings
    }

    fn sort(&mut self) {
        // Stable, so equal-length prefixes keep their given order
        self.remappings.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    }
}

/// Parse one `prefix=target` remapping
pub fn parse_remapping(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    // Foundry allows a `context:` qualifier; it does not apply to a single flattened unit
    let line = match line.split_once(':') {
        Some((_, rest)) if rest.contains('=') && !rest.starts_with("//") => rest,
        _ => line,
    };

    let (prefix, target) = line.split_once('=')?;
    let (prefix, target) = (prefix.trim(), target.trim());
    if prefix.is_empty() {
        return None;
    }

    Some((prefix.to_string(), target.to_string()))
}
