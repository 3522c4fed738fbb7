use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::exit_codes::CliError;
use resolver::remapper::{parse_remapping, ImportRemapper};
use resolver::{AssembleOptions, ResolveOptions};

/// Main configuration structure for solinline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SolinlineConfig {
    /// Dependency lookup settings
    #[serde(default)]
    pub resolver: ResolverSettings,

    /// Header defaults for the assembled unit
    #[serde(default)]
    pub assembler: AssemblerSettings,

    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,
}

/// Dependency lookup settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverSettings {
    /// Directory filesystem imports are read relative to
    /// (defaults to the input file's directory)
    pub dependency_root: Option<PathBuf>,

    /// `prefix=target` remappings
    pub remappings: Vec<String>,

    /// Foundry style `remappings.txt` to load in addition
    pub remappings_file: Option<PathBuf>,

    /// Extra directories searched after the dependency root
    pub lib_dirs: Vec<PathBuf>,

    /// Directory with an `index.yaml` extending the built-in dependency table
    pub library_dir: Option<PathBuf>,

    /// Maximum dependency nesting
    pub max_depth: usize,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            dependency_root: None,
            remappings: Vec::new(),
            remappings_file: None,
            lib_dirs: Vec::new(),
            library_dir: None,
            max_depth: resolver::resolver::DEFAULT_MAX_DEPTH,
        }
    }
}

/// Header defaults for the assembled unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssemblerSettings {
    /// License used when the contract has none
    pub default_license: String,

    /// Solidity version constraint used when the contract has no pragma
    pub default_solidity_version: String,
}

impl Default for AssemblerSettings {
    fn default() -> Self {
        let options = AssembleOptions::default();
        Self {
            default_license: options.default_license,
            default_solidity_version: options.default_solidity_version,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Default output format
    pub format: OutputFormatSetting,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormatSetting::Console,
        }
    }
}

/// Output format setting for serialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormatSetting {
    Console,
    Json,
}

impl std::str::FromStr for OutputFormatSetting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "console" => Ok(OutputFormatSetting::Console),
            "json" => Ok(OutputFormatSetting::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

impl SolinlineConfig {
    /// Load configuration from file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: SolinlineConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Candidate config files, most specific first
    pub fn default_config_paths() -> Vec<PathBuf> {
        vec![
            PathBuf::from(".solinline.yml"),
            PathBuf::from(".solinline.yaml"),
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("solinline")
                .join("config.yml"),
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".solinline.yml"),
        ]
    }

    /// Load configuration with fallback chain
    ///
    /// An explicitly given file must exist and parse. Files found on the
    /// default chain that fail to parse are skipped with a warning.
    pub fn load_from_defaults_and_file(config_file: Option<&Path>) -> Result<Self> {
        if let Some(file) = config_file {
            let config = Self::load_from_file(file).map_err(|e| CliError::Config(format!("{:#}", e)))?;
            tracing::info!("Loaded configuration from: {}", file.display());
            return Ok(config);
        }

        for path in Self::default_config_paths() {
            if !path.exists() {
                continue;
            }
            match Self::load_from_file(&path) {
                Ok(config) => {
                    tracing::info!("Loaded configuration from: {}", path.display());
                    return Ok(config);
                }
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                }
            }
        }

        Ok(Self::default())
    }

    /// Create a default configuration file
    pub fn create_default_config_file<P: AsRef<Path>>(path: P) -> Result<()> {
        Self::default().save_to_file(path)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.resolver.max_depth == 0 {
            return Err(CliError::Config("Max depth must be greater than 0".to_string()).into());
        }

        for remapping in &self.resolver.remappings {
            if parse_remapping(remapping).is_none() {
                return Err(CliError::Config(format!(
                    "Invalid remapping '{}': expected PREFIX=TARGET",
                    remapping
                ))
                .into());
            }
        }

        if let Some(root) = &self.resolver.dependency_root {
            if !root.is_dir() {
                return Err(CliError::Config(format!(
                    "Dependency root is not a directory: {}",
                    root.display()
                ))
                .into());
            }
        }

        let license = self.assembler.default_license.trim();
        if license.is_empty() || license.contains(['\n', '\r']) {
            return Err(CliError::Config(
                "Default license must be a single non-empty identifier".to_string(),
            )
            .into());
        }

        let version = self.assembler.default_solidity_version.trim();
        if version.is_empty() || version.contains([';', '\n', '\r']) {
            return Err(CliError::Config(
                "Default solidity version must be a non-empty version constraint".to_string(),
            )
            .into());
        }

        for dir in &self.resolver.lib_dirs {
            if !dir.is_dir() {
                tracing::warn!("Library directory does not exist: {}", dir.display());
            }
        }

        Ok(())
    }

    /// Every remapping pair: remappings file first, then inline entries
    pub fn remapping_pairs(&self) -> Result<Vec<(String, String)>> {
        let mut pairs = Vec::new();

        if let Some(file) = &self.resolver.remappings_file {
            let remapper = ImportRemapper::load(file).map_err(|e| {
                CliError::Config(format!(
                    "Failed to read remappings file {}: {}",
                    file.display(),
                    e
                ))
            })?;
            pairs.extend(remapper.remappings().iter().cloned());
        }

        pairs.extend(self.resolver.remappings.iter().filter_map(|r| parse_remapping(r)));
        Ok(pairs)
    }

    pub fn to_resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            max_depth: self.resolver.max_depth,
        }
    }

    pub fn to_assemble_options(&self) -> AssembleOptions {
        AssembleOptions {
            default_license: self.assembler.default_license.trim().to_string(),
            default_solidity_version: self.assembler.default_solidity_version.trim().to_string(),
        }
    }
}
