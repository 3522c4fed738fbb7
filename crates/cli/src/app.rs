use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use serde_json::json;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::config::{OutputFormatSetting, SolinlineConfig};
use crate::exit_codes::{CliError, ExitCode};
use resolver::normalizer::{extract_code_blocks, has_imports, looks_like_solidity};
use resolver::remapper::parse_remapping;
use resolver::{
    normalize, FsLookup, ImportGraph, LayeredLookup, Pipeline, Prepared, StdLibrary, ROOT_PATH,
};

const DEFAULT_CONFIG_FILE: &str = ".solinline.yml";

/// Where the contract text comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Stdin,
    File(PathBuf),
}

impl Input {
    pub fn from_arg(arg: &str) -> Self {
        if arg == "-" {
            Input::Stdin
        } else {
            Input::File(PathBuf::from(arg))
        }
    }

    pub fn read(&self) -> Result<String> {
        match self {
            Input::Stdin => {
                let mut text = String::new();
                std::io::stdin()
                    .read_to_string(&mut text)
                    .map_err(|e| CliError::Input(format!("Failed to read stdin: {}", e)))?;
                Ok(text)
            }
            Input::File(path) => std::fs::read_to_string(path).map_err(|e| {
                CliError::Input(format!("Failed to read {}: {}", path.display(), e)).into()
            }),
        }
    }

    /// Name the main contract is known by during resolution
    pub fn root_path(&self) -> String {
        match self {
            Input::Stdin => ROOT_PATH.to_string(),
            Input::File(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| ROOT_PATH.to_string()),
        }
    }

    /// Directory filesystem imports resolve against when none is configured
    pub fn base_dir(&self) -> PathBuf {
        match self {
            Input::File(path) => path
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
            Input::Stdin => PathBuf::from("."),
        }
    }
}

pub struct CliApp {
    config: SolinlineConfig,
    library: StdLibrary,
}

impl CliApp {
    pub fn new() -> Result<Self> {
        Self::new_with_config(SolinlineConfig::load_from_defaults_and_file(None)?)
    }

    pub fn new_with_config(config: SolinlineConfig) -> Result<Self> {
        config.validate()?;

        let mut library = StdLibrary::builtin();
        if let Some(dir) = &config.resolver.library_dir {
            let extra = StdLibrary::load_dir(dir).map_err(|e| {
                CliError::Config(format!(
                    "Failed to load dependency table from {}: {}",
                    dir.display(),
                    e
                ))
            })?;
            tracing::debug!("Loaded {} extra dependencies from {}", extra.len(), dir.display());
            library.extend(extra);
        }

        Ok(Self { config, library })
    }

    pub fn config(&self) -> &SolinlineConfig {
        &self.config
    }

    pub fn command() -> Command {
        Command::new("solinline")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Flatten generated Solidity contracts into a single compilable source")
            .subcommand_required(true)
            .arg_required_else_help(true)
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .help("Configuration file path (.solinline.yml)")
                    .value_name("FILE")
                    .global(true),
            )
            .arg(
                Arg::new("root")
                    .long("root")
                    .help("Directory filesystem imports are read from")
                    .value_name("DIR")
                    .global(true),
            )
            .arg(
                Arg::new("remap")
                    .short('r')
                    .long("remap")
                    .help("Import remapping (repeatable)")
                    .value_name("PREFIX=TARGET")
                    .action(ArgAction::Append)
                    .global(true),
            )
            .arg(
                Arg::new("lib")
                    .short('l')
                    .long("lib")
                    .help("Additional library directory (repeatable)")
                    .value_name("DIR")
                    .action(ArgAction::Append)
                    .global(true),
            )
            .arg(
                Arg::new("max-depth")
                    .long("max-depth")
                    .help("Maximum dependency nesting")
                    .value_name("N")
                    .value_parser(clap::value_parser!(usize))
                    .global(true),
            )
            .arg(
                Arg::new("format")
                    .short('f')
                    .long("format")
                    .help("Output format")
                    .value_parser(["console", "json"])
                    .global(true),
            )
            .subcommand(
                Command::new("flatten")
                    .about("Inline every dependency into one compilation unit")
                    .arg(input_arg())
                    .arg(output_arg())
                    .arg(
                        Arg::new("strict")
                            .long("strict")
                            .help("Exit with code 1 when any diagnostic is raised")
                            .action(ArgAction::SetTrue),
                    ),
            )
            .subcommand(
                Command::new("clean")
                    .about("Strip markdown fences and leading prose only")
                    .arg(input_arg())
                    .arg(output_arg())
                    .arg(
                        Arg::new("all-blocks")
                            .long("all-blocks")
                            .help("Join every solidity code block instead of taking the first")
                            .action(ArgAction::SetTrue),
                    ),
            )
            .subcommand(
                Command::new("tree")
                    .about("Show the dependency tree of a contract")
                    .arg(input_arg()),
            )
            .subcommand(
                Command::new("stdlib").about("List the built-in dependencies and their aliases"),
            )
            .subcommand(
                Command::new("init-config")
                    .about("Create a default configuration file")
                    .arg(
                        Arg::new("path")
                            .help("Where to write the file")
                            .value_name("FILE")
                            .default_value(DEFAULT_CONFIG_FILE),
                    )
                    .arg(
                        Arg::new("force")
                            .long("force")
                            .help("Overwrite an existing file")
                            .action(ArgAction::SetTrue),
                    ),
            )
    }

    pub fn run() -> Result<ExitCode> {
        Self::run_with_args(std::env::args().collect())
    }

    pub fn run_with_args(args: Vec<String>) -> Result<ExitCode> {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        Self::run_with_writer(args, &mut out)
    }

    /// Run with primary output going to `out`; diagnostics go to stderr
    pub fn run_with_writer<W: Write>(args: Vec<String>, out: &mut W) -> Result<ExitCode> {
        let matches = match Self::command().try_get_matches_from(args) {
            Ok(matches) => matches,
            Err(e) if matches!(
                e.kind(),
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion
            ) =>
            {
                write!(out, "{}", e.render())?;
                return Ok(ExitCode::Success);
            }
            Err(e) => return Err(e.into()),
        };

        // Configuration initialization doesn't need config loading
        if let Some(sub) = matches.subcommand_matches("init-config") {
            return Self::handle_init_config(sub, out);
        }

        let config_file = matches.get_one::<String>("config").map(PathBuf::from);
        let mut config = SolinlineConfig::load_from_defaults_and_file(config_file.as_deref())?;
        apply_overrides(&mut config, &matches)?;
        let app = Self::new_with_config(config)?;

        match matches.subcommand() {
            Some(("flatten", sub)) => app.flatten(sub, out),
            Some(("clean", sub)) => app.clean(sub, out),
            Some(("tree", sub)) => app.tree(sub, out),
            Some(("stdlib", _)) => app.list_stdlib(out),
            _ => Err(CliError::Config("No command given".to_string()).into()),
        }
    }

    /// Lookup chain for one input: built-in table, then the filesystem
    pub fn lookup_for(&self, input: &Input) -> Result<LayeredLookup> {
        let root = self
            .config
            .resolver
            .dependency_root
            .clone()
            .unwrap_or_else(|| input.base_dir());
        let fs = FsLookup::new(
            root,
            self.config.remapping_pairs()?,
            self.config.resolver.lib_dirs.clone(),
        );
        Ok(LayeredLookup::standard(self.library.clone(), Some(fs)))
    }

    pub fn pipeline_for(&self, input: &Input) -> Pipeline {
        Pipeline::new()
            .with_resolve_options(self.config.to_resolve_options())
            .with_assemble_options(self.config.to_assemble_options())
            .with_root_path(input.root_path())
    }

    /// Read, normalize, resolve and assemble one input
    pub fn prepare(&self, input: &Input) -> Result<Prepared> {
        let text = input.read()?;
        let lookup = self.lookup_for(input)?;
        let prepared = self
            .pipeline_for(input)
            .prepare(&text, &lookup)
            .with_context(|| format!("Failed to prepare {}", describe(input)))?;
        Ok(prepared)
    }

    fn format(&self) -> OutputFormatSetting {
        self.config.output.format
    }

    fn flatten<W: Write>(&self, matches: &ArgMatches, out: &mut W) -> Result<ExitCode> {
        let input = input_from(matches);
        let prepared = self.prepare(&input)?;

        let rendered = match self.format() {
            OutputFormatSetting::Console => {
                for diagnostic in &prepared.diagnostics {
                    eprintln!("warning: {}", diagnostic);
                }
                prepared.source.clone()
            }
            OutputFormatSetting::Json => {
                let value = json!({
                    "source": prepared.source,
                    "diagnostics": prepared.diagnostics,
                });
                format!("{}\n", serde_json::to_string_pretty(&value)?)
            }
        };

        write_output(matches, out, &rendered)?;

        tracing::info!(
            "Inlined {} dependencies ({} diagnostics)",
            prepared.resolution.dependencies.len(),
            prepared.diagnostics.len()
        );

        if matches.get_flag("strict") && prepared.has_diagnostics() {
            return Ok(ExitCode::Diagnostics);
        }
        Ok(ExitCode::Success)
    }

    fn clean<W: Write>(&self, matches: &ArgMatches, out: &mut W) -> Result<ExitCode> {
        let input = input_from(matches);
        let mut text = input.read()?;
        if matches.get_flag("all-blocks") {
            text = extract_code_blocks(&text, Some("solidity"));
        }
        let cleaned = normalize(&text);

        if !looks_like_solidity(&cleaned) {
            tracing::warn!("{} does not start with a license or pragma", describe(&input));
        }

        let rendered = match self.format() {
            OutputFormatSetting::Console => format!("{}\n", cleaned),
            OutputFormatSetting::Json => {
                let value = json!({
                    "source": cleaned,
                    "hasImports": has_imports(&cleaned),
                    "looksLikeSolidity": looks_like_solidity(&cleaned),
                });
                format!("{}\n", serde_json::to_string_pretty(&value)?)
            }
        };

        write_output(matches, out, &rendered)?;
        Ok(ExitCode::Success)
    }

    fn tree<W: Write>(&self, matches: &ArgMatches, out: &mut W) -> Result<ExitCode> {
        let input = input_from(matches);
        let prepared = self.prepare(&input)?;
        let tree = ImportGraph::from_resolution(&prepared.resolution).tree();

        match self.format() {
            OutputFormatSetting::Console => {
                write!(out, "{}", tree.render())?;
                writeln!(
                    out,
                    "\n{} dependencies inlined, {} diagnostics",
                    prepared.resolution.dependencies.len(),
                    prepared.diagnostics.len()
                )?;
            }
            OutputFormatSetting::Json => {
                let value = json!({
                    "tree": tree,
                    "diagnostics": prepared.diagnostics,
                });
                writeln!(out, "{}", serde_json::to_string_pretty(&value)?)?;
            }
        }

        Ok(ExitCode::Success)
    }

    fn list_stdlib<W: Write>(&self, out: &mut W) -> Result<ExitCode> {
        match self.format() {
            OutputFormatSetting::Console => {
                writeln!(out, "Built-in dependencies:")?;
                writeln!(out, "======================")?;
                for entry in self.library.entries() {
                    writeln!(out, "  {}", entry.name)?;
                    for alias in &entry.aliases {
                        writeln!(out, "    {}", alias)?;
                    }
                }
            }
            OutputFormatSetting::Json => {
                let entries: Vec<_> = self
                    .library
                    .entries()
                    .iter()
                    .map(|entry| json!({ "name": entry.name, "aliases": entry.aliases }))
                    .collect();
                writeln!(out, "{}", serde_json::to_string_pretty(&entries)?)?;
            }
        }

        Ok(ExitCode::Success)
    }

    fn handle_init_config<W: Write>(matches: &ArgMatches, out: &mut W) -> Result<ExitCode> {
        let config_path = matches
            .get_one::<String>("path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        if config_path.exists() && !matches.get_flag("force") {
            return Err(CliError::Input(format!(
                "Configuration file already exists: {} (use --force to overwrite)",
                config_path.display()
            ))
            .into());
        }

        SolinlineConfig::create_default_config_file(&config_path)?;
        writeln!(
            out,
            "Created default configuration file: {}",
            config_path.display()
        )?;

        Ok(ExitCode::Success)
    }
}

fn input_arg() -> Arg {
    Arg::new("input")
        .help("Contract file, or - for stdin")
        .value_name("FILE")
        .default_value("-")
}

fn output_arg() -> Arg {
    Arg::new("output")
        .short('o')
        .long("output")
        .help("Output file (stdout if not specified)")
        .value_name("FILE")
}

fn input_from(matches: &ArgMatches) -> Input {
    matches
        .get_one::<String>("input")
        .map(|arg| Input::from_arg(arg))
        .unwrap_or(Input::Stdin)
}

fn describe(input: &Input) -> String {
    match input {
        Input::Stdin => "stdin".to_string(),
        Input::File(path) => path.display().to_string(),
    }
}

fn write_output<W: Write>(matches: &ArgMatches, out: &mut W, content: &str) -> Result<()> {
    match matches.get_one::<String>("output") {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write output file: {}", path))?;
            tracing::info!("Output written to: {}", path);
        }
        None => out.write_all(content.as_bytes())?,
    }
    Ok(())
}

/// Command line flags take precedence over the config file
fn apply_overrides(config: &mut SolinlineConfig, matches: &ArgMatches) -> Result<()> {
    if let Some(root) = matches.get_one::<String>("root") {
        config.resolver.dependency_root = Some(PathBuf::from(root));
    }

    for remap in matches.get_many::<String>("remap").unwrap_or_default() {
        if parse_remapping(remap).is_none() {
            return Err(CliError::Config(format!(
                "Invalid remapping '{}': expected PREFIX=TARGET",
                remap
            ))
            .into());
        }
        config.resolver.remappings.push(remap.clone());
    }

    config.resolver.lib_dirs.extend(
        matches
            .get_many::<String>("lib")
            .unwrap_or_default()
            .map(PathBuf::from),
    );

    if let Some(&max_depth) = matches.get_one::<usize>("max-depth") {
        config.resolver.max_depth = max_depth;
    }

    if let Some(format) = matches.get_one::<String>("format") {
        config.output.format = format.parse().map_err(CliError::Config)?;
    }

    Ok(())
}
