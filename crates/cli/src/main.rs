// gsx - run graph and function scripts from the command line
// Host data is fed as JSON files; results are printed to stdout as JSON.

mod exit_codes;
mod input;
mod logger;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use graphscript_config::EngineSettings;
use graphscript_core::{DataPoint, LocalizationsTable};
use graphscript_engine::{ApiCompatibility, ScriptEngine, ScriptError};
use serde::Serialize;

use exit_codes::{EXIT_API_LEVEL, EXIT_IO, EXIT_SCRIPT, EXIT_SETTINGS, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "gsx")]
#[command(about = "Run graph and function scripts against JSON data")]
#[command(version)]
#[command(after_help = "\
Data point files are JSON arrays:
  [{ \"timestamp\": \"2024-03-01T08:00:00+01:00\", \"value\": 3, \"label\": \"\", \"note\": \"\" }]

Configuration files are JSON arrays of typed values:
  [{ \"type\": \"number\", \"id\": \"factor\", \"value\": 2 }]")]
struct Cli {
    /// Engine settings file (default: <config dir>/graphscript/engine.toml)
    #[arg(long, global = true, value_name = "PATH")]
    settings: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a graph script and print the decoded graph
    #[command(after_help = "\
Examples:
  gsx graph weight.lua --source weight=weight.json
  gsx graph summary.lua --source a=a.json --source b=b.json")]
    Graph {
        /// Lua script file
        script: PathBuf,

        /// Named data source, NAME=FILE (repeatable)
        #[arg(long = "source", value_name = "NAME=FILE", value_parser = input::parse_source)]
        sources: Vec<(String, PathBuf)>,
    },

    /// Run a function script and print the data points it produces
    #[command(after_help = "\
Examples:
  gsx function scale.lua --input steps.json --config scale.json
  gsx function merge.lua --input a.json --input b.json --limit 10")]
    Function {
        /// Lua script file
        script: PathBuf,

        /// Input data point file, in input order (repeatable)
        #[arg(long = "input", value_name = "FILE")]
        inputs: Vec<PathBuf>,

        /// Configuration values file
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Stop after this many data points
        #[arg(long, value_name = "N")]
        limit: Option<usize>,
    },

    /// Print the metadata a function script declares
    Metadata {
        /// Lua script file
        script: PathBuf,

        /// Translations file: { "key": { "en": "...", ... } }
        #[arg(long, value_name = "FILE")]
        translations: Option<PathBuf>,
    },

    /// Print the functions of a catalogue script this host can run
    Catalogue {
        /// Lua catalogue script file
        script: PathBuf,
    },

    /// Print the API level available to scripts
    ApiLevel {
        /// Fail unless this level is available
        #[arg(long, value_name = "LEVEL")]
        require: Option<u32>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logger::init(cli.verbose);

    let result = load_settings(cli.settings.as_deref())
        .and_then(|settings| ScriptEngine::new(settings).map_err(CliError::script))
        .and_then(|engine| match cli.command {
            Commands::Graph { script, sources } => cmd_graph(&engine, &script, sources),
            Commands::Function { script, inputs, config, limit } => {
                cmd_function(&engine, &script, inputs, config, limit)
            }
            Commands::Metadata { script, translations } => cmd_metadata(&engine, &script, translations),
            Commands::Catalogue { script } => cmd_catalogue(&engine, &script),
            Commands::ApiLevel { require } => cmd_api_level(&engine, require),
        });

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_IO, message: msg.into(), hint: None }
    }

    pub fn settings(msg: impl Into<String>) -> Self {
        Self { code: EXIT_SETTINGS, message: msg.into(), hint: None }
    }

    pub fn script(err: ScriptError) -> Self {
        let hint = match &err {
            ScriptError::Resolution { .. } => Some("check the script for syntax errors and unknown modules".to_string()),
            ScriptError::Bootstrap(_) => Some("check the module directories in engine.toml".to_string()),
            _ => None,
        };
        Self { code: EXIT_SCRIPT, message: err.to_string(), hint }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

fn load_settings(path: Option<&Path>) -> Result<EngineSettings, CliError> {
    let loaded = match path {
        Some(path) => {
            if !path.exists() {
                return Err(CliError::settings(format!("settings file not found: {}", path.display())));
            }
            EngineSettings::load_from(path)
        }
        None => EngineSettings::load(),
    };
    loaded.map_err(|e| CliError::settings(e.to_string()))
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| CliError::io(e.to_string()))?;
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{}", json).map_err(|e| CliError::io(e.to_string()))
}

// ============================================================================
// graph
// ============================================================================

fn cmd_graph(engine: &ScriptEngine, script: &Path, sources: Vec<(String, PathBuf)>) -> Result<(), CliError> {
    let source = input::read_text(script)?;
    let mut samples = Vec::with_capacity(sources.len());
    for (name, path) in sources {
        samples.push((name, input::load_sample(&path)?));
    }

    let result = engine.run_graph_script(&source, samples);
    print_json(&result)?;

    match result.failure() {
        Some(failure) => Err(CliError {
            code: EXIT_SCRIPT,
            message: format!("graph script failed: {failure}"),
            hint: None,
        }),
        None => Ok(()),
    }
}

// ============================================================================
// function
// ============================================================================

fn cmd_function(
    engine: &ScriptEngine,
    script: &Path,
    inputs: Vec<PathBuf>,
    config: Option<PathBuf>,
    limit: Option<usize>,
) -> Result<(), CliError> {
    let source = input::read_text(script)?;
    let config = match config {
        Some(path) => input::load_config(&path)?,
        None => Vec::new(),
    };
    let samples = inputs
        .iter()
        .map(|path| input::load_sample(path))
        .collect::<Result<Vec<_>, _>>()?;

    let output = engine
        .run_function_script(&source, samples, &config)
        .map_err(CliError::script)?;

    let mut points: Vec<DataPoint> = Vec::new();
    for item in output.take(limit.unwrap_or(usize::MAX)) {
        points.push(item.map_err(CliError::script)?);
    }
    print_json(&points)
}

// ============================================================================
// metadata / catalogue
// ============================================================================

fn cmd_metadata(engine: &ScriptEngine, script: &Path, translations: Option<PathBuf>) -> Result<(), CliError> {
    let source = input::read_text(script)?;
    let translations: Option<LocalizationsTable> = match translations {
        Some(path) => {
            let text = input::read_text(&path)?;
            Some(serde_json::from_str(&text).map_err(|e| {
                CliError::usage(format!("{}: invalid translations: {}", path.display(), e))
            })?)
        }
        None => None,
    };

    let metadata = engine
        .function_metadata(&source, translations.as_ref())
        .map_err(CliError::script)?;
    print_json(&metadata)
}

fn cmd_catalogue(engine: &ScriptEngine, script: &Path) -> Result<(), CliError> {
    let source = input::read_text(script)?;
    let catalogue = engine.parse_catalogue(&source).map_err(CliError::script)?;
    print_json(&catalogue)
}

// ============================================================================
// api-level
// ============================================================================

fn cmd_api_level(engine: &ScriptEngine, require: Option<u32>) -> Result<(), CliError> {
    let available = engine.available_api_level().map_err(CliError::script)?;
    println!("{}", available);

    let Some(required) = require else {
        return Ok(());
    };
    match engine.check_api_level(required).map_err(CliError::script)? {
        ApiCompatibility::Compatible => Ok(()),
        ApiCompatibility::RequiresNewer { required, available } => Err(CliError {
            code: EXIT_API_LEVEL,
            message: format!("script requires API level {required}, this host provides {available}"),
            hint: None,
        }
        .with_hint("update the host or its module directories")),
    }
}
