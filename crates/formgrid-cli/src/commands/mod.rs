//! Subcommands of the `formgrid` binary

use clap::{ArgAction, Parser, Subcommand};
use formgrid_schema::SchemaRegistry;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::{parse_delimiter, CliConfig};
use crate::error::{CliError, CliResult};

pub mod form;
pub mod schemas;
pub mod table;
pub mod validate;

#[derive(Parser, Debug)]
#[command(name = "formgrid", version, about = "Schema-driven form and table engine")]
pub struct Cli {
    /// Log filter (overrides FORMGRID_LOG_LEVEL)
    #[arg(long = "log-level", global = true)]
    pub log_level: Option<String>,

    /// Emit logs as JSON (overrides FORMGRID_JSON_LOGS)
    #[arg(long = "json-logs", global = true, action = ArgAction::SetTrue)]
    pub json_logs: bool,

    /// Directory of extra schema documents (overrides FORMGRID_SCHEMA_DIR)
    #[arg(long = "schema-dir", global = true)]
    pub schema_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Apply global flags, then the `table` page size and delimiter, on top of
    /// the environment configuration
    pub fn apply_to(&self, config: &mut CliConfig) -> CliResult<()> {
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
        if self.json_logs {
            config.json_logs = true;
        }
        if let Some(dir) = &self.schema_dir {
            config.schema_dir = Some(dir.clone());
        }
        if let Commands::Table(args) = &self.command {
            if let Some(size) = args.page_size {
                config.page_size = size;
            }
            if let Some(delimiter) = &args.delimiter {
                config.csv_delimiter = parse_delimiter(delimiter)?;
            }
        }
        Ok(())
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate a JSON record against a schema
    Validate(validate::ValidateArgs),
    /// Replay events against a form session
    Form(form::FormArgs),
    /// Filter, sort and page a row collection, or export it as CSV
    Table(table::TableArgs),
    /// List registered schema references
    Schemas,
}

/// What a command printed and whether it succeeded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Text for stdout
    pub stdout: String,
    /// `false` maps to exit code 1
    pub success: bool,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        CommandOutput {
            stdout: stdout.into(),
            success: true,
        }
    }

    pub fn failed(stdout: impl Into<String>) -> Self {
        CommandOutput {
            stdout: stdout.into(),
            success: false,
        }
    }
}

/// Run a subcommand
pub async fn run(command: Commands, config: &CliConfig) -> CliResult<CommandOutput> {
    match command {
        Commands::Validate(args) => validate::run(args, config),
        Commands::Form(args) => form::run(args, config).await,
        Commands::Table(args) => table::run(args, config),
        Commands::Schemas => schemas::run(config),
    }
}

/// Built-in schemas plus every document in the configured schema directory
pub fn load_registry(config: &CliConfig) -> CliResult<SchemaRegistry> {
    let mut registry = SchemaRegistry::with_builtins()?;
    let Some(dir) = &config.schema_dir else {
        return Ok(registry);
    };

    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(|e| CliError::io(dir, e))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| is_yaml(path))
        .collect();
    files.sort();

    for file in files {
        let names = registry.load_document(&read_file(&file)?)?;
        debug!(file = %file.display(), schemas = ?names, "Loaded schema document");
    }
    info!(schemas = registry.len(), "Schema registry ready");
    Ok(registry)
}

pub(crate) fn is_yaml(path: &Path) -> bool {
    matches!(path.extension().and_then(|e| e.to_str()), Some("yaml" | "yml"))
}

pub(crate) fn read_file(path: &Path) -> CliResult<String> {
    fs::read_to_string(path).map_err(|e| CliError::io(path, e))
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> CliResult<T> {
    Ok(serde_json::from_str(&read_file(path)?)?)
}

pub(crate) fn to_pretty_json<T: serde::Serialize>(value: &T) -> CliResult<String> {
    Ok(serde_json::to_string_pretty(value)?)
}
