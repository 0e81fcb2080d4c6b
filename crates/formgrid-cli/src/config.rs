//! Configuration for the formgrid binary
//!
//! Values come from `FORMGRID_*` environment variables; command-line flags
//! override them afterwards.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use tracing::warn;

use crate::error::{CliError, CliResult};

/// CLI configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CliConfig {
    /// Log filter, e.g. `info` or `formgrid_core=debug`
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[serde(default)]
    pub json_logs: bool,

    /// Rows per table page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// CSV field delimiter
    #[serde(default = "default_csv_delimiter")]
    pub csv_delimiter: char,

    /// Directory of additional schema documents (`*.yaml`, `*.yml`)
    #[serde(default)]
    pub schema_dir: Option<PathBuf>,

    /// Problems found while loading, logged once logging is initialized
    #[serde(skip)]
    pub warnings: Vec<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_page_size() -> usize {
    formgrid_core::table::DEFAULT_PAGE_SIZE
}

fn default_csv_delimiter() -> char {
    formgrid_core::table::DEFAULT_DELIMITER
}

impl Default for CliConfig {
    fn default() -> Self {
        CliConfig {
            log_level: default_log_level(),
            json_logs: false,
            page_size: default_page_size(),
            csv_delimiter: default_csv_delimiter(),
            schema_dir: None,
            warnings: Vec::new(),
        }
    }
}

impl CliConfig {
    /// Load configuration from environment variables
    pub fn load() -> CliResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which returns the value of a variable if set.
    ///
    /// Unparsable values keep their default and are recorded in `warnings`.
    /// Range checks are left to [`CliConfig::validate`] so flags can still override.
    pub fn from_lookup<F>(lookup: F) -> CliResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(level) = lookup("FORMGRID_LOG_LEVEL") {
            config.log_level = level;
        }

        if let Some(json) = lookup("FORMGRID_JSON_LOGS") {
            match json.to_lowercase().as_str() {
                "true" | "1" | "yes" => config.json_logs = true,
                "false" | "0" | "no" => config.json_logs = false,
                _ => config
                    .warnings
                    .push(format!("Invalid FORMGRID_JSON_LOGS value: {}", json)),
            }
        }

        if let Some(size) = lookup("FORMGRID_PAGE_SIZE") {
            if let Ok(size) = size.parse::<usize>() {
                config.page_size = size;
            } else {
                config
                    .warnings
                    .push(format!("Invalid FORMGRID_PAGE_SIZE value: {}", size));
            }
        }

        if let Some(delimiter) = lookup("FORMGRID_CSV_DELIMITER") {
            config.csv_delimiter = parse_delimiter(&delimiter)?;
        }

        if let Some(dir) = lookup("FORMGRID_SCHEMA_DIR") {
            if !dir.is_empty() {
                config.schema_dir = Some(PathBuf::from(dir));
            }
        }

        Ok(config)
    }

    /// Log the warnings collected while loading
    pub fn log_warnings(&self) {
        for warning in &self.warnings {
            warn!("{}", warning);
        }
    }

    /// Reject values no command can work with
    pub fn validate(&self) -> CliResult<()> {
        if self.page_size == 0 {
            return Err(CliError::Config("page size must be at least 1".to_string()));
        }
        if matches!(self.csv_delimiter, '"' | '\n' | '\r') {
            return Err(CliError::Config(format!(
                "CSV delimiter cannot be {:?}",
                self.csv_delimiter
            )));
        }
        Ok(())
    }
}

/// Parse a single-character delimiter; `\t` and `tab` name the tab character
pub fn parse_delimiter(input: &str) -> CliResult<char> {
    if input == "\\t" || input.eq_ignore_ascii_case("tab") {
        return Ok('\t');
    }
    let mut chars = input.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(CliError::Config(format!(
            "CSV delimiter must be a single character, got '{}'",
            input
        ))),
    }
}
