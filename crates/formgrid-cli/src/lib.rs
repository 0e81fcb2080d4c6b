//!
//! Formgrid CLI - command-line front end for the formgrid engine
//!
//! Validates JSON records against schemas, replays form-session event
//! scripts and renders or exports tables. Configuration comes from
//! `FORMGRID_*` environment variables overridden by flags.

#![forbid(unsafe_code)]

pub mod commands;
pub mod config;
pub mod error;
pub mod logging;

pub use commands::{run, Cli, CommandOutput, Commands};
pub use config::CliConfig;
pub use error::{CliError, CliResult};
pub use logging::init_logging;
