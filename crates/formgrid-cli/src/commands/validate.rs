use clap::Args;
use formgrid_schema::{parse_schema_document, FieldError, Schema};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::commands::{is_yaml, load_registry, read_file, read_json, to_pretty_json, CommandOutput};
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Schema reference (`schema:login`) or a schema document file
    #[arg(long)]
    pub schema: String,

    /// Schema to pick when the document declares several
    #[arg(long)]
    pub name: Option<String>,

    /// JSON record to validate
    pub record: PathBuf,
}

#[derive(Debug, Serialize)]
struct Report<'a> {
    valid: bool,
    schema: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    record: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<FieldError>,
}

/// Validate the record; an invalid record is a failed (exit 1) but well-formed run
pub fn run(args: ValidateArgs, config: &CliConfig) -> CliResult<CommandOutput> {
    let schema = resolve_schema(&args.schema, args.name.as_deref(), config)?;
    let candidate: Value = read_json(&args.record)?;

    let report = match schema.validate(&candidate) {
        Ok(record) => {
            info!(schema = %schema.name, "Record is valid");
            Report {
                valid: true,
                schema: &schema.name,
                record: Some(record),
                errors: Vec::new(),
            }
        }
        Err(errors) => {
            warn!(schema = %schema.name, errors = errors.len(), "Record is invalid");
            Report {
                valid: false,
                schema: &schema.name,
                record: None,
                errors: errors.into_vec(),
            }
        }
    };

    let out = to_pretty_json(&report)? + "\n";
    Ok(if report.valid {
        CommandOutput::ok(out)
    } else {
        CommandOutput::failed(out)
    })
}

/// Resolve `schema` as a document path when it names a YAML file, else as a registry reference
pub fn resolve_schema(schema: &str, name: Option<&str>, config: &CliConfig) -> CliResult<Arc<Schema>> {
    let path = Path::new(schema);
    if is_yaml(path) && path.exists() {
        let document = parse_schema_document(&read_file(path)?)?;
        let available: Vec<String> = document.schemas.iter().map(|s| s.name.clone()).collect();
        let mut schemas = document.schemas.into_iter();
        let picked = match name {
            Some(name) => schemas.find(|s| s.name == name),
            None if available.len() == 1 => schemas.next(),
            None => {
                return Err(CliError::InvalidArgument(format!(
                    "{} declares {} schemas ({}); pick one with --name",
                    schema,
                    available.len(),
                    available.join(", ")
                )))
            }
        };
        return picked.map(Arc::new).ok_or_else(|| {
            CliError::InvalidArgument(format!(
                "{} has no schema named '{}'",
                schema,
                name.unwrap_or_default()
            ))
        });
    }
    Ok(load_registry(config)?.get(schema)?)
}
