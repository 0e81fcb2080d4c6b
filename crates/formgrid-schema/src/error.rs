use std::fmt;
use thiserror::Error;

use crate::path::PathError;
use crate::validation::FieldError;

/// Errors raised while loading or declaring schemas.
///
/// Data problems in validated records are never reported through this type;
/// they are returned as [`crate::ValidationErrors`].
#[derive(Error, Debug)]
pub enum SchemaError {
    /// Errors that occur during YAML parsing
    #[error("YAML parsing error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Errors that occur during JSON processing
    #[error("JSON processing error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// The schema declaration itself is malformed
    #[error("Invalid declaration of schema '{schema}': {}", DeclarationErrorsFormat(.errors))]
    InvalidDeclaration {
        schema: String,
        errors: Vec<FieldError>,
    },

    /// Unsupported schema document version
    #[error("Unsupported schema version: {0}")]
    UnsupportedVersion(String),

    /// No schema registered under the reference
    #[error("Unknown schema: {0}")]
    UnknownSchema(String),

    /// A schema with the same reference is already registered
    #[error("Schema already registered: {0}")]
    DuplicateSchema(String),

    /// A path could not be parsed
    #[error(transparent)]
    InvalidPath(#[from] PathError),

    /// A path does not resolve to a declared field
    #[error("Unknown field: {0}")]
    UnknownField(String),
}

struct DeclarationErrorsFormat<'a>(&'a [FieldError]);

impl fmt::Display for DeclarationErrorsFormat<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} issues", self.0.len())?;
        for (i, err) in self.0.iter().enumerate() {
            write!(f, "\n  {}. {}", i + 1, err)?;
        }
        Ok(())
    }
}

impl SchemaError {
    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            SchemaError::YamlError(_) => "ERR_SCHEMA_YAML_PARSE",
            SchemaError::JsonError(_) => "ERR_SCHEMA_JSON_PARSE",
            SchemaError::InvalidDeclaration { errors, .. } if errors.len() == 1 => errors[0].code,
            SchemaError::InvalidDeclaration { .. } => "ERR_SCHEMA_DECL_MULTIPLE",
            SchemaError::UnsupportedVersion(_) => "ERR_SCHEMA_UNSUPPORTED_VERSION",
            SchemaError::UnknownSchema(_) => "ERR_SCHEMA_UNKNOWN_SCHEMA",
            SchemaError::DuplicateSchema(_) => "ERR_SCHEMA_DUPLICATE_SCHEMA",
            SchemaError::InvalidPath(_) => "ERR_SCHEMA_INVALID_PATH",
            SchemaError::UnknownField(_) => "ERR_SCHEMA_UNKNOWN_FIELD",
        }
    }
}
