use serde::{Deserialize, Serialize};

use crate::error::SchemaError;
use crate::schema::Schema;

/// Supported `schema_version`
pub const SCHEMA_VERSION: &str = "1.0";

/// A YAML file holding one or more schema declarations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDocument {
    /// Document format version, must be "1.0"
    pub schema_version: String,

    /// Declared schemas
    #[serde(default)]
    pub schemas: Vec<Schema>,
}

/// Parse a YAML string into a SchemaDocument.
///
/// The version is verified and every schema declaration is checked.
///
/// # Arguments
///
/// * `yaml_str` - A YAML string containing schema declarations
///
/// # Returns
///
/// A `Result` containing either the parsed `SchemaDocument` or a `SchemaError`
pub fn parse_schema_document(yaml_str: &str) -> Result<SchemaDocument, SchemaError> {
    let document: SchemaDocument = serde_yaml::from_str(yaml_str)?;

    if document.schema_version != SCHEMA_VERSION {
        return Err(SchemaError::UnsupportedVersion(document.schema_version.clone()));
    }

    for schema in &document.schemas {
        schema.check_declaration()?;
    }

    Ok(document)
}
