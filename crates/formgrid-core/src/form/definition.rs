use formgrid_schema::{is_within, FieldPath, Schema, SchemaRegistry};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::error::CoreError;

/// Supported `form_version`
pub const FORM_VERSION: &str = "1.0";

/// One logical step of a form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormStep {
    /// Unique step identifier
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// Optional description shown under the title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Declared field paths validated by this step; may be empty
    #[serde(default)]
    pub fields: Vec<FieldPath>,
}

impl FormStep {
    /// Step without a description
    pub fn new(id: impl Into<String>, title: impl Into<String>, fields: Vec<FieldPath>) -> Self {
        FormStep {
            id: id.into(),
            title: title.into(),
            description: None,
            fields,
        }
    }

    /// The step field that `path` falls under, if any
    pub fn field_for(&self, path: &FieldPath) -> Option<&FieldPath> {
        let path = path.to_string();
        self.fields.iter().find(|f| {
            let field = f.to_string();
            is_within(&path, &field) || is_within(&field, &path)
        })
    }
}

/// Ordered steps plus the schema the assembled record must satisfy
#[derive(Debug, Clone)]
pub struct FormDefinition {
    /// Form identifier
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// Optional description
    pub description: Option<String>,

    /// Steps in navigation order; single-step forms have exactly one
    pub steps: Vec<FormStep>,

    /// Schema for the full record
    pub schema: Arc<Schema>,
}

impl FormDefinition {
    /// Build a multi-step definition.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidDefinition` when there are no steps, step
    /// ids repeat, or a step names a path the schema does not declare.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        schema: Arc<Schema>,
        steps: Vec<FormStep>,
    ) -> Result<Self, CoreError> {
        let definition = FormDefinition {
            id: id.into(),
            title: title.into(),
            description: None,
            steps,
            schema,
        };
        definition.check()?;
        Ok(definition)
    }

    /// Single-step form covering every top-level field of the schema
    pub fn single_step(id: impl Into<String>, title: impl Into<String>, schema: Arc<Schema>) -> Self {
        let title = title.into();
        let fields = schema
            .fields
            .iter()
            .map(|f| FieldPath::root().key(f.name.clone()))
            .collect();
        FormDefinition {
            id: id.into(),
            title: title.clone(),
            description: None,
            steps: vec![FormStep::new("main", title, fields)],
            schema,
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Number of steps
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Index of the final step
    pub fn last_step(&self) -> usize {
        self.steps.len().saturating_sub(1)
    }

    /// Index of the step whose fields contain `path`
    pub fn step_of(&self, path: &FieldPath) -> Option<usize> {
        self.steps.iter().position(|s| s.field_for(path).is_some())
    }

    fn check(&self) -> Result<(), CoreError> {
        if self.steps.is_empty() {
            return Err(CoreError::InvalidDefinition(format!("form '{}' declares no steps", self.id)));
        }
        let mut ids = HashSet::new();
        for step in &self.steps {
            if !ids.insert(step.id.as_str()) {
                return Err(CoreError::InvalidDefinition(format!(
                    "form '{}' declares step '{}' twice",
                    self.id, step.id
                )));
            }
            for field in &step.fields {
                if self.schema.descriptor(field).is_none() {
                    return Err(CoreError::InvalidDefinition(format!(
                        "step '{}' refers to undeclared field '{}'",
                        step.id, field
                    )));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct FormDocument {
    form_version: String,
    form: RawForm,
}

#[derive(Debug, Deserialize)]
struct RawForm {
    id: String,
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    schema_ref: Option<String>,
    #[serde(default)]
    schema: Option<Schema>,
    #[serde(default)]
    steps: Vec<FormStep>,
}

/// Parse a YAML form definition.
///
/// The form either references a registered schema (`schema_ref`) or embeds
/// one (`schema`). Without `steps` the form is single-step.
///
/// # Arguments
///
/// * `yaml_str` - A YAML string containing the form document
/// * `registry` - Schemas available to `schema_ref`
pub fn parse_form_definition(yaml_str: &str, registry: &SchemaRegistry) -> Result<FormDefinition, CoreError> {
    let document: FormDocument = serde_yaml::from_str(yaml_str)?;
    if document.form_version != FORM_VERSION {
        return Err(CoreError::InvalidDefinition(format!(
            "unsupported form version: {}",
            document.form_version
        )));
    }

    let raw = document.form;
    let schema = match (raw.schema_ref, raw.schema) {
        (Some(reference), None) => registry.get(&reference)?,
        (None, Some(schema)) => {
            schema.check_declaration()?;
            Arc::new(schema)
        }
        (Some(_), Some(_)) => {
            return Err(CoreError::InvalidDefinition(format!(
                "form '{}' sets both schema_ref and schema",
                raw.id
            )))
        }
        (None, None) => {
            return Err(CoreError::InvalidDefinition(format!("form '{}' has no schema", raw.id)));
        }
    };

    let definition = if raw.steps.is_empty() {
        FormDefinition::single_step(raw.id, raw.title, schema)
    } else {
        FormDefinition::new(raw.id, raw.title, schema, raw.steps)?
    };
    debug!(form = %definition.id, steps = definition.steps.len(), "Parsed form definition");

    Ok(match raw.description {
        Some(description) => definition.with_description(description),
        None => definition,
    })
}
