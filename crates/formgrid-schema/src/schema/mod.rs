//! Schema declarations: field descriptors, refinements and the registry of
//! named schemas.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::error::SchemaError;
use crate::path::{FieldPath, PathSegment};
use crate::validation::engine;
use crate::validation::{declaration, ValidationErrors};

mod builtin;
mod field;

pub use builtin::{email_field, name_field, password_complexity, password_field, SchemaRegistry};
pub use field::{Condition, Constraints, FieldDescriptor, FieldKind, Refinement, TextFormat};

/// Predicate over a field's normalized value and the whole candidate record
pub type RefinementFn = dyn Fn(&Value, &Value) -> bool + Send + Sync;

/// Programmatic refinement attached to a declared field path
#[derive(Clone)]
pub struct CustomRefinement {
    pub(crate) path: FieldPath,
    pub(crate) message: String,
    pub(crate) predicate: Arc<RefinementFn>,
}

impl CustomRefinement {
    /// Index-agnostic path of the refined field
    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Debug for CustomRefinement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomRefinement")
            .field("path", &self.path.to_string())
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

/// A named, ordered record shape.
///
/// Schemas are immutable once built and validation against them is pure.
/// Build them with [`Schema::new`] so the declaration is checked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schema {
    /// Schema name; registered as `schema:<name>`
    pub name: String,

    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Top-level fields in declaration order
    pub fields: Vec<FieldDescriptor>,

    #[serde(skip)]
    refinements: Vec<CustomRefinement>,
}

impl Schema {
    /// Build a schema and check its declaration.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::InvalidDeclaration` listing every malformed field.
    pub fn new(name: impl Into<String>, fields: Vec<FieldDescriptor>) -> Result<Self, SchemaError> {
        let schema = Schema {
            name: name.into(),
            description: None,
            fields,
            refinements: Vec::new(),
        };
        schema.check_declaration()?;
        Ok(schema)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attach a programmatic refinement to the field at `path`.
    ///
    /// The predicate receives the field's normalized value and the whole
    /// normalized record, and runs after the field's declared refinements.
    /// Indices in `path` are ignored: the refinement applies to every element.
    pub fn with_refinement<F>(
        mut self,
        path: &str,
        message: impl Into<String>,
        predicate: F,
    ) -> Result<Self, SchemaError>
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        let path = FieldPath::parse(path)?;
        if self.descriptor(&path).is_none() {
            return Err(SchemaError::UnknownField(path.to_string()));
        }
        self.refinements.push(CustomRefinement {
            path: path.canonical(),
            message: message.into(),
            predicate: Arc::new(predicate),
        });
        Ok(self)
    }

    /// Reference under which the schema is registered
    pub fn reference(&self) -> String {
        format!("schema:{}", self.name)
    }

    pub fn refinements(&self) -> &[CustomRefinement] {
        &self.refinements
    }

    /// Top-level field by name
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Declared field at `path`.
    ///
    /// Lookup is index-agnostic: `contacts[3].value`, `contacts[0].value` and
    /// `contacts.value` all resolve to the same descriptor.
    pub fn descriptor(&self, path: &FieldPath) -> Option<&FieldDescriptor> {
        let mut segments = path.segments().iter();
        let mut current = match segments.next()? {
            PathSegment::Key(k) => self.field(k)?,
            PathSegment::Index(_) => return None,
        };
        for segment in segments {
            current = match segment {
                PathSegment::Key(k) => {
                    let object = if current.kind == FieldKind::Array {
                        current.items.as_deref()?
                    } else {
                        current
                    };
                    object.child(k)?
                }
                PathSegment::Index(_) => current.items.as_deref()?,
            };
        }
        Some(current)
    }

    /// Top-level paths that must be supplied by the caller.
    ///
    /// Fields with a default or a `visible_when` condition are not counted.
    pub fn required_paths(&self) -> Vec<FieldPath> {
        self.fields
            .iter()
            .filter(|f| f.required && f.default.is_none() && f.visible_when.is_none())
            .map(|f| FieldPath::root().key(f.name.clone()))
            .collect()
    }

    /// Validate a candidate record.
    ///
    /// On success returns the normalized record: only declared fields, values
    /// coerced to their kind, defaults applied, absent optional fields omitted.
    /// On failure returns every field error in declaration order.
    pub fn validate(&self, candidate: &Value) -> Result<Value, ValidationErrors> {
        let result = engine::validate_record(self, candidate);
        match &result {
            Ok(_) => debug!(schema = %self.name, "Record is valid"),
            Err(errors) => debug!(schema = %self.name, errors = errors.len(), "Record is invalid"),
        }
        result
    }

    /// Validate only the given declared paths of a full candidate record.
    ///
    /// Paths that do not resolve to a declared field are ignored.
    pub fn validate_paths(&self, candidate: &Value, paths: &[FieldPath]) -> Result<(), ValidationErrors> {
        engine::validate_paths(self, candidate, paths)
    }

    /// Initial record built from defaults and the empty value of each kind
    pub fn defaults(&self) -> Value {
        let map: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| (f.name.clone(), f.initial_value()))
            .collect();
        Value::Object(map)
    }

    /// Fresh element for the array field at `path`, or `None` if `path` is not an array field
    pub fn default_for_path(&self, path: &FieldPath) -> Option<Value> {
        let descriptor = self.descriptor(path)?;
        if descriptor.kind != FieldKind::Array {
            return None;
        }
        descriptor.items.as_deref().map(FieldDescriptor::initial_value)
    }

    /// Check the declaration for caller bugs (bad bounds, bad regex, dangling references, ...).
    pub fn check_declaration(&self) -> Result<(), SchemaError> {
        let errors = declaration::check(self);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(SchemaError::InvalidDeclaration {
                schema: self.name.clone(),
                errors,
            })
        }
    }
}
