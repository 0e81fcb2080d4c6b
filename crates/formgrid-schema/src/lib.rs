//! # Formgrid Schema
//!
//! Declarative record schemas and the validation engine behind formgrid
//! forms and tables. A schema is an ordered list of field descriptors;
//! validating a candidate value against it yields either the normalized
//! record or every field error, in declaration order.
//!
//! ## Features
//!
//! * Field kinds: text, number, boolean, date, enum, array and nested object
//! * Fixed per-field check order: presence, coercion, bounds, pattern/enum, refinement
//! * Dot/bracket field paths (`contacts[0].value`) with non-failing resolution
//! * YAML schema documents and a registry of built-in schemas
//!
//! ## Example
//!
//! ```
//! use formgrid_schema::{FieldDescriptor, Schema, TextFormat};
//! use serde_json::json;
//!
//! let schema = Schema::new(
//!     "contact",
//!     vec![
//!         FieldDescriptor::text("name").required().min_length(2),
//!         FieldDescriptor::text("email").required().format(TextFormat::Email),
//!     ],
//! )
//! .unwrap();
//!
//! let errors = schema
//!     .validate(&json!({ "name": "A", "email": "not-an-email" }))
//!     .unwrap_err();
//! assert_eq!(errors.len(), 2);
//! ```

mod error;
mod parser;

pub mod path;
pub mod schema;
pub mod validation;

pub use error::SchemaError;
pub use parser::{parse_schema_document, SchemaDocument, SCHEMA_VERSION};
pub use path::{FieldPath, PathError, PathSegment};
pub use schema::{
    email_field, name_field, password_complexity, password_field, Condition, Constraints, CustomRefinement, FieldDescriptor,
    FieldKind, Refinement, Schema, SchemaRegistry, TextFormat,
};
pub use validation::{error_codes, is_within, FieldError, ValidationErrors};

/// Validate `candidate` against `schema`.
///
/// Shorthand for [`Schema::validate`].
pub fn validate(schema: &Schema, candidate: &serde_json::Value) -> Result<serde_json::Value, ValidationErrors> {
    schema.validate(candidate)
}

