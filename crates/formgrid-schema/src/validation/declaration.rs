use regex::Regex;
use std::collections::HashSet;

use super::error_codes;
use super::FieldError;
use crate::path::FieldPath;
use crate::schema::{FieldDescriptor, FieldKind, Refinement, Schema};

/// Check a schema declaration; returns every problem found
pub(crate) fn check(schema: &Schema) -> Vec<FieldError> {
    let mut errors = Vec::new();
    check_fields(schema, &schema.fields, "", &mut errors);
    errors
}

fn check_fields(schema: &Schema, fields: &[FieldDescriptor], parent: &str, errors: &mut Vec<FieldError>) {
    let mut seen = HashSet::new();
    for field in fields {
        if field.name.is_empty() {
            errors.push(FieldError::new(error_codes::EMPTY_NAME, parent, "Field name must not be empty"));
            continue;
        }
        let path = if parent.is_empty() {
            field.name.clone()
        } else {
            format!("{}.{}", parent, field.name)
        };
        if !seen.insert(field.name.as_str()) {
            errors.push(FieldError::new(
                error_codes::DUPLICATE_FIELD,
                path.as_str(),
                format!("Duplicate field '{}'", field.name),
            ));
            continue;
        }
        check_field(schema, field, &path, errors);
    }
}

fn check_field(schema: &Schema, field: &FieldDescriptor, path: &str, errors: &mut Vec<FieldError>) {
    let c = &field.constraints;

    if let (Some(min), Some(max)) = (c.min_length, c.max_length) {
        if min > max {
            errors.push(FieldError::new(
                error_codes::INVALID_BOUNDS,
                path,
                format!("min_length {} is greater than max_length {}", min, max),
            ));
        }
    }
    if let (Some(min), Some(max)) = (c.min, c.max) {
        if min > max {
            errors.push(FieldError::new(
                error_codes::INVALID_BOUNDS,
                path,
                format!("min {} is greater than max {}", min, max),
            ));
        }
    }
    if let Some(pattern) = &c.pattern {
        if let Err(err) = Regex::new(pattern) {
            errors.push(FieldError::new(
                error_codes::INVALID_PATTERN,
                path,
                format!("Invalid pattern '{}': {}", pattern, err),
            ));
        }
    }

    match field.kind {
        FieldKind::Enum if field.values.is_empty() => {
            errors.push(FieldError::new(
                error_codes::MISSING_ENUM_VALUES,
                path,
                "Enum field declares no values",
            ));
        }
        FieldKind::Array => match &field.items {
            Some(items) => check_field(schema, items, &format!("{}[]", path), errors),
            None => errors.push(FieldError::new(
                error_codes::MISSING_ITEMS,
                path,
                "Array field has no item descriptor",
            )),
        },
        FieldKind::Object if field.fields.is_empty() => {
            errors.push(FieldError::new(
                error_codes::MISSING_FIELDS,
                path,
                "Object field declares no fields",
            ));
        }
        FieldKind::Object => check_fields(schema, &field.fields, path, errors),
        _ => {}
    }

    if let Some(condition) = &field.visible_when {
        check_reference(schema, &condition.field, path, errors);
    }
    for refinement in &field.refinements {
        if let Refinement::MatchesField { field: other, .. } = refinement {
            check_reference(schema, other, path, errors);
        }
    }
}

fn check_reference(schema: &Schema, target: &FieldPath, path: &str, errors: &mut Vec<FieldError>) {
    if schema.descriptor(target).is_none() {
        errors.push(FieldError::new(
            error_codes::UNKNOWN_REFERENCE,
            path,
            format!("Refers to undeclared field '{}'", target),
        ));
    }
}
