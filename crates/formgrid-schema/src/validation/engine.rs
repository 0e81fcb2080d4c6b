use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use regex::Regex;
use serde_json::{Map, Value};
use tracing::warn;

use super::error_codes;
use super::formats::matches_format;
use super::{FieldError, ValidationErrors};
use crate::path::FieldPath;
use crate::schema::{CustomRefinement, FieldDescriptor, FieldKind, Refinement, Schema, TextFormat};

/// Result of checking one field
enum Outcome {
    /// Not supplied and no default: omitted from the output
    Absent,
    Valid(Value),
    Invalid,
}

/// Passes allowed before field conditions must have settled
const MAX_PASSES: usize = 4;

/// Validate a whole record
pub(crate) fn validate_record(schema: &Schema, candidate: &Value) -> Result<Value, ValidationErrors> {
    let (record, errors) = settle(schema, candidate);
    if errors.is_empty() {
        Ok(record)
    } else {
        Err(errors)
    }
}

/// Validate the given declared paths, reading conditions from the settled record
pub(crate) fn validate_paths(schema: &Schema, candidate: &Value, paths: &[FieldPath]) -> Result<(), ValidationErrors> {
    let (view, _) = settle(schema, candidate);
    let mut engine = Engine::new(&view, schema.refinements());
    for path in paths {
        match schema.descriptor(path) {
            Some(descriptor) => {
                engine.field(descriptor, path.resolve(candidate), path);
            }
            None => warn!(schema = %schema.name, path = %path, "Ignoring undeclared path"),
        }
    }
    if engine.errors.is_empty() {
        Ok(())
    } else {
        Err(engine.errors)
    }
}

/// Run passes until `visible_when` conditions and cross-field refinements
/// read the same normalized record the pass produces.
///
/// The first pass reads the candidate itself. A defaulted or coerced
/// controlling field only takes its normalized value from the second pass on.
fn settle(schema: &Schema, candidate: &Value) -> (Value, ValidationErrors) {
    let mut view = candidate.clone();
    let mut passes = 0;
    loop {
        passes += 1;
        let mut engine = Engine::new(&view, schema.refinements());
        let record = Value::Object(engine.members(&schema.fields, candidate.as_object(), &FieldPath::root()));
        let errors = engine.errors;
        if record == view {
            return (record, errors);
        }
        if passes == MAX_PASSES {
            warn!(schema = %schema.name, "Field conditions did not settle");
            return (record, errors);
        }
        view = record;
    }
}

/// One validation pass over a candidate record.
///
/// Per field the stages run in a fixed order: presence, type coercion,
/// length/range bounds, pattern/format/enum membership, refinements.
/// The first failing stage ends that field; other fields are still checked.
struct Engine<'a> {
    /// Normalized record from the previous pass
    view: &'a Value,
    refinements: &'a [CustomRefinement],
    errors: ValidationErrors,
}

impl<'a> Engine<'a> {
    fn new(view: &'a Value, refinements: &'a [CustomRefinement]) -> Self {
        Engine {
            view,
            refinements,
            errors: ValidationErrors::new(),
        }
    }

    fn members(&mut self, fields: &[FieldDescriptor], object: Option<&Map<String, Value>>, path: &FieldPath) -> Map<String, Value> {
        let mut out = Map::new();
        for field in fields {
            let child = path.key(field.name.clone());
            let value = object.and_then(|o| o.get(&field.name));
            if let Outcome::Valid(v) = self.field(field, value, &child) {
                out.insert(field.name.clone(), v);
            }
        }
        out
    }

    fn field(&mut self, field: &FieldDescriptor, value: Option<&Value>, path: &FieldPath) -> Outcome {
        if let Some(condition) = &field.visible_when {
            if !condition.holds(self.view) {
                return Outcome::Absent;
            }
        }

        // Presence
        let value = match value.filter(|v| !is_absent(field, v)) {
            Some(v) => v,
            None => {
                if let Some(default) = &field.default {
                    return Outcome::Valid(default.clone());
                }
                if field.required {
                    let message = format!("{} is required", field.display_name());
                    self.fail(field, path, error_codes::REQUIRED, "required", message);
                    return Outcome::Invalid;
                }
                return Outcome::Absent;
            }
        };

        // Type coercion
        let coerced = match coerce(field, value) {
            Some(v) => v,
            None => {
                let message = type_message(field);
                self.fail(field, path, error_codes::INVALID_TYPE, "type", message);
                return Outcome::Invalid;
            }
        };

        // Bounds
        if let Some((code, rule, message)) = check_bounds(field, &coerced) {
            self.fail(field, path, code, rule, message);
            return Outcome::Invalid;
        }

        // Pattern, format and enum membership
        if let Some((code, rule, message)) = check_membership(field, &coerced) {
            self.fail(field, path, code, rule, message);
            return Outcome::Invalid;
        }

        let before = self.errors.len();
        let normalized = match (field.kind, coerced) {
            (FieldKind::Object, Value::Object(map)) => Value::Object(self.members(&field.fields, Some(&map), path)),
            (FieldKind::Array, Value::Array(elements)) => match field.items.as_deref() {
                Some(items) => Value::Array(self.elements(items, &elements, path)),
                None => Value::Array(elements),
            },
            (_, other) => other,
        };
        if self.errors.len() > before {
            return Outcome::Invalid;
        }

        // Refinements
        if let Some(message) = self.check_refinements(field, &normalized, path) {
            self.errors.push(FieldError::new(error_codes::REFINEMENT_FAILED, path.to_string(), message));
            return Outcome::Invalid;
        }

        Outcome::Valid(normalized)
    }

    fn elements(&mut self, items: &FieldDescriptor, elements: &[Value], path: &FieldPath) -> Vec<Value> {
        elements
            .iter()
            .enumerate()
            .map(|(i, element)| match self.field(items, Some(element), &path.index(i)) {
                Outcome::Valid(v) => v,
                Outcome::Absent | Outcome::Invalid => Value::Null,
            })
            .collect()
    }

    fn check_refinements(&self, field: &FieldDescriptor, value: &Value, path: &FieldPath) -> Option<String> {
        for refinement in &field.refinements {
            let (passed, message) = match refinement {
                Refinement::MustBeTrue { message } => (
                    value == &Value::Bool(true),
                    message.clone().unwrap_or_else(|| format!("{} must be accepted", field.display_name())),
                ),
                Refinement::MatchesField { field: other, message } => (
                    other.resolve(self.view) == Some(value),
                    message
                        .clone()
                        .unwrap_or_else(|| format!("{} does not match {}", field.display_name(), other)),
                ),
                Refinement::UniqueItems { message } => (
                    has_unique_items(value),
                    message
                        .clone()
                        .unwrap_or_else(|| format!("{} must not contain duplicates", field.display_name())),
                ),
            };
            if !passed {
                return Some(field.messages.get("refinement").cloned().unwrap_or(message));
            }
        }

        let declared = path.canonical();
        self.refinements
            .iter()
            .filter(|r| r.path == declared)
            .find(|r| !(r.predicate)(value, self.view))
            .map(|r| r.message.clone())
    }

    fn fail(&mut self, field: &FieldDescriptor, path: &FieldPath, code: &'static str, rule: &str, fallback: String) {
        let message = field.messages.get(rule).cloned().unwrap_or(fallback);
        self.errors.push(FieldError::new(code, path.to_string(), message));
    }
}

/// Null and, depending on the field, the empty string count as "not provided"
fn is_absent(field: &FieldDescriptor, value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) if s.is_empty() => {
            field.kind != FieldKind::Text || field.required || field.constraints.allow_empty
        }
        _ => false,
    }
}

fn coerce(field: &FieldDescriptor, value: &Value) -> Option<Value> {
    match (field.kind, value) {
        (FieldKind::Text, Value::String(_)) => Some(value.clone()),
        (FieldKind::Enum, Value::String(_)) => Some(value.clone()),
        (FieldKind::Number, Value::Number(n)) => n.as_f64().and_then(|f| number(field, f)),
        (FieldKind::Number, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .and_then(|f| number(field, f)),
        (FieldKind::Boolean, Value::Bool(_)) => Some(value.clone()),
        (FieldKind::Boolean, Value::String(s)) => match s.as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        (FieldKind::Date, Value::String(s)) => normalize_date(s.trim()).map(Value::String),
        (FieldKind::Array, Value::Array(_)) => Some(value.clone()),
        (FieldKind::Object, Value::Object(_)) => Some(value.clone()),
        _ => None,
    }
}

/// Whole numbers become integers so a second pass sees the same value
fn number(field: &FieldDescriptor, f: f64) -> Option<Value> {
    let whole = f.fract() == 0.0;
    if field.constraints.integer && !whole {
        return None;
    }
    if whole && f.abs() < 9.0e15 {
        Some(Value::from(f as i64))
    } else {
        serde_json::Number::from_f64(f).map(Value::Number)
    }
}

/// `YYYY-MM-DD` stays a date; RFC 3339 timestamps become UTC with a `Z` suffix
pub(crate) fn normalize_date(text: &str) -> Option<String> {
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date.format("%Y-%m-%d").to_string());
    }
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

fn type_message(field: &FieldDescriptor) -> String {
    let name = field.display_name();
    match field.kind {
        FieldKind::Number if field.constraints.integer => format!("{} must be a whole number", name),
        FieldKind::Date => format!("{} must be a valid date", name),
        FieldKind::Array => format!("{} must be a list", name),
        kind => format!("{} must be a {}", name, kind.as_str()),
    }
}

type Failure = (&'static str, &'static str, String);

fn check_bounds(field: &FieldDescriptor, value: &Value) -> Option<Failure> {
    let c = &field.constraints;
    let name = field.display_name();
    let (length, unit) = match value {
        Value::String(s) if field.kind == FieldKind::Text => (Some(s.chars().count()), "characters"),
        Value::Array(a) => (Some(a.len()), "items"),
        _ => (None, ""),
    };
    if let Some(len) = length {
        if let Some(min) = c.min_length {
            if len < min {
                let message = format!("{} must be at least {} {}", name, min, unit);
                return Some((error_codes::TOO_SHORT, "too_short", message));
            }
        }
        if let Some(max) = c.max_length {
            if len > max {
                let message = format!("{} must be at most {} {}", name, max, unit);
                return Some((error_codes::TOO_LONG, "too_long", message));
            }
        }
    }

    if let Some(n) = value.as_f64().filter(|_| field.kind == FieldKind::Number) {
        if let Some(bound) = c.exclusive_min {
            if n <= bound {
                let message = format!("{} must be greater than {}", name, bound);
                return Some((error_codes::OUT_OF_RANGE, "range", message));
            }
        }
        if let Some(min) = c.min {
            if n < min {
                let message = format!("{} must be at least {}", name, min);
                return Some((error_codes::OUT_OF_RANGE, "range", message));
            }
        }
        if let Some(max) = c.max {
            if n > max {
                let message = format!("{} must be at most {}", name, max);
                return Some((error_codes::OUT_OF_RANGE, "range", message));
            }
        }
    }
    None
}

fn check_membership(field: &FieldDescriptor, value: &Value) -> Option<Failure> {
    let text = value.as_str()?;
    let name = field.display_name();

    if field.kind == FieldKind::Enum {
        if !field.values.iter().any(|v| v == text) {
            let message = format!("{} must be one of: {}", name, field.values.join(", "));
            return Some((error_codes::NOT_IN_ENUM, "enum", message));
        }
        return None;
    }
    if field.kind != FieldKind::Text {
        return None;
    }

    if let Some(pattern) = &field.constraints.pattern {
        let matched = match Regex::new(pattern) {
            Ok(re) => re.is_match(text),
            Err(err) => {
                warn!(field = %field.name, error = %err, "Pattern does not compile");
                false
            }
        };
        if !matched {
            let message = format!("{} has an invalid format", name);
            return Some((error_codes::PATTERN_MISMATCH, "pattern", message));
        }
    }

    if let Some(format) = field.constraints.format {
        if !matches_format(format, text) {
            let message = match format {
                TextFormat::Email => "Please enter a valid email address".to_string(),
                TextFormat::Url => "Please enter a valid URL".to_string(),
                TextFormat::Phone => "Please enter a valid phone number".to_string(),
            };
            return Some((error_codes::INVALID_FORMAT, "format", message));
        }
    }
    None
}

fn has_unique_items(value: &Value) -> bool {
    match value {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .all(|(i, item)| !items[..i].contains(item)),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn codes(errors: &ValidationErrors) -> Vec<(&str, &'static str)> {
        errors.iter().map(|e| (e.path.as_str(), e.code)).collect()
    }

    #[test]
    fn test_coerces_numbers_booleans_and_dates() {
        let schema = Schema::new(
            "coercion",
            vec![
                FieldDescriptor::number("age").integer(),
                FieldDescriptor::number("price"),
                FieldDescriptor::boolean("active"),
                FieldDescriptor::date("birthDate"),
                FieldDescriptor::date("seenAt"),
            ],
        )
        .unwrap();

        let normalized = schema
            .validate(&json!({
                "age": "42",
                "price": "19.5",
                "active": "true",
                "birthDate": "1990-05-17",
                "seenAt": "2024-03-01T10:00:00+02:00"
            }))
            .unwrap();

        assert_eq!(
            normalized,
            json!({
                "age": 42,
                "price": 19.5,
                "active": true,
                "birthDate": "1990-05-17",
                "seenAt": "2024-03-01T08:00:00Z"
            })
        );
    }

    #[test]
    fn test_first_failing_stage_short_circuits_field_only() {
        let schema = Schema::new(
            "stages",
            vec![
                FieldDescriptor::text("code").required().min_length(3).pattern("^[A-Z]+$"),
                FieldDescriptor::number("qty").range(Some(1.0), Some(10.0)),
                FieldDescriptor::enumeration("size", ["s", "m", "l"]),
            ],
        )
        .unwrap();

        let errors = schema
            .validate(&json!({ "code": "ab", "qty": 11, "size": "xl" }))
            .unwrap_err();

        assert_eq!(
            codes(&errors),
            vec![
                ("code", error_codes::TOO_SHORT),
                ("qty", error_codes::OUT_OF_RANGE),
                ("size", error_codes::NOT_IN_ENUM),
            ]
        );
    }

    #[test]
    fn test_empty_string_handling() {
        let schema = Schema::new(
            "empty",
            vec![
                FieldDescriptor::text("phone").format(TextFormat::Phone).allow_empty(),
                FieldDescriptor::text("nickname"),
                FieldDescriptor::number("age"),
                FieldDescriptor::text("city").required(),
            ],
        )
        .unwrap();

        let errors = schema
            .validate(&json!({ "phone": "", "nickname": "", "age": "", "city": "" }))
            .unwrap_err();
        assert_eq!(codes(&errors), vec![("city", error_codes::REQUIRED)]);

        let normalized = schema
            .validate(&json!({ "phone": "", "nickname": "", "age": "", "city": "Berlin" }))
            .unwrap();
        assert_eq!(normalized, json!({ "nickname": "", "city": "Berlin" }));
    }

    #[test]
    fn test_nested_array_errors_carry_index() {
        let schema = Schema::new(
            "contacts",
            vec![FieldDescriptor::array(
                "contacts",
                FieldDescriptor::object(
                    "contact",
                    vec![
                        FieldDescriptor::enumeration("type", ["email", "phone"]).required(),
                        FieldDescriptor::text("value").required(),
                    ],
                ),
            )
            .required()
            .min_length(1)],
        )
        .unwrap();

        let errors = schema
            .validate(&json!({
                "contacts": [
                    { "type": "email", "value": "" },
                    { "type": "fax", "value": "123" }
                ]
            }))
            .unwrap_err();

        assert_eq!(
            codes(&errors),
            vec![
                ("contacts[0].value", error_codes::REQUIRED),
                ("contacts[1].type", error_codes::NOT_IN_ENUM),
            ]
        );

        let errors = schema.validate(&json!({ "contacts": [] })).unwrap_err();
        assert_eq!(codes(&errors), vec![("contacts", error_codes::TOO_SHORT)]);
    }

    #[test]
    fn test_unknown_keys_are_stripped_and_defaults_applied() {
        let schema = Schema::new(
            "search",
            vec![
                FieldDescriptor::text("query").required(),
                FieldDescriptor::enumeration("order", ["asc", "desc"]).default_value(json!("asc")),
            ],
        )
        .unwrap();

        let normalized = schema
            .validate(&json!({ "query": "rust", "debug": true }))
            .unwrap();
        assert_eq!(normalized, json!({ "query": "rust", "order": "asc" }));
    }

    #[test]
    fn test_refinements_run_last() {
        let schema = Schema::new(
            "signup",
            vec![
                FieldDescriptor::text("password").required().min_length(8),
                FieldDescriptor::text("confirmPassword").required().refine(Refinement::MatchesField {
                    field: FieldPath::parse("password").unwrap(),
                    message: Some("Passwords do not match".to_string()),
                }),
                FieldDescriptor::boolean("terms").required().refine(Refinement::MustBeTrue { message: None }),
                FieldDescriptor::array("tags", FieldDescriptor::text("tag"))
                    .refine(Refinement::UniqueItems { message: None }),
            ],
        )
        .unwrap();

        let errors = schema
            .validate(&json!({
                "password": "Secret123!",
                "confirmPassword": "Secret124!",
                "terms": false,
                "tags": ["a", "b", "a"]
            }))
            .unwrap_err();

        assert_eq!(
            codes(&errors),
            vec![
                ("confirmPassword", error_codes::REFINEMENT_FAILED),
                ("terms", error_codes::REFINEMENT_FAILED),
                ("tags", error_codes::REFINEMENT_FAILED),
            ]
        );
        assert_eq!(errors.get("confirmPassword").unwrap().message, "Passwords do not match");
    }

    #[test]
    fn test_custom_refinement_applies_to_every_element() {
        let schema = Schema::new(
            "skills",
            vec![FieldDescriptor::array("skills", FieldDescriptor::text("skill"))],
        )
        .unwrap()
        .with_refinement("skills[0]", "Skill must be lowercase", |value, _| {
            value.as_str().map_or(false, |s| s == s.to_lowercase())
        })
        .unwrap();

        let errors = schema
            .validate(&json!({ "skills": ["rust", "Go", "zig"] }))
            .unwrap_err();
        assert_eq!(codes(&errors), vec![("skills[1]", error_codes::REFINEMENT_FAILED)]);
    }

    #[test]
    fn test_hidden_fields_are_skipped() {
        let schema = Schema::new(
            "preferences",
            vec![
                FieldDescriptor::enumeration("contactMethod", ["email", "phone"]).required(),
                FieldDescriptor::text("phone")
                    .required()
                    .visible_when(FieldPath::parse("contactMethod").unwrap(), json!("phone")),
            ],
        )
        .unwrap();

        assert!(schema.validate(&json!({ "contactMethod": "email" })).is_ok());
        let errors = schema.validate(&json!({ "contactMethod": "phone" })).unwrap_err();
        assert_eq!(codes(&errors), vec![("phone", error_codes::REQUIRED)]);
    }

    #[test]
    fn test_conditions_read_defaulted_and_coerced_controllers() {
        let schema = Schema::new(
            "contact",
            vec![
                FieldDescriptor::enumeration("contactMethod", ["email", "phone"]).default_value(json!("phone")),
                FieldDescriptor::text("phone")
                    .required()
                    .visible_when(FieldPath::parse("contactMethod").unwrap(), json!("phone")),
                FieldDescriptor::boolean("newsletter"),
                FieldDescriptor::text("email")
                    .required()
                    .visible_when(FieldPath::parse("newsletter").unwrap(), json!(true)),
            ],
        )
        .unwrap();

        let errors = schema.validate(&json!({ "newsletter": "true" })).unwrap_err();
        assert_eq!(
            codes(&errors),
            vec![("phone", error_codes::REQUIRED), ("email", error_codes::REQUIRED)]
        );

        let normalized = schema
            .validate(&json!({ "phone": "+49 30 1234567", "newsletter": "false" }))
            .unwrap();
        assert_eq!(
            normalized,
            json!({ "contactMethod": "phone", "phone": "+49 30 1234567", "newsletter": false })
        );
        assert_eq!(schema.validate(&normalized), Ok(normalized.clone()));
    }

    #[test]
    fn test_matches_field_compares_normalized_values() {
        let schema = Schema::new(
            "pin",
            vec![
                FieldDescriptor::number("pin").required(),
                FieldDescriptor::number("confirmPin").required().refine(Refinement::MatchesField {
                    field: FieldPath::parse("pin").unwrap(),
                    message: None,
                }),
            ],
        )
        .unwrap();

        let normalized = schema.validate(&json!({ "pin": "1234", "confirmPin": 1234 })).unwrap();
        assert_eq!(normalized, json!({ "pin": 1234, "confirmPin": 1234 }));

        let errors = schema.validate(&json!({ "pin": "1234", "confirmPin": "4321" })).unwrap_err();
        assert_eq!(codes(&errors), vec![("confirmPin", error_codes::REFINEMENT_FAILED)]);
    }

    #[test]
    fn test_validate_paths_reads_defaulted_controller() {
        let schema = Schema::new(
            "contact",
            vec![
                FieldDescriptor::enumeration("contactMethod", ["email", "phone"]).default_value(json!("phone")),
                FieldDescriptor::text("phone")
                    .required()
                    .visible_when(FieldPath::parse("contactMethod").unwrap(), json!("phone")),
            ],
        )
        .unwrap();

        let paths = vec![FieldPath::parse("phone").unwrap()];
        let errors = schema.validate_paths(&json!({}), &paths).unwrap_err();
        assert_eq!(codes(&errors), vec![("phone", error_codes::REQUIRED)]);
    }

    #[test]
    fn test_message_overrides() {
        let schema = Schema::new(
            "messages",
            vec![FieldDescriptor::text("subject")
                .required()
                .min_length(5)
                .message("too_short", "Subject must be at least 5 characters")],
        )
        .unwrap();
        let errors = schema.validate(&json!({ "subject": "Hi" })).unwrap_err();
        assert_eq!(errors.get("subject").unwrap().message, "Subject must be at least 5 characters");
    }

    #[test]
    fn test_validate_paths_checks_subset_only() {
        let schema = Schema::new(
            "steps",
            vec![
                FieldDescriptor::text("firstName").required(),
                FieldDescriptor::object("address", vec![FieldDescriptor::text("city").required()]),
            ],
        )
        .unwrap();

        let record = json!({ "firstName": "", "address": { "city": "" } });
        let paths = vec![FieldPath::parse("address.city").unwrap()];
        let errors = schema.validate_paths(&record, &paths).unwrap_err();
        assert_eq!(codes(&errors), vec![("address.city", error_codes::REQUIRED)]);
    }

    #[test]
    fn test_normalize_date() {
        assert_eq!(normalize_date("2024-02-29"), Some("2024-02-29".to_string()));
        assert_eq!(normalize_date("2023-02-29"), None);
        assert_eq!(normalize_date("yesterday"), None);
    }
}
