use serde::Serialize;
use std::error::Error;
use std::fmt;

pub(crate) mod declaration;
pub(crate) mod engine;
mod formats;

/// A single field-scoped validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Error code (one of the constants in [`error_codes`])
    pub code: &'static str,

    /// Location of the offending value, e.g. `contacts[0].value`
    pub path: String,

    /// Human-readable error message
    pub message: String,
}

impl FieldError {
    pub fn new(code: &'static str, path: impl Into<String>, message: impl Into<String>) -> Self {
        FieldError {
            code,
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}: {}", self.code, self.message)
        } else {
            write!(f, "{}: {} (at {})", self.code, self.message, self.path)
        }
    }
}

impl Error for FieldError {}

/// Ordered list of field errors produced by one validation run.
///
/// Errors appear in field declaration order; nested and array errors follow
/// their parent's position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn new() -> Self {
        ValidationErrors(Vec::new())
    }

    pub fn push(&mut self, error: FieldError) {
        self.0.push(error);
    }

    pub fn extend(&mut self, other: ValidationErrors) {
        self.0.extend(other.0);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldError> {
        self.0.iter()
    }

    /// Errors whose path equals `path` or lies beneath it
    pub fn under<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a FieldError> + 'a {
        self.0.iter().filter(move |e| is_within(&e.path, path))
    }

    /// First error reported for exactly `path`
    pub fn get(&self, path: &str) -> Option<&FieldError> {
        self.0.iter().find(|e| e.path == path)
    }

    /// Single-line rendering: `path: message, path: message`
    pub fn summary(&self) -> String {
        self.0
            .iter()
            .map(|e| format!("{}: {}", e.path, e.message))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn into_vec(self) -> Vec<FieldError> {
        self.0
    }
}

impl From<Vec<FieldError>> for ValidationErrors {
    fn from(errors: Vec<FieldError>) -> Self {
        ValidationErrors(errors)
    }
}

impl IntoIterator for ValidationErrors {
    type Item = FieldError;
    type IntoIter = std::vec::IntoIter<FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ValidationErrors {
    type Item = &'a FieldError;
    type IntoIter = std::slice::Iter<'a, FieldError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation failed ({} issues):", self.0.len())?;
        for (i, err) in self.0.iter().enumerate() {
            write!(f, "\n  {}. {}", i + 1, err)?;
        }
        Ok(())
    }
}

impl Error for ValidationErrors {}

/// `true` when `path` is `prefix` or a descendant of it (`prefix.x`, `prefix[0]`)
pub fn is_within(path: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return true;
    }
    match path.strip_prefix(prefix) {
        Some("") => true,
        Some(rest) => rest.starts_with('.') || rest.starts_with('['),
        None => false,
    }
}

/// Validation error codes
pub mod error_codes {
    /// Required field missing or empty
    pub const REQUIRED: &str = "ERR_SCHEMA_REQUIRED";

    /// Value has the wrong primitive type and could not be coerced
    pub const INVALID_TYPE: &str = "ERR_SCHEMA_INVALID_TYPE";

    /// Text or array shorter than `min_length`
    pub const TOO_SHORT: &str = "ERR_SCHEMA_TOO_SHORT";

    /// Text or array longer than `max_length`
    pub const TOO_LONG: &str = "ERR_SCHEMA_TOO_LONG";

    /// Number outside the declared range
    pub const OUT_OF_RANGE: &str = "ERR_SCHEMA_OUT_OF_RANGE";

    /// Text does not match the declared pattern
    pub const PATTERN_MISMATCH: &str = "ERR_SCHEMA_PATTERN_MISMATCH";

    /// Text is not a valid email, url or phone number
    pub const INVALID_FORMAT: &str = "ERR_SCHEMA_INVALID_FORMAT";

    /// Value is not one of the allowed enum values
    pub const NOT_IN_ENUM: &str = "ERR_SCHEMA_NOT_IN_ENUM";

    /// A refinement predicate rejected the value
    pub const REFINEMENT_FAILED: &str = "ERR_SCHEMA_REFINEMENT_FAILED";

    /// Two sibling fields share a name
    pub const DUPLICATE_FIELD: &str = "ERR_SCHEMA_DECL_DUPLICATE_FIELD";

    /// Field has an empty name
    pub const EMPTY_NAME: &str = "ERR_SCHEMA_DECL_EMPTY_NAME";

    /// Lower bound greater than upper bound
    pub const INVALID_BOUNDS: &str = "ERR_SCHEMA_DECL_INVALID_BOUNDS";

    /// Pattern is not a valid regular expression
    pub const INVALID_PATTERN: &str = "ERR_SCHEMA_DECL_INVALID_PATTERN";

    /// Enum field declares no values
    pub const MISSING_ENUM_VALUES: &str = "ERR_SCHEMA_DECL_MISSING_ENUM_VALUES";

    /// Array field declares no item descriptor
    pub const MISSING_ITEMS: &str = "ERR_SCHEMA_DECL_MISSING_ITEMS";

    /// Object field declares no children
    pub const MISSING_FIELDS: &str = "ERR_SCHEMA_DECL_MISSING_FIELDS";

    /// Condition or refinement refers to an undeclared field
    pub const UNKNOWN_REFERENCE: &str = "ERR_SCHEMA_DECL_UNKNOWN_REFERENCE";
}
