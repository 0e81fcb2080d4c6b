use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::path::FieldPath;

/// Primitive kind of a declared field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    /// Free text (also used for email, url and phone inputs via `format`)
    Text,

    /// Integer or floating point number
    Number,

    /// `true` / `false`
    Boolean,

    /// Calendar date or timestamp
    Date,

    /// One of a closed set of string values
    Enum,

    /// Variable-length list of elements described by `items`
    Array,

    /// Nested record described by `fields`
    Object,
}

impl FieldKind {
    /// Name used in messages
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::Number => "number",
            FieldKind::Boolean => "boolean",
            FieldKind::Date => "date",
            FieldKind::Enum => "enum",
            FieldKind::Array => "array",
            FieldKind::Object => "object",
        }
    }
}

/// Well-known text formats checked in the pattern stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextFormat {
    /// `local@domain.tld`
    Email,

    /// Absolute http(s) URL
    Url,

    /// Optional leading `+`, then up to 16 digits
    Phone,
}

/// Length, range and pattern constraints for a field.
///
/// For text the length bounds count characters; for arrays they count elements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    /// Minimum length (characters or elements)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,

    /// Maximum length (characters or elements)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,

    /// Inclusive numeric lower bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,

    /// Inclusive numeric upper bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,

    /// Exclusive numeric lower bound (`exclusive_min: 0` means "positive")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclusive_min: Option<f64>,

    /// Numbers must be whole
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub integer: bool,

    /// Regular expression the text must match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    /// Well-known text format
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<TextFormat>,

    /// Treat an empty string as "not provided" for an optional text field
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub allow_empty: bool,
}

/// Declarative refinement applied after every other check on a field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum Refinement {
    /// Value must be boolean `true` (consent checkboxes)
    MustBeTrue {
        /// Message override
        #[serde(default)]
        message: Option<String>,
    },

    /// Value must equal the value at another path (password confirmation)
    MatchesField {
        /// Path of the field to compare against, from the record root
        field: FieldPath,

        /// Message override
        #[serde(default)]
        message: Option<String>,
    },

    /// Array elements must be pairwise distinct
    UniqueItems {
        /// Message override
        #[serde(default)]
        message: Option<String>,
    },
}

/// Condition under which a field participates in validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Path of the controlling field, from the record root
    pub field: FieldPath,

    /// Value the controlling field must hold
    pub equals: Value,
}

impl Condition {
    /// Evaluate against the record being validated
    pub fn holds(&self, root: &Value) -> bool {
        self.field.resolve(root) == Some(&self.equals)
    }
}

/// Declaration of a single input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Member name inside the parent object
    pub name: String,

    /// Primitive kind
    pub kind: FieldKind,

    /// Whether the field must be present
    #[serde(default)]
    pub required: bool,

    /// Human-readable label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Length, range and pattern constraints
    #[serde(default)]
    pub constraints: Constraints,

    /// Allowed values for `enum` fields
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,

    /// Element declaration for `array` fields (its `name` is ignored)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<FieldDescriptor>>,

    /// Child declarations for `object` fields
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldDescriptor>,

    /// Value used when the field is absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    /// Refinements, applied in order after all other checks
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub refinements: Vec<Refinement>,

    /// Message overrides keyed by rule (`required`, `too_short`, `pattern`, ...)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub messages: HashMap<String, String>,

    /// Only validate this field when the condition holds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible_when: Option<Condition>,
}

impl FieldDescriptor {
    /// Start a declaration of the given kind. Fields are optional until `required()` is called.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        FieldDescriptor {
            name: name.into(),
            kind,
            required: false,
            label: None,
            constraints: Constraints::default(),
            values: Vec::new(),
            items: None,
            fields: Vec::new(),
            default: None,
            refinements: Vec::new(),
            messages: HashMap::new(),
            visible_when: None,
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Text)
    }

    pub fn number(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Number)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Boolean)
    }

    pub fn date(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Date)
    }

    pub fn enumeration<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut field = Self::new(name, FieldKind::Enum);
        field.values = values.into_iter().map(Into::into).collect();
        field
    }

    pub fn array(name: impl Into<String>, items: FieldDescriptor) -> Self {
        let mut field = Self::new(name, FieldKind::Array);
        field.items = Some(Box::new(items));
        field
    }

    pub fn object(name: impl Into<String>, fields: Vec<FieldDescriptor>) -> Self {
        let mut field = Self::new(name, FieldKind::Object);
        field.fields = fields;
        field
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn min_length(mut self, min: usize) -> Self {
        self.constraints.min_length = Some(min);
        self
    }

    pub fn max_length(mut self, max: usize) -> Self {
        self.constraints.max_length = Some(max);
        self
    }

    pub fn range(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.constraints.min = min;
        self.constraints.max = max;
        self
    }

    pub fn positive(mut self) -> Self {
        self.constraints.exclusive_min = Some(0.0);
        self
    }

    pub fn integer(mut self) -> Self {
        self.constraints.integer = true;
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.constraints.pattern = Some(pattern.into());
        self
    }

    pub fn format(mut self, format: TextFormat) -> Self {
        self.constraints.format = Some(format);
        self
    }

    pub fn allow_empty(mut self) -> Self {
        self.constraints.allow_empty = true;
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn refine(mut self, refinement: Refinement) -> Self {
        self.refinements.push(refinement);
        self
    }

    pub fn visible_when(mut self, field: FieldPath, equals: Value) -> Self {
        self.visible_when = Some(Condition { field, equals });
        self
    }

    /// Override the message reported for `rule`
    pub fn message(mut self, rule: &str, message: impl Into<String>) -> Self {
        self.messages.insert(rule.to_string(), message.into());
        self
    }

    /// Child declaration by member name (object fields only)
    pub fn child(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Name shown to users: the label when present, else the member name
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    /// A fresh value for this field: its default, or an empty value of its kind.
    ///
    /// Used to seed new records and new array entries.
    pub fn initial_value(&self) -> Value {
        if let Some(default) = &self.default {
            return default.clone();
        }
        match self.kind {
            FieldKind::Text | FieldKind::Date => Value::String(String::new()),
            FieldKind::Boolean => Value::Bool(false),
            FieldKind::Array => Value::Array(Vec::new()),
            FieldKind::Object => {
                let map = self
                    .fields
                    .iter()
                    .map(|f| (f.name.clone(), f.initial_value()))
                    .collect();
                Value::Object(map)
            }
            FieldKind::Number | FieldKind::Enum => Value::Null,
        }
    }
}
