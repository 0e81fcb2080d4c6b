use formgrid_schema::FieldPath;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use super::view::ColumnFilter;

/// Custom cell derivation for columns without a plain accessor
pub type DeriveFn = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// How a column's filter input is interpreted when given as plain text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    /// Case-insensitive substring
    #[default]
    Text,
    /// Exact match on the stringified value (enum-like columns)
    Exact,
    /// Numeric `min..max`
    Range,
    /// Date `from..to`
    Date,
}

impl FilterMode {
    /// Build a filter from text input.
    ///
    /// Ranges are written `min..max` with either bound optional; an
    /// unparsable bound is left open.
    pub fn parse_input(&self, input: &str) -> ColumnFilter {
        let input = input.trim();
        match self {
            FilterMode::Text => ColumnFilter::Contains {
                value: input.to_string(),
            },
            FilterMode::Exact if input.contains('|') => ColumnFilter::OneOf {
                values: input.split('|').map(|v| v.trim().to_string()).collect(),
            },
            FilterMode::Exact => ColumnFilter::Equals {
                value: Value::String(input.to_string()),
            },
            FilterMode::Range => {
                let (min, max) = split_range(input);
                ColumnFilter::Range {
                    min: min.and_then(|v| v.parse().ok()),
                    max: max.and_then(|v| v.parse().ok()),
                }
            }
            FilterMode::Date => {
                let (from, to) = split_range(input);
                ColumnFilter::DateRange {
                    from: from.map(str::to_string),
                    to: to.map(str::to_string),
                }
            }
        }
    }
}

fn split_range<'a>(input: &'a str) -> (Option<&'a str>, Option<&'a str>) {
    let non_empty = |s: &'a str| {
        let s = s.trim();
        (!s.is_empty()).then_some(s)
    };
    match input.split_once("..") {
        Some((low, high)) => (non_empty(low), non_empty(high)),
        None => (non_empty(input), non_empty(input)),
    }
}

/// Declaration of a single table column
#[derive(Clone, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Unique column identifier
    pub id: String,

    /// Display header
    pub header: String,

    /// Path into the row record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accessor: Option<FieldPath>,

    /// Derivation used instead of `accessor`
    #[serde(skip)]
    pub derive: Option<DeriveFn>,

    /// Participates in sorting
    #[serde(default = "default_true")]
    pub sortable: bool,

    /// Participates in column filters and global search
    #[serde(default = "default_true")]
    pub filterable: bool,

    /// The user may hide the column
    #[serde(default = "default_true")]
    pub hideable: bool,

    /// Interpretation of plain-text filter input
    #[serde(default)]
    pub filter: FilterMode,
}

fn default_true() -> bool {
    true
}

impl fmt::Debug for ColumnDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnDescriptor")
            .field("id", &self.id)
            .field("header", &self.header)
            .field("accessor", &self.accessor)
            .field("derive", &self.derive.as_ref().map(|_| "<fn>"))
            .field("sortable", &self.sortable)
            .field("filterable", &self.filterable)
            .field("hideable", &self.hideable)
            .field("filter", &self.filter)
            .finish()
    }
}

impl ColumnDescriptor {
    /// Data column reading `accessor` from each row
    pub fn accessor(id: impl Into<String>, header: impl Into<String>, accessor: FieldPath) -> Self {
        ColumnDescriptor {
            id: id.into(),
            header: header.into(),
            accessor: Some(accessor),
            derive: None,
            sortable: true,
            filterable: true,
            hideable: true,
            filter: FilterMode::Text,
        }
    }

    /// Data column whose value is computed from the whole row
    pub fn derived<F>(id: impl Into<String>, header: impl Into<String>, derive: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        ColumnDescriptor {
            derive: Some(Arc::new(derive)),
            accessor: None,
            ..ColumnDescriptor::display(id, header)
        }
    }

    /// Presentation-only column (selection boxes, action menus); carries no data
    pub fn display(id: impl Into<String>, header: impl Into<String>) -> Self {
        ColumnDescriptor {
            id: id.into(),
            header: header.into(),
            accessor: None,
            derive: None,
            sortable: false,
            filterable: false,
            hideable: false,
            filter: FilterMode::Text,
        }
    }

    /// Set whether the column sorts
    pub fn sortable(mut self, sortable: bool) -> Self {
        self.sortable = sortable;
        self
    }

    /// Set whether the column filters
    pub fn filterable(mut self, filterable: bool) -> Self {
        self.filterable = filterable;
        self
    }

    /// Set whether the column can be hidden
    pub fn hideable(mut self, hideable: bool) -> Self {
        self.hideable = hideable;
        self
    }

    /// Set how filter input is read
    pub fn filter_mode(mut self, mode: FilterMode) -> Self {
        self.filter = mode;
        self
    }

    /// Whether the column yields a value per row
    pub fn has_data(&self) -> bool {
        self.accessor.is_some() || self.derive.is_some()
    }

    /// Cell value for `row`; `Null` when the accessor does not resolve
    pub fn value(&self, row: &Value) -> Value {
        if let Some(derive) = &self.derive {
            return derive(row);
        }
        self.accessor
            .as_ref()
            .and_then(|path| path.resolve(row))
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// Cell rendered as text; empty for missing values
    pub fn text(&self, row: &Value) -> String {
        cell_text(&self.value(row))
    }
}

/// Stringify a cell value; `Null` is the empty sentinel
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
