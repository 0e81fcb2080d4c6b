use formgrid_schema::{Condition, FieldPath};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

use super::column::ColumnDescriptor;
use super::view::ViewState;
use crate::error::CoreError;

/// Supported `table_version`
pub const TABLE_VERSION: &str = "1.0";

/// Feature switches of a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableFeatures {
    /// Column sorting
    #[serde(default = "default_true")]
    pub sorting: bool,
    /// Per-column filters
    #[serde(default = "default_true")]
    pub filtering: bool,
    /// The global search box
    #[serde(default = "default_true")]
    pub global_search: bool,
    /// Row selection and bulk actions
    #[serde(default = "default_true")]
    pub row_selection: bool,
}

fn default_true() -> bool {
    true
}

impl Default for TableFeatures {
    fn default() -> Self {
        TableFeatures {
            sorting: true,
            filtering: true,
            global_search: true,
            row_selection: true,
        }
    }
}

/// Per-row action such as "edit" or "delete"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowAction {
    /// Action identifier
    pub id: String,
    /// Menu label
    pub label: String,

    /// Confirmation prompt the host shows before invoking
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirm: Option<String>,

    /// The action is disabled for rows matching this condition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled_when: Option<Condition>,
}

impl RowAction {
    /// Always-enabled action without a confirmation prompt
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        RowAction {
            id: id.into(),
            label: label.into(),
            confirm: None,
            disabled_when: None,
        }
    }

    /// Ask for confirmation before invoking
    pub fn confirm(mut self, prompt: impl Into<String>) -> Self {
        self.confirm = Some(prompt.into());
        self
    }

    /// Disable the action for rows matching `condition`
    pub fn disabled_when(mut self, condition: Condition) -> Self {
        self.disabled_when = Some(condition);
        self
    }

    /// Whether the action is disabled for `row`
    pub fn is_disabled_for(&self, row: &serde_json::Value) -> bool {
        self.disabled_when.as_ref().is_some_and(|c| c.holds(row))
    }
}

/// Action over the selected rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkAction {
    /// Action identifier
    pub id: String,
    /// Toolbar label
    pub label: String,
    /// Confirmation prompt the host shows before invoking
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirm: Option<String>,
}

impl BulkAction {
    /// Action without a confirmation prompt
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        BulkAction {
            id: id.into(),
            label: label.into(),
            confirm: None,
        }
    }
}

/// Declarative table configuration.
///
/// Rows themselves are supplied separately to the model; the configuration
/// only names where each row keeps its identity (`row_id`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableConfig {
    /// Table identifier
    pub id: String,

    /// Caption
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Path of the row identity; stringified
    #[serde(default = "default_row_id")]
    pub row_id: FieldPath,

    /// Columns in display order
    pub columns: Vec<ColumnDescriptor>,

    /// Enabled features
    #[serde(default)]
    pub features: TableFeatures,

    /// Per-row actions
    #[serde(default)]
    pub row_actions: Vec<RowAction>,

    /// Actions over the selection
    #[serde(default)]
    pub bulk_actions: Vec<BulkAction>,

    /// View state the table mounts with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_state: Option<ViewState>,
}

fn default_row_id() -> FieldPath {
    FieldPath::root().key("id")
}

impl TableConfig {
    /// Build and check a configuration with default features
    pub fn new(id: impl Into<String>, columns: Vec<ColumnDescriptor>) -> Result<Self, CoreError> {
        let config = TableConfig {
            id: id.into(),
            title: None,
            row_id: default_row_id(),
            columns,
            features: TableFeatures::default(),
            row_actions: Vec::new(),
            bulk_actions: Vec::new(),
            initial_state: None,
        };
        config.check()?;
        Ok(config)
    }

    /// Replace the feature switches
    pub fn with_features(mut self, features: TableFeatures) -> Self {
        self.features = features;
        self
    }

    /// Read row identity from `row_id` instead of `id`
    pub fn with_row_id(mut self, row_id: FieldPath) -> Self {
        self.row_id = row_id;
        self
    }

    /// Add a row action
    pub fn with_row_action(mut self, action: RowAction) -> Self {
        self.row_actions.push(action);
        self
    }

    /// Add a bulk action
    pub fn with_bulk_action(mut self, action: BulkAction) -> Self {
        self.bulk_actions.push(action);
        self
    }

    /// Set the initial view state and check it against the columns
    pub fn with_initial_state(mut self, state: ViewState) -> Result<Self, CoreError> {
        self.initial_state = Some(state);
        self.check()?;
        Ok(self)
    }

    /// Column by id
    pub fn column(&self, id: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.id == id)
    }

    /// Row action by id
    pub fn row_action(&self, id: &str) -> Option<&RowAction> {
        self.row_actions.iter().find(|a| a.id == id)
    }

    /// Bulk action by id
    pub fn bulk_action(&self, id: &str) -> Option<&BulkAction> {
        self.bulk_actions.iter().find(|a| a.id == id)
    }

    /// Identity of `row`; `None` when the row has no usable id
    pub fn row_id_of(&self, row: &serde_json::Value) -> Option<String> {
        match self.row_id.resolve(row)? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Check column ids, action ids and the initial state
    pub fn check(&self) -> Result<(), CoreError> {
        if self.columns.is_empty() {
            return Err(CoreError::InvalidDefinition(format!("table '{}' declares no columns", self.id)));
        }
        let mut ids = HashSet::new();
        for column in &self.columns {
            if column.id.is_empty() {
                return Err(CoreError::InvalidDefinition(format!(
                    "table '{}' has a column without id",
                    self.id
                )));
            }
            if !ids.insert(column.id.as_str()) {
                return Err(CoreError::InvalidDefinition(format!(
                    "table '{}' declares column '{}' twice",
                    self.id, column.id
                )));
            }
        }

        let mut actions = HashSet::new();
        let action_ids = self
            .row_actions
            .iter()
            .map(|a| a.id.as_str())
            .chain(self.bulk_actions.iter().map(|a| a.id.as_str()));
        for id in action_ids {
            if !actions.insert(id) {
                return Err(CoreError::InvalidDefinition(format!(
                    "table '{}' declares action '{}' twice",
                    self.id, id
                )));
            }
        }

        if let Some(state) = &self.initial_state {
            if state.page_size == 0 {
                return Err(CoreError::InvalidDefinition("page size must be positive".to_string()));
            }
            let referenced = state
                .sort
                .iter()
                .map(|k| k.column.as_str())
                .chain(state.filters.keys().map(String::as_str))
                .chain(state.hidden.iter().map(String::as_str));
            for column in referenced {
                if self.column(column).is_none() {
                    return Err(CoreError::UnknownColumn(column.to_string()));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct TableDocument {
    table_version: String,
    table: TableConfig,
}

/// Parse a YAML table configuration.
///
/// # Arguments
///
/// * `yaml_str` - A YAML string with `table_version` and `table`
pub fn parse_table_config(yaml_str: &str) -> Result<TableConfig, CoreError> {
    let document: TableDocument = serde_yaml::from_str(yaml_str)?;
    if document.table_version != TABLE_VERSION {
        return Err(CoreError::InvalidDefinition(format!(
            "unsupported table version: {}",
            document.table_version
        )));
    }
    document.table.check()?;
    debug!(table = %document.table.id, columns = document.table.columns.len(), "Parsed table configuration");
    Ok(document.table)
}
