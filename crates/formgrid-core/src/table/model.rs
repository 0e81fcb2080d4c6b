use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::column::ColumnDescriptor;
use super::config::TableConfig;
use super::derive::{apply_pagination, derive_order};
use super::export::{to_csv, DEFAULT_DELIMITER};
use super::view::{ColumnFilter, PageInfo, SortDirection, SortKey, ViewState};
use crate::error::CoreError;

/// Caller-supplied side effect for a row action
pub trait RowActionHandler: Send + Sync {
    /// Run the action on `row`
    fn handle(&self, row: &Value);
}

impl<F> RowActionHandler for F
where
    F: Fn(&Value) + Send + Sync,
{
    fn handle(&self, row: &Value) {
        self(row)
    }
}

/// Caller-supplied side effect for a bulk action
pub trait BulkActionHandler: Send + Sync {
    /// Run the action on the selected `rows`
    fn handle(&self, rows: &[&Value]);
}

impl<F> BulkActionHandler for F
where
    F: Fn(&[&Value]) + Send + Sync,
{
    fn handle(&self, rows: &[&Value]) {
        self(rows)
    }
}

/// Rendering view of the current page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableView {
    /// Table identifier
    pub table: String,
    /// Visible column ids in declaration order
    pub columns: Vec<String>,
    /// Rows of the current page
    pub rows: Vec<Value>,
    /// Pagination metadata
    pub page: PageInfo,
    /// Active sort keys
    pub sort: Vec<SortKey>,
    /// Active column filters
    pub filters: BTreeMap<String, ColumnFilter>,
    /// Global search string
    pub search: String,
    /// Selected row ids
    pub selected: Vec<String>,
}

/// Table model: source rows plus view state, with the derived order cached.
///
/// The model never mutates its rows. Actions hand rows to caller handlers,
/// which are expected to produce a replacement collection for
/// [`replace_rows`](Self::replace_rows).
pub struct TableModel {
    config: Arc<TableConfig>,
    rows: Arc<Vec<Value>>,
    view: ViewState,
    order: Vec<usize>,
    row_handlers: HashMap<String, Arc<dyn RowActionHandler>>,
    bulk_handlers: HashMap<String, Arc<dyn BulkActionHandler>>,
}

impl fmt::Debug for TableModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableModel")
            .field("table", &self.config.id)
            .field("rows", &self.rows.len())
            .field("view", &self.view)
            .finish()
    }
}

impl TableModel {
    /// Mount a table over `rows` using the configured initial state
    pub fn new(config: Arc<TableConfig>, rows: impl Into<Arc<Vec<Value>>>) -> Self {
        let view = config.initial_state.clone().unwrap_or_default();
        let mut model = TableModel {
            config,
            rows: rows.into(),
            view,
            order: Vec::new(),
            row_handlers: HashMap::new(),
            bulk_handlers: HashMap::new(),
        };
        model.refresh();
        info!(table = %model.config.id, rows = model.rows.len(), "Mounted table");
        model
    }

    /// The table configuration
    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    /// Source rows, unfiltered and in source order
    pub fn rows(&self) -> &[Value] {
        &self.rows
    }

    /// Current view state
    pub fn view(&self) -> &ViewState {
        &self.view
    }

    /// Install a new source collection, pruning selections whose rows are gone
    pub fn replace_rows(&mut self, rows: impl Into<Arc<Vec<Value>>>) {
        self.rows = rows.into();
        let ids: std::collections::HashSet<String> =
            self.rows.iter().filter_map(|r| self.config.row_id_of(r)).collect();
        let before = self.view.selected.len();
        self.view.selected.retain(|id| ids.contains(id));
        if self.view.selected.len() != before {
            debug!(table = %self.config.id, pruned = before - self.view.selected.len(), "Pruned stale selections");
        }
        self.refresh();
    }

    /// Set the global search string
    pub fn set_global_filter(&mut self, search: impl Into<String>) -> Result<(), CoreError> {
        if !self.config.features.global_search {
            return Err(CoreError::FeatureDisabled("global_search".to_string()));
        }
        self.view.search = search.into();
        self.view.page_index = 0;
        self.refresh();
        Ok(())
    }

    /// Set or clear (`None`) the filter of one column
    pub fn set_column_filter(&mut self, column: &str, filter: Option<ColumnFilter>) -> Result<(), CoreError> {
        if !self.config.features.filtering {
            return Err(CoreError::FeatureDisabled("filtering".to_string()));
        }
        let descriptor = self.column_or_err(column)?;
        if !descriptor.filterable {
            return Err(CoreError::ColumnNotCapable {
                column: column.to_string(),
                capability: "filterable",
            });
        }
        match filter {
            Some(filter) => self.view.filters.insert(column.to_string(), filter),
            None => self.view.filters.remove(column),
        };
        self.view.page_index = 0;
        self.refresh();
        Ok(())
    }

    /// Set a column filter from plain text, interpreted by the column's filter mode
    pub fn set_column_filter_input(&mut self, column: &str, input: &str) -> Result<(), CoreError> {
        let mode = self.column_or_err(column)?.filter;
        let filter = mode.parse_input(input);
        self.set_column_filter(column, Some(filter))
    }

    /// Drop every column filter and the global search
    pub fn clear_filters(&mut self) {
        self.view.filters.clear();
        self.view.search.clear();
        self.view.page_index = 0;
        self.refresh();
    }

    /// Replace the sort keys
    pub fn set_sort(&mut self, keys: Vec<SortKey>) -> Result<(), CoreError> {
        if !self.config.features.sorting {
            return Err(CoreError::FeatureDisabled("sorting".to_string()));
        }
        for key in &keys {
            self.ensure_sortable(&key.column)?;
        }
        self.view.sort = keys;
        self.view.page_index = 0;
        self.refresh();
        Ok(())
    }

    /// Cycle a column through ascending, descending and unsorted.
    ///
    /// Without `multi` the column becomes the only sort key.
    pub fn toggle_sort(&mut self, column: &str, multi: bool) -> Result<Option<SortDirection>, CoreError> {
        if !self.config.features.sorting {
            return Err(CoreError::FeatureDisabled("sorting".to_string()));
        }
        self.ensure_sortable(column)?;

        let current = self.view.sort.iter().position(|k| k.column == column);
        let next = match current.map(|i| self.view.sort[i].direction) {
            None => Some(SortDirection::Asc),
            Some(SortDirection::Asc) => Some(SortDirection::Desc),
            Some(SortDirection::Desc) => None,
        };

        if !multi {
            self.view.sort.retain(|k| k.column == column);
        }
        match (self.view.sort.iter().position(|k| k.column == column), next) {
            (Some(i), Some(direction)) => self.view.sort[i].direction = direction,
            (Some(i), None) => {
                self.view.sort.remove(i);
            }
            (None, Some(direction)) => self.view.sort.push(SortKey {
                column: column.to_string(),
                direction,
            }),
            (None, None) => {}
        }
        self.view.page_index = 0;
        self.refresh();
        Ok(next)
    }

    /// Go to `page_index`, clamped to the last page
    pub fn set_page(&mut self, page_index: usize) {
        self.view.page_index = PageInfo::new(self.order.len(), page_index, self.view.page_size).page_index;
    }

    /// Advance one page, staying on the last
    pub fn next_page(&mut self) {
        self.set_page(self.view.page_index + 1);
    }

    /// Go back one page, staying on the first
    pub fn previous_page(&mut self) {
        self.set_page(self.view.page_index.saturating_sub(1));
    }

    /// Change the page size and return to the first page
    pub fn set_page_size(&mut self, page_size: usize) -> Result<(), CoreError> {
        if page_size == 0 {
            return Err(CoreError::InvalidDefinition("page size must be positive".to_string()));
        }
        self.view.page_size = page_size;
        self.view.page_index = 0;
        Ok(())
    }

    /// Show or hide a hideable column
    pub fn set_column_visible(&mut self, column: &str, visible: bool) -> Result<(), CoreError> {
        let descriptor = self.column_or_err(column)?;
        if !descriptor.hideable {
            return Err(CoreError::ColumnNotCapable {
                column: column.to_string(),
                capability: "hideable",
            });
        }
        if visible {
            self.view.hidden.remove(column);
        } else {
            self.view.hidden.insert(column.to_string());
        }
        Ok(())
    }

    /// Columns not hidden by the user, in declaration order
    pub fn visible_columns(&self) -> Vec<&ColumnDescriptor> {
        self.config
            .columns
            .iter()
            .filter(|c| !self.view.hidden.contains(&c.id))
            .collect()
    }

    /// All filtered rows in sorted order
    pub fn filtered_rows(&self) -> Vec<&Value> {
        self.order.iter().map(|&i| &self.rows[i]).collect()
    }

    /// Rows of the current page
    pub fn page_rows(&self) -> Vec<&Value> {
        let (page, _) = apply_pagination(&self.order, self.view.page_index, self.view.page_size);
        page.into_iter().map(|i| &self.rows[i]).collect()
    }

    /// Pagination metadata of the current view
    pub fn page_info(&self) -> PageInfo {
        PageInfo::new(self.order.len(), self.view.page_index, self.view.page_size)
    }

    /// Toggle selection of the row with `row_id`.
    ///
    /// # Returns
    ///
    /// Whether the row is selected afterwards
    pub fn toggle_row_selected(&mut self, row_id: &str) -> Result<bool, CoreError> {
        self.ensure_selection()?;
        if self.find_row(row_id).is_none() {
            return Err(CoreError::UnknownRow(row_id.to_string()));
        }
        let selected = if self.view.selected.remove(row_id) {
            false
        } else {
            self.view.selected.insert(row_id.to_string());
            true
        };
        debug!(table = %self.config.id, row = row_id, selected, "Toggled row selection");
        Ok(selected)
    }

    /// Select every row on the page, or deselect them if all already are
    pub fn toggle_all_on_page(&mut self) -> Result<bool, CoreError> {
        self.ensure_selection()?;
        let ids: Vec<String> = self
            .page_rows()
            .into_iter()
            .filter_map(|r| self.config.row_id_of(r))
            .collect();
        let all_selected = !ids.is_empty() && ids.iter().all(|id| self.view.selected.contains(id));
        if all_selected {
            for id in &ids {
                self.view.selected.remove(id);
            }
        } else {
            self.view.selected.extend(ids);
        }
        Ok(!all_selected)
    }

    /// Deselect every row
    pub fn clear_selection(&mut self) {
        self.view.selected.clear();
    }

    /// Whether the row with `row_id` is selected
    pub fn is_selected(&self, row_id: &str) -> bool {
        self.view.selected.contains(row_id)
    }

    /// Selected row ids in sorted order
    pub fn selected_ids(&self) -> Vec<&str> {
        self.view.selected.iter().map(String::as_str).collect()
    }

    /// Selected rows in source order, including rows hidden by filters
    pub fn selected_rows(&self) -> Vec<&Value> {
        self.rows
            .iter()
            .filter(|r| self.config.row_id_of(r).is_some_and(|id| self.view.selected.contains(&id)))
            .collect()
    }

    /// CSV of the selected filtered rows, or of all filtered rows when none are selected
    pub fn export_selected_or_all(&self) -> String {
        self.export_csv(DEFAULT_DELIMITER)
    }

    /// As [`export_selected_or_all`](Self::export_selected_or_all) with a custom delimiter
    pub fn export_csv(&self, delimiter: char) -> String {
        let filtered = self.filtered_rows();
        let selected: Vec<&Value> = filtered
            .iter()
            .copied()
            .filter(|r| self.config.row_id_of(r).is_some_and(|id| self.view.selected.contains(&id)))
            .collect();
        let rows = if selected.is_empty() { filtered } else { selected };
        let columns: Vec<&ColumnDescriptor> = self.visible_columns().into_iter().filter(|c| c.has_data()).collect();
        info!(table = %self.config.id, rows = rows.len(), columns = columns.len(), "Exporting rows");
        to_csv(&columns, &rows, delimiter)
    }

    /// Register the handler of a declared row action
    pub fn on_row_action(&mut self, action: &str, handler: impl RowActionHandler + 'static) -> Result<(), CoreError> {
        if self.config.row_action(action).is_none() {
            return Err(CoreError::UnknownAction(action.to_string()));
        }
        self.row_handlers.insert(action.to_string(), Arc::new(handler));
        Ok(())
    }

    /// Register the handler of a declared bulk action
    pub fn on_bulk_action(&mut self, action: &str, handler: impl BulkActionHandler + 'static) -> Result<(), CoreError> {
        if self.config.bulk_action(action).is_none() {
            return Err(CoreError::UnknownAction(action.to_string()));
        }
        self.bulk_handlers.insert(action.to_string(), Arc::new(handler));
        Ok(())
    }

    /// Run a row action against the row with `row_id`
    pub fn invoke_row_action(&self, action: &str, row_id: &str) -> Result<(), CoreError> {
        let declared = self
            .config
            .row_action(action)
            .ok_or_else(|| CoreError::UnknownAction(action.to_string()))?;
        let row = self
            .find_row(row_id)
            .ok_or_else(|| CoreError::UnknownRow(row_id.to_string()))?;
        if declared.is_disabled_for(row) {
            warn!(table = %self.config.id, action, row = row_id, "Row action is disabled");
            return Err(CoreError::ActionDisabled {
                action: action.to_string(),
                row: row_id.to_string(),
            });
        }
        let handler = self
            .row_handlers
            .get(action)
            .ok_or_else(|| CoreError::UnknownAction(format!("{} has no handler", action)))?;
        info!(table = %self.config.id, action, row = row_id, "Invoking row action");
        handler.handle(row);
        Ok(())
    }

    /// Run a bulk action against the selected rows
    ///
    /// # Returns
    ///
    /// The number of rows handed to the handler
    pub fn invoke_bulk_action(&self, action: &str) -> Result<usize, CoreError> {
        if self.config.bulk_action(action).is_none() {
            return Err(CoreError::UnknownAction(action.to_string()));
        }
        let rows = self.selected_rows();
        if rows.is_empty() {
            return Err(CoreError::NoRowsSelected);
        }
        let handler = self
            .bulk_handlers
            .get(action)
            .ok_or_else(|| CoreError::UnknownAction(format!("{} has no handler", action)))?;
        info!(table = %self.config.id, action, rows = rows.len(), "Invoking bulk action");
        handler.handle(&rows);
        Ok(rows.len())
    }

    /// Rendering view of the current page
    pub fn snapshot(&self) -> TableView {
        TableView {
            table: self.config.id.clone(),
            columns: self.visible_columns().into_iter().map(|c| c.id.clone()).collect(),
            rows: self.page_rows().into_iter().cloned().collect(),
            page: self.page_info(),
            sort: self.view.sort.clone(),
            filters: self.view.filters.clone(),
            search: self.view.search.clone(),
            selected: self.view.selected.iter().cloned().collect(),
        }
    }

    fn refresh(&mut self) {
        self.order = derive_order(&self.rows, &self.config, &self.view);
        self.view.page_index = PageInfo::new(self.order.len(), self.view.page_index, self.view.page_size).page_index;
        debug!(table = %self.config.id, visible = self.order.len(), total = self.rows.len(), "Derived row order");
    }

    fn find_row(&self, row_id: &str) -> Option<&Value> {
        self.rows
            .iter()
            .find(|r| self.config.row_id_of(r).as_deref() == Some(row_id))
    }

    fn column_or_err(&self, column: &str) -> Result<&ColumnDescriptor, CoreError> {
        self.config
            .column(column)
            .ok_or_else(|| CoreError::UnknownColumn(column.to_string()))
    }

    fn ensure_sortable(&self, column: &str) -> Result<(), CoreError> {
        if !self.column_or_err(column)?.sortable {
            return Err(CoreError::ColumnNotCapable {
                column: column.to_string(),
                capability: "sortable",
            });
        }
        Ok(())
    }

    fn ensure_selection(&self) -> Result<(), CoreError> {
        if !self.config.features.row_selection {
            return Err(CoreError::FeatureDisabled("row_selection".to_string()));
        }
        Ok(())
    }
}
