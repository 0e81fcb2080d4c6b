//! Declarative table configuration and the derived table view.

/// Pure derivations of the visible row order
pub mod derive;

mod column;
mod config;
mod export;
mod model;
mod view;

pub use column::{cell_text, ColumnDescriptor, DeriveFn, FilterMode};
pub use config::{parse_table_config, BulkAction, RowAction, TableConfig, TableFeatures, TABLE_VERSION};
pub use derive::{apply_column_filters, apply_global_filter, apply_pagination, apply_sort, derive_order};
pub use export::{to_csv, DEFAULT_DELIMITER};
pub use model::{BulkActionHandler, RowActionHandler, TableModel, TableView};
pub use view::{ColumnFilter, PageInfo, SortDirection, SortKey, ViewState, DEFAULT_PAGE_SIZE};
