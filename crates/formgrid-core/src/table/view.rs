use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Default number of rows per page
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Direction of one sort key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    /// Smallest first
    #[default]
    Asc,
    /// Largest first
    Desc,
}

/// One key of a multi-key sort
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    /// Column id
    pub column: String,
    /// Sort direction, ascending when omitted
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortKey {
    /// Ascending key on `column`
    pub fn asc(column: impl Into<String>) -> Self {
        SortKey {
            column: column.into(),
            direction: SortDirection::Asc,
        }
    }

    /// Descending key on `column`
    pub fn desc(column: impl Into<String>) -> Self {
        SortKey {
            column: column.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Active filter value of one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ColumnFilter {
    /// Stringified cell equals the value
    Equals {
        /// Expected value
        value: Value,
    },

    /// Case-insensitive substring
    Contains {
        /// Substring to look for
        value: String,
    },

    /// Numeric range, bounds inclusive
    Range {
        /// Lower bound
        #[serde(default)]
        min: Option<f64>,
        /// Upper bound
        #[serde(default)]
        max: Option<f64>,
    },

    /// Date range, bounds inclusive, `YYYY-MM-DD` or RFC 3339
    DateRange {
        /// First day included
        #[serde(default)]
        from: Option<String>,
        /// Last day or instant included
        #[serde(default)]
        to: Option<String>,
    },

    /// Stringified cell is one of the values
    OneOf {
        /// Accepted values
        values: Vec<String>,
    },
}

impl ColumnFilter {
    /// An inactive filter keeps every row
    pub fn is_active(&self) -> bool {
        match self {
            ColumnFilter::Equals { value } => !matches!(value, Value::Null) && value.as_str() != Some(""),
            ColumnFilter::Contains { value } => !value.is_empty(),
            ColumnFilter::Range { min, max } => min.is_some() || max.is_some(),
            ColumnFilter::DateRange { from, to } => from.is_some() || to.is_some(),
            ColumnFilter::OneOf { values } => !values.is_empty(),
        }
    }
}

/// Presentation state layered over the source rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    /// Sort keys, primary first
    #[serde(default)]
    pub sort: Vec<SortKey>,

    /// Active filters per column id
    #[serde(default)]
    pub filters: BTreeMap<String, ColumnFilter>,

    /// Global search string
    #[serde(default)]
    pub search: String,

    /// Zero-based page index
    #[serde(default)]
    pub page_index: usize,

    /// Rows per page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Selected row ids
    #[serde(default)]
    pub selected: BTreeSet<String>,

    /// Hidden column ids
    #[serde(default)]
    pub hidden: BTreeSet<String>,
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl Default for ViewState {
    fn default() -> Self {
        ViewState {
            sort: Vec::new(),
            filters: BTreeMap::new(),
            search: String::new(),
            page_index: 0,
            page_size: DEFAULT_PAGE_SIZE,
            selected: BTreeSet::new(),
            hidden: BTreeSet::new(),
        }
    }
}

/// Pagination metadata of the derived view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    /// Rows after filtering
    pub total: usize,
    /// Effective (clamped) page index
    pub page_index: usize,
    /// Rows per page
    pub page_size: usize,
    /// Number of pages, 0 when there are no rows
    pub page_count: usize,
    /// A later page exists
    pub has_next: bool,
    /// An earlier page exists
    pub has_prev: bool,
}

impl PageInfo {
    /// Compute metadata for `total` rows, clamping `page_index` to the last page
    pub fn new(total: usize, page_index: usize, page_size: usize) -> Self {
        let page_size = page_size.max(1);
        let page_count = total.div_ceil(page_size);
        let page_index = page_index.min(page_count.saturating_sub(1));
        PageInfo {
            total,
            page_index,
            page_size,
            page_count,
            has_next: page_index + 1 < page_count,
            has_prev: page_index > 0,
        }
    }

    /// Row range of the page within the filtered sequence
    pub fn range(&self) -> std::ops::Range<usize> {
        let start = (self.page_index * self.page_size).min(self.total);
        let end = (start + self.page_size).min(self.total);
        start..end
    }
}
