//! Pure derivations of the visible row sequence.
//!
//! Every function takes the source rows plus a sequence of row indices and
//! returns a new sequence of indices; source rows are never touched. The
//! model chains them as `filter -> search -> sort -> paginate`.

use chrono::{DateTime, NaiveDate};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use super::column::{cell_text, ColumnDescriptor};
use super::config::TableConfig;
use super::view::{ColumnFilter, PageInfo, SortDirection, SortKey, ViewState};

/// Keep rows where any filterable data column contains `search`, case-insensitively.
///
/// An empty search keeps every row. Whitespace is part of the search string.
pub fn apply_global_filter(rows: &[Value], indices: &[usize], columns: &[ColumnDescriptor], search: &str) -> Vec<usize> {
    let needle = search.to_lowercase();
    if needle.is_empty() {
        return indices.to_vec();
    }
    let searchable: Vec<&ColumnDescriptor> = columns.iter().filter(|c| c.filterable && c.has_data()).collect();
    indices
        .iter()
        .copied()
        .filter(|&i| {
            searchable
                .iter()
                .any(|c| c.text(&rows[i]).to_lowercase().contains(&needle))
        })
        .collect()
}

/// Keep rows satisfying every active column filter.
///
/// Filters on unknown columns are neutral.
pub fn apply_column_filters(
    rows: &[Value],
    indices: &[usize],
    columns: &[ColumnDescriptor],
    filters: &BTreeMap<String, ColumnFilter>,
) -> Vec<usize> {
    let active: Vec<(&ColumnDescriptor, &ColumnFilter)> = filters
        .iter()
        .filter(|(_, f)| f.is_active())
        .filter_map(|(id, f)| columns.iter().find(|c| &c.id == id).map(|c| (c, f)))
        .collect();
    if active.is_empty() {
        return indices.to_vec();
    }
    indices
        .iter()
        .copied()
        .filter(|&i| active.iter().all(|(c, f)| matches_filter(&c.value(&rows[i]), f)))
        .collect()
}

/// Whether a cell value passes `filter`
pub fn matches_filter(cell: &Value, filter: &ColumnFilter) -> bool {
    match filter {
        ColumnFilter::Equals { value } => cell_text(cell) == cell_text(value),
        ColumnFilter::Contains { value } => cell_text(cell).to_lowercase().contains(&value.to_lowercase()),
        ColumnFilter::OneOf { values } => {
            let text = cell_text(cell);
            values.iter().any(|v| *v == text)
        }
        ColumnFilter::Range { min, max } => match as_number(cell) {
            Some(n) => min.map_or(true, |m| n >= m) && max.map_or(true, |m| n <= m),
            None => false,
        },
        ColumnFilter::DateRange { from, to } => match as_date(cell) {
            Some(d) => {
                let from = from.as_deref().and_then(parse_date);
                let to = to.as_deref().and_then(parse_date);
                from.map_or(true, |f| d >= f) && to.map_or(true, |t| d <= t)
            }
            None => false,
        },
    }
}

/// Stable multi-key sort; empty cells sort last in either direction.
///
/// Keys naming unknown columns are skipped. Ties fall back to the incoming order.
pub fn apply_sort(rows: &[Value], indices: &[usize], columns: &[ColumnDescriptor], sort: &[SortKey]) -> Vec<usize> {
    let keys: Vec<(&ColumnDescriptor, SortDirection)> = sort
        .iter()
        .filter_map(|k| columns.iter().find(|c| c.id == k.column).map(|c| (c, k.direction)))
        .collect();
    let mut sorted = indices.to_vec();
    if keys.is_empty() {
        return sorted;
    }

    // Cell values are computed once per row, not per comparison
    let cells: BTreeMap<usize, Vec<Value>> = indices
        .iter()
        .map(|&i| (i, keys.iter().map(|(c, _)| c.value(&rows[i])).collect()))
        .collect();

    sorted.sort_by(|a, b| {
        let (left, right) = (&cells[a], &cells[b]);
        for (k, (_, direction)) in keys.iter().enumerate() {
            let ordering = compare_cells(&left[k], &right[k], *direction);
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
    sorted
}

/// Slice out the requested page, clamping the index to the last page
pub fn apply_pagination(indices: &[usize], page_index: usize, page_size: usize) -> (Vec<usize>, PageInfo) {
    let info = PageInfo::new(indices.len(), page_index, page_size);
    (indices[info.range()].to_vec(), info)
}

/// Full filtered and sorted order of `rows` under `view`, before pagination
pub fn derive_order(rows: &[Value], config: &TableConfig, view: &ViewState) -> Vec<usize> {
    let all: Vec<usize> = (0..rows.len()).collect();
    let filtered = if config.features.filtering {
        apply_column_filters(rows, &all, &config.columns, &view.filters)
    } else {
        all
    };
    let searched = if config.features.global_search {
        apply_global_filter(rows, &filtered, &config.columns, &view.search)
    } else {
        filtered
    };
    if config.features.sorting {
        apply_sort(rows, &searched, &config.columns, &view.sort)
    } else {
        searched
    }
}

fn compare_cells(a: &Value, b: &Value, direction: SortDirection) -> Ordering {
    match (is_empty(a), is_empty(b)) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            let ordering = compare_values(a, b);
            match direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        }
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => {
            let (x, y) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::String(x), Value::String(y)) => x.to_lowercase().cmp(&y.to_lowercase()).then_with(|| x.cmp(y)),
        _ => type_rank(a)
            .cmp(&type_rank(b))
            .then_with(|| cell_text(a).cmp(&cell_text(b))),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Bool(_) => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Array(_) => 3,
        Value::Object(_) => 4,
        Value::Null => 5,
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_date(value: &Value) -> Option<NaiveDate> {
    value.as_str().and_then(parse_date)
}

fn parse_date(input: &str) -> Option<NaiveDate> {
    let input = input.trim();
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(input).ok().map(|d| d.date_naive()))
}
