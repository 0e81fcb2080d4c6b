use clap::{ArgAction, Args};
use formgrid_core::table::{parse_table_config, SortKey, TableModel};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::commands::{read_file, read_json, to_pretty_json, CommandOutput};
use crate::config::{parse_delimiter, CliConfig};
use crate::error::{CliError, CliResult};

#[derive(Args, Debug)]
pub struct TableArgs {
    /// Table configuration (YAML)
    #[arg(long)]
    pub config: PathBuf,

    /// JSON array of rows
    pub rows: PathBuf,

    /// Global search string
    #[arg(long)]
    pub search: Option<String>,

    /// Sort key `column` or `column:desc`; repeat for multi-key sorts
    #[arg(long = "sort", action = ArgAction::Append)]
    pub sort: Vec<String>,

    /// Column filter `column=value`; repeat for several columns
    #[arg(long = "filter", action = ArgAction::Append)]
    pub filter: Vec<String>,

    /// Hide a column
    #[arg(long = "hide", action = ArgAction::Append)]
    pub hide: Vec<String>,

    /// Zero-based page index
    #[arg(long)]
    pub page: Option<usize>,

    /// Rows per page (overrides FORMGRID_PAGE_SIZE)
    #[arg(long = "page-size")]
    pub page_size: Option<usize>,

    /// Select a row by id; repeat for several rows
    #[arg(long = "select", action = ArgAction::Append)]
    pub select: Vec<String>,

    /// Print CSV of the selected (or all filtered) rows instead of the page
    #[arg(long, action = ArgAction::SetTrue)]
    pub export: bool,

    /// CSV delimiter (overrides FORMGRID_CSV_DELIMITER)
    #[arg(long)]
    pub delimiter: Option<String>,
}

pub fn run(args: TableArgs, config: &CliConfig) -> CliResult<CommandOutput> {
    let table = Arc::new(parse_table_config(&read_file(&args.config)?)?);
    let rows: Vec<Value> = read_json(&args.rows)?;
    let mut model = TableModel::new(table, rows);

    let page_size = args.page_size.unwrap_or(match &model.config().initial_state {
        Some(state) => state.page_size,
        None => config.page_size,
    });
    model.set_page_size(page_size)?;

    if let Some(search) = &args.search {
        model.set_global_filter(search.clone())?;
    }
    for filter in &args.filter {
        let (column, value) = filter
            .split_once('=')
            .ok_or_else(|| CliError::InvalidArgument(format!("filter must be column=value, got '{}'", filter)))?;
        model.set_column_filter_input(column.trim(), value)?;
    }
    if !args.sort.is_empty() {
        let keys = args.sort.iter().map(|s| parse_sort_key(s)).collect::<CliResult<Vec<_>>>()?;
        model.set_sort(keys)?;
    }
    for column in &args.hide {
        model.set_column_visible(column, false)?;
    }
    for id in &args.select {
        if !model.is_selected(id) {
            model.toggle_row_selected(id)?;
        }
    }
    if let Some(page) = args.page {
        model.set_page(page);
    }

    if args.export {
        let delimiter = match &args.delimiter {
            Some(d) => parse_delimiter(d)?,
            None => config.csv_delimiter,
        };
        return Ok(CommandOutput::ok(model.export_csv(delimiter)));
    }

    let view = model.snapshot();
    info!(table = %view.table, page = view.page.page_index, rows = view.rows.len(), "Rendered page");
    Ok(CommandOutput::ok(to_pretty_json(&view)? + "\n"))
}

/// Parse `column` or `column:asc|desc`
pub fn parse_sort_key(input: &str) -> CliResult<SortKey> {
    match input.split_once(':') {
        None => Ok(SortKey::asc(input.trim())),
        Some((column, "asc")) => Ok(SortKey::asc(column.trim())),
        Some((column, "desc")) => Ok(SortKey::desc(column.trim())),
        Some((_, other)) => Err(CliError::InvalidArgument(format!(
            "sort direction must be asc or desc, got '{}'",
            other
        ))),
    }
}
