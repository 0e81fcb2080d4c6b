//!
//! Formgrid Core - form sessions and table models
//!
//! This crate builds the two stateful pieces on top of `formgrid-schema`:
//! the multi-step form controller and the declarative table model. Neither
//! performs I/O; the only asynchronous boundary is the caller's
//! [`SubmitHandler`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Error types
pub mod error;

/// Multi-step form controller
pub mod form;

/// Declarative table configuration model
pub mod table;

pub use error::CoreError;
pub use form::{
    parse_form_definition, FormDefinition, FormEvent, FormSession, FormSnapshot, FormState, FormStep, RecordedEvent,
    SessionId, StepStatus, SubmitError, SubmitHandler,
};
pub use table::{
    parse_table_config, ColumnDescriptor, ColumnFilter, PageInfo, SortDirection, SortKey, TableConfig, TableModel,
    TableView, ViewState,
};
