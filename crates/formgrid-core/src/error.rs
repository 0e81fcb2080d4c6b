use formgrid_schema::{SchemaError, ValidationErrors};
use thiserror::Error;

/// Core error type for form sessions and table models
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Required fields of the current step are missing or invalid
    #[error("Step {step} has invalid fields: {}", .errors.summary())]
    StepValidationFailed {
        /// Zero-based step index
        step: usize,
        /// Errors of the required fields that blocked the step
        errors: ValidationErrors,
    },

    /// The assembled record failed validation on submit
    #[error("Record is invalid: {}", .0.summary())]
    ValidationFailed(ValidationErrors),

    /// A submission is in flight; mutations are rejected until it completes
    #[error("A submission is already in progress")]
    SubmissionInProgress,

    /// The session has completed or was cancelled
    #[error("Form session is closed")]
    SessionClosed,

    /// Submit was requested before the last step
    #[error("Cannot submit from step {step}; the last step is {last}")]
    NotOnLastStep {
        /// Current step index
        step: usize,
        /// Index of the last step
        last: usize,
    },

    /// The operation is not valid in the current state
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// The submit handler reported a failure
    #[error("Submission failed: {0}")]
    SubmissionFailed(String),

    /// A form or table declaration is malformed
    #[error("Invalid definition: {0}")]
    InvalidDefinition(String),

    /// A path could not be parsed or does not address a declared field
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// The path does not address an array field
    #[error("Not an array field: {0}")]
    NotAnArray(String),

    /// Entry index outside the array
    #[error("Index {index} is out of range for '{path}' with {len} entries")]
    IndexOutOfRange {
        /// Array path
        path: String,
        /// Requested index
        index: usize,
        /// Current number of entries
        len: usize,
    },

    /// The array already holds its maximum number of entries
    #[error("'{path}' already has the maximum of {max} entries")]
    EntryLimitReached {
        /// Array path
        path: String,
        /// Declared maximum
        max: usize,
    },

    /// No column with this id
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    /// The table feature is switched off in the configuration
    #[error("Table feature disabled: {0}")]
    FeatureDisabled(String),

    /// The column does not allow this operation
    #[error("Column '{column}' is not {capability}")]
    ColumnNotCapable {
        /// Column id
        column: String,
        /// Missing capability (`sortable`, `filterable`, `hideable`)
        capability: &'static str,
    },

    /// No row or bulk action with this id
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// The action's disabled predicate holds for the row
    #[error("Action '{action}' is disabled for row {row}")]
    ActionDisabled {
        /// Action id
        action: String,
        /// Row id
        row: String,
    },

    /// A bulk action was invoked with an empty selection
    #[error("No rows selected")]
    NoRowsSelected,

    /// No row with this id
    #[error("Unknown row: {0}")]
    UnknownRow(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl CoreError {
    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            CoreError::StepValidationFailed { .. } => "ERR_FORM_STEP_VALIDATION_FAILED",
            CoreError::ValidationFailed(_) => "ERR_FORM_VALIDATION_FAILED",
            CoreError::SubmissionInProgress => "ERR_FORM_SUBMISSION_IN_PROGRESS",
            CoreError::SessionClosed => "ERR_FORM_SESSION_CLOSED",
            CoreError::NotOnLastStep { .. } => "ERR_FORM_NOT_ON_LAST_STEP",
            CoreError::InvalidTransition(_) => "ERR_FORM_INVALID_TRANSITION",
            CoreError::SubmissionFailed(_) => "ERR_FORM_SUBMISSION_FAILED",
            CoreError::InvalidDefinition(_) => "ERR_FORM_INVALID_DEFINITION",
            CoreError::InvalidPath(_) => "ERR_FORM_INVALID_PATH",
            CoreError::NotAnArray(_) => "ERR_FORM_NOT_AN_ARRAY",
            CoreError::IndexOutOfRange { .. } => "ERR_FORM_INDEX_OUT_OF_RANGE",
            CoreError::EntryLimitReached { .. } => "ERR_FORM_ENTRY_LIMIT_REACHED",
            CoreError::UnknownColumn(_) => "ERR_TABLE_UNKNOWN_COLUMN",
            CoreError::FeatureDisabled(_) => "ERR_TABLE_FEATURE_DISABLED",
            CoreError::ColumnNotCapable { .. } => "ERR_TABLE_COLUMN_NOT_CAPABLE",
            CoreError::UnknownAction(_) => "ERR_TABLE_UNKNOWN_ACTION",
            CoreError::ActionDisabled { .. } => "ERR_TABLE_ACTION_DISABLED",
            CoreError::NoRowsSelected => "ERR_TABLE_NO_ROWS_SELECTED",
            CoreError::UnknownRow(_) => "ERR_TABLE_UNKNOWN_ROW",
            CoreError::SerializationError(_) => "ERR_CORE_SERIALIZATION",
        }
    }
}

impl From<SchemaError> for CoreError {
    fn from(err: SchemaError) -> Self {
        CoreError::InvalidDefinition(err.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for CoreError {
    fn from(err: serde_yaml::Error) -> Self {
        CoreError::SerializationError(err.to_string())
    }
}
