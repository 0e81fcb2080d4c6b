use chrono::{DateTime, Utc};
use formgrid_schema::{is_within, FieldError, FieldKind, FieldPath, ValidationErrors};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::definition::FormDefinition;
use super::events::{FormEvent, RecordedEvent};
use super::submit::{SubmitError, SubmitHandler};
use crate::error::CoreError;

/// Value object: Form session ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Form session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FormState {
    /// Accepting edits on the given step
    Editing {
        /// Zero-based step index
        step: usize,
    },

    /// The record has been handed to the submit handler
    Submitting,

    /// The submit handler succeeded
    Completed,

    /// The session was cancelled
    Cancelled,
}

impl FormState {
    /// Whether the session can no longer change
    pub fn is_terminal(&self) -> bool {
        matches!(self, FormState::Completed | FormState::Cancelled)
    }
}

/// Display status of one step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Not reached yet
    NotStarted,
    /// The step being edited
    Current,
    /// Passed step validation
    Completed,
    /// Holds a shown error
    Error,
}

/// Read-only view of a session for rendering
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormSnapshot {
    /// Session identifier
    pub id: SessionId,
    /// Form identifier
    pub form: String,
    /// Navigation state, flattened into the snapshot
    #[serde(flatten)]
    pub state: FormState,
    /// The partial record
    pub record: Value,
    /// Errors currently shown
    pub errors: Vec<FieldError>,
    /// Whether a submission is in flight
    pub submitting: bool,
    /// Message of the last failed submission
    pub submission_error: Option<String>,
    /// Status of every step, in order
    pub steps: Vec<StepStatus>,
    /// Completed share of the steps, from 0.0 to 1.0
    pub progress: f64,
}

/// Aggregate: runtime state of one form being filled in.
///
/// A session holds the partial record, the error map of the fields the user
/// has touched, and the step-navigation state machine
/// `Editing(step) -> Submitting -> Completed | Editing(last)`, with `Cancelled`
/// reachable from anywhere. Invalid input is never refused; it is recorded
/// as an error. Only step advancement and submission are gated.
#[derive(Debug)]
pub struct FormSession {
    id: SessionId,
    definition: Arc<FormDefinition>,
    state: FormState,
    record: Value,
    initial: Value,
    errors: BTreeMap<FieldPath, FieldError>,
    touched: BTreeSet<FieldPath>,
    completed_steps: BTreeSet<usize>,
    submission_error: Option<String>,
    events: Vec<RecordedEvent>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl FormSession {
    /// Open a session on an empty record seeded from the schema defaults
    pub fn new(definition: Arc<FormDefinition>) -> Self {
        let initial = definition.schema.defaults();
        Self::open(definition, initial, false)
    }

    /// Open a session on an existing record ("edit" mode).
    ///
    /// Declared top-level members of `record` replace the defaults; anything
    /// else in `record` is ignored.
    pub fn edit(definition: Arc<FormDefinition>, record: &Value) -> Self {
        let mut initial = definition.schema.defaults();
        if let (Value::Object(target), Value::Object(source)) = (&mut initial, record) {
            for field in &definition.schema.fields {
                if let Some(value) = source.get(&field.name) {
                    target.insert(field.name.clone(), value.clone());
                }
            }
        }
        Self::open(definition, initial, true)
    }

    fn open(definition: Arc<FormDefinition>, initial: Value, editing: bool) -> Self {
        let now = Utc::now();
        let mut session = FormSession {
            id: SessionId(Uuid::new_v4().to_string()),
            definition,
            state: FormState::Editing { step: 0 },
            record: initial.clone(),
            initial,
            errors: BTreeMap::new(),
            touched: BTreeSet::new(),
            completed_steps: BTreeSet::new(),
            submission_error: None,
            events: Vec::with_capacity(16),
            created_at: now,
            updated_at: now,
        };
        info!(session = %session.id, form = %session.definition.id, editing, "Opened form session");
        session.record_event(FormEvent::Opened { editing });
        session
    }

    /// Session identifier
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// The form being filled in
    pub fn definition(&self) -> &FormDefinition {
        &self.definition
    }

    /// Current navigation state
    pub fn state(&self) -> FormState {
        self.state
    }

    /// Current step index while editing
    pub fn current_step(&self) -> Option<usize> {
        match self.state {
            FormState::Editing { step } => Some(step),
            _ => None,
        }
    }

    /// Whether a submission is in flight
    pub fn is_submitting(&self) -> bool {
        self.state == FormState::Submitting
    }

    /// The partial record; `Null` once the session is completed or cancelled
    pub fn record(&self) -> &Value {
        &self.record
    }

    /// Current value at `path`, if any
    pub fn value(&self, path: &str) -> Option<&Value> {
        FieldPath::parse(path).ok()?.resolve(&self.record)
    }

    /// Errors currently shown, ordered by path
    pub fn errors(&self) -> impl Iterator<Item = &FieldError> {
        self.errors.values()
    }

    /// Error shown for exactly `path`
    pub fn error(&self, path: &str) -> Option<&FieldError> {
        let path = FieldPath::parse(path).ok()?;
        self.errors.get(&path)
    }

    /// Whether any error is shown
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Message of the last failed submission, cleared on the next attempt
    pub fn submission_error(&self) -> Option<&str> {
        self.submission_error.as_deref()
    }

    /// When the session was opened
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// When the session last changed
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Write `value` at `path` and re-validate the step containing it.
    ///
    /// Never rejects invalid data; the error map is updated for touched
    /// fields instead. Fails only when the session is not editing or the
    /// path is not declared by the schema.
    pub fn set_field(&mut self, path: &str, value: Value) -> Result<(), CoreError> {
        self.ensure_editing()?;
        let path = self.declared_path(path)?;
        path.set(&mut self.record, value)
            .map_err(|e| CoreError::InvalidPath(e.to_string()))?;

        debug!(session = %self.id, path = %path, "Field changed");
        self.touched.insert(path.clone());
        self.revalidate_around(&path);
        self.record_event(FormEvent::FieldChanged { path: path.to_string() });
        Ok(())
    }

    /// Validate the current step and move to the next one.
    ///
    /// Errors of required step fields block with `StepValidationFailed` and
    /// leave the step unchanged. On the last step the call validates and stays.
    ///
    /// # Returns
    ///
    /// The step index after the call
    pub fn next_step(&mut self) -> Result<usize, CoreError> {
        let step = self.ensure_editing()?;
        let fields = self.definition.steps[step].fields.clone();

        self.touched.extend(fields.iter().cloned());
        let errors = self.validate_paths(&fields);
        self.replace_errors_under(&fields, &errors);

        let blocking: Vec<FieldError> = errors
            .iter()
            .filter(|e| self.is_blocking(&fields, e))
            .cloned()
            .collect();

        if !blocking.is_empty() {
            warn!(session = %self.id, step, errors = blocking.len(), "Step advance blocked");
            self.completed_steps.remove(&step);
            self.record_event(FormEvent::StepBlocked { step, errors: blocking.len() });
            return Err(CoreError::StepValidationFailed {
                step,
                errors: ValidationErrors::from(blocking),
            });
        }

        self.completed_steps.insert(step);
        if step == self.definition.last_step() {
            debug!(session = %self.id, step, "Last step is valid; submit to finish");
            return Ok(step);
        }

        let next = step + 1;
        self.state = FormState::Editing { step: next };
        info!(session = %self.id, from = step, to = next, "Advanced to next step");
        self.record_event(FormEvent::StepAdvanced { from: step, to: next });
        Ok(next)
    }

    /// Move back one step without validating. A no-op on the first step.
    pub fn previous_step(&mut self) -> Result<usize, CoreError> {
        let step = self.ensure_editing()?;
        if step == 0 {
            return Ok(0);
        }
        let previous = step - 1;
        self.state = FormState::Editing { step: previous };
        info!(session = %self.id, from = step, to = previous, "Returned to previous step");
        self.record_event(FormEvent::StepReturned { from: step, to: previous });
        Ok(previous)
    }

    /// Validate the whole record and enter `Submitting`.
    ///
    /// Only legal on the last step. On success returns the normalized record
    /// for the submit handler; every mutation is rejected until
    /// [`complete_submit`](Self::complete_submit) is called.
    pub fn begin_submit(&mut self) -> Result<Value, CoreError> {
        let step = self.ensure_editing()?;
        let last = self.definition.last_step();
        if step != last {
            return Err(CoreError::NotOnLastStep { step, last });
        }

        match self.definition.schema.validate(&self.record) {
            Ok(normalized) => {
                self.state = FormState::Submitting;
                self.submission_error = None;
                info!(session = %self.id, "Submitting record");
                self.record_event(FormEvent::SubmissionStarted);
                Ok(normalized)
            }
            Err(errors) => {
                warn!(session = %self.id, errors = errors.len(), "Submit blocked by invalid record");
                self.errors.clear();
                for error in errors.iter() {
                    if let Ok(path) = FieldPath::parse(&error.path) {
                        self.touched.insert(path.clone());
                        self.errors.entry(path).or_insert_with(|| error.clone());
                    }
                }
                self.update_timestamp();
                Err(CoreError::ValidationFailed(errors))
            }
        }
    }

    /// Apply the outcome of the submit handler.
    ///
    /// Success completes the session and discards the record. Failure returns
    /// to the last step with the record untouched and the error surfaced.
    /// A completion arriving after `cancel` is discarded.
    pub fn complete_submit(&mut self, outcome: Result<(), SubmitError>) -> Result<FormState, CoreError> {
        match self.state {
            FormState::Submitting => {}
            FormState::Cancelled => {
                info!(session = %self.id, "Discarding submit completion for cancelled session");
                self.record_event(FormEvent::CompletionDiscarded);
                return Err(CoreError::SessionClosed);
            }
            other => {
                return Err(CoreError::InvalidTransition(format!(
                    "Cannot complete a submission in state: {:?}",
                    other
                )))
            }
        }

        match outcome {
            Ok(()) => {
                self.state = FormState::Completed;
                self.discard();
                info!(session = %self.id, "Form submitted");
                self.record_event(FormEvent::SubmissionSucceeded);
                Ok(self.state)
            }
            Err(err) => {
                let message = err.to_string();
                self.state = FormState::Editing {
                    step: self.definition.last_step(),
                };
                self.submission_error = Some(message.clone());
                warn!(session = %self.id, error = %message, "Submission failed");
                self.record_event(FormEvent::SubmissionFailed { message: message.clone() });
                Err(CoreError::SubmissionFailed(message))
            }
        }
    }

    /// Validate, hand the record to `handler` and apply its outcome
    pub async fn submit(&mut self, handler: &dyn SubmitHandler) -> Result<(), CoreError> {
        let record = self.begin_submit()?;
        let outcome = handler.submit(&record).await;
        self.complete_submit(outcome).map(|_| ())
    }

    /// Cancel the session and discard the partial record.
    ///
    /// Never fails. A submission already dispatched is not aborted; its
    /// completion will be discarded.
    pub fn cancel(&mut self) {
        if self.state == FormState::Cancelled {
            return;
        }
        self.state = FormState::Cancelled;
        self.discard();
        info!(session = %self.id, "Form session cancelled");
        self.record_event(FormEvent::Cancelled);
    }

    /// Append a fresh entry to the array field at `path`.
    ///
    /// # Returns
    ///
    /// The index of the new entry
    pub fn add_entry(&mut self, path: &str) -> Result<usize, CoreError> {
        self.ensure_editing()?;
        let path = self.declared_path(path)?;
        let descriptor = self
            .definition
            .schema
            .descriptor(&path)
            .filter(|d| d.kind == FieldKind::Array)
            .ok_or_else(|| CoreError::NotAnArray(path.to_string()))?;
        let max = descriptor.constraints.max_length;
        let entry = self
            .definition
            .schema
            .default_for_path(&path)
            .unwrap_or(Value::Null);

        let len = match path.resolve(&self.record) {
            None | Some(Value::Null) => {
                path.set(&mut self.record, Value::Array(Vec::new()))
                    .map_err(|e| CoreError::InvalidPath(e.to_string()))?;
                0
            }
            Some(Value::Array(items)) => items.len(),
            Some(_) => return Err(CoreError::NotAnArray(path.to_string())),
        };
        if let Some(max) = max {
            if len >= max {
                return Err(CoreError::EntryLimitReached {
                    path: path.to_string(),
                    max,
                });
            }
        }

        path.index(len)
            .set(&mut self.record, entry)
            .map_err(|e| CoreError::InvalidPath(e.to_string()))?;
        debug!(session = %self.id, path = %path, index = len, "Entry added");
        self.revalidate_around(&path);
        self.record_event(FormEvent::EntryAdded {
            path: path.to_string(),
            index: len,
        });
        Ok(len)
    }

    /// Remove entry `index` from the array field at `path`.
    ///
    /// Error-map keys of later entries shift down by one; errors inside the
    /// removed entry disappear.
    pub fn remove_entry(&mut self, path: &str, index: usize) -> Result<Value, CoreError> {
        self.ensure_editing()?;
        let path = self.declared_path(path)?;
        let len = match path.resolve(&self.record) {
            Some(Value::Array(items)) => items.len(),
            _ => return Err(CoreError::NotAnArray(path.to_string())),
        };
        if index >= len {
            return Err(CoreError::IndexOutOfRange {
                path: path.to_string(),
                index,
                len,
            });
        }

        let removed = path
            .index(index)
            .remove(&mut self.record)
            .ok_or_else(|| CoreError::InvalidPath(path.index(index).to_string()))?;

        let errors = std::mem::take(&mut self.errors);
        self.errors = errors
            .into_iter()
            .filter_map(|(key, mut error)| {
                let shifted = key.shift_after_removal(&path, index)?;
                error.path = shifted.to_string();
                Some((shifted, error))
            })
            .collect();
        let touched = std::mem::take(&mut self.touched);
        self.touched = touched
            .into_iter()
            .filter_map(|key| key.shift_after_removal(&path, index))
            .collect();

        debug!(session = %self.id, path = %path, index, "Entry removed");
        self.revalidate_around(&path);
        self.record_event(FormEvent::EntryRemoved {
            path: path.to_string(),
            index,
        });
        Ok(removed)
    }

    /// Restore the initial record and return to the first step
    pub fn reset(&mut self) -> Result<(), CoreError> {
        self.ensure_editing()?;
        self.record = self.initial.clone();
        self.errors.clear();
        self.touched.clear();
        self.completed_steps.clear();
        self.submission_error = None;
        self.state = FormState::Editing { step: 0 };
        info!(session = %self.id, "Form session reset");
        self.record_event(FormEvent::Reset);
        Ok(())
    }

    /// Display status of step `index`
    pub fn step_status(&self, index: usize) -> Option<StepStatus> {
        let step = self.definition.steps.get(index)?;
        if self.state == FormState::Completed {
            return Some(StepStatus::Completed);
        }
        let has_errors = self.errors.keys().any(|p| step.field_for(p).is_some());
        let current = self.current_step() == Some(index);
        let completed = self.completed_steps.contains(&index);

        Some(if has_errors && (current || completed) {
            StepStatus::Error
        } else if current {
            StepStatus::Current
        } else if completed {
            StepStatus::Completed
        } else {
            StepStatus::NotStarted
        })
    }

    /// Fraction of steps completed, `0.0..=1.0`
    pub fn progress(&self) -> f64 {
        if self.state == FormState::Completed {
            return 1.0;
        }
        self.completed_steps.len() as f64 / self.definition.step_count() as f64
    }

    /// Read-only view for rendering
    pub fn snapshot(&self) -> FormSnapshot {
        FormSnapshot {
            id: self.id.clone(),
            form: self.definition.id.clone(),
            state: self.state,
            record: self.record.clone(),
            errors: self.errors.values().cloned().collect(),
            submitting: self.is_submitting(),
            submission_error: self.submission_error.clone(),
            steps: (0..self.definition.step_count())
                .filter_map(|i| self.step_status(i))
                .collect(),
            progress: self.progress(),
        }
    }

    /// Drain the events recorded since the last call
    pub fn take_events(&mut self) -> Vec<RecordedEvent> {
        std::mem::take(&mut self.events)
    }

    fn ensure_editing(&self) -> Result<usize, CoreError> {
        match self.state {
            FormState::Editing { step } => Ok(step),
            FormState::Submitting => Err(CoreError::SubmissionInProgress),
            FormState::Completed | FormState::Cancelled => Err(CoreError::SessionClosed),
        }
    }

    fn declared_path(&self, path: &str) -> Result<FieldPath, CoreError> {
        let parsed = FieldPath::parse(path).map_err(|e| CoreError::InvalidPath(e.to_string()))?;
        if self.definition.schema.descriptor(&parsed).is_none() {
            return Err(CoreError::InvalidPath(format!("'{}' is not a declared field", path)));
        }
        Ok(parsed)
    }

    fn validate_paths(&self, paths: &[FieldPath]) -> ValidationErrors {
        match self.definition.schema.validate_paths(&self.record, paths) {
            Ok(()) => ValidationErrors::new(),
            Err(errors) => errors,
        }
    }

    /// Re-validate the step fields around `path`, updating errors of touched fields only
    fn revalidate_around(&mut self, path: &FieldPath) {
        let fields = match self.definition.step_of(path) {
            Some(step) => self.definition.steps[step].fields.clone(),
            None => vec![path.clone()],
        };
        let errors = self.validate_paths(&fields);
        let visible: Vec<FieldError> = errors
            .into_iter()
            .filter(|e| self.is_touched(&e.path))
            .collect();
        self.replace_errors_under(&fields, &ValidationErrors::from(visible));
        self.update_timestamp();
    }

    fn is_touched(&self, error_path: &str) -> bool {
        self.touched.iter().any(|t| {
            let touched = t.to_string();
            is_within(error_path, &touched) || is_within(&touched, error_path)
        })
    }

    fn replace_errors_under(&mut self, fields: &[FieldPath], errors: &ValidationErrors) {
        let scopes: Vec<String> = fields.iter().map(ToString::to_string).collect();
        self.errors.retain(|key, _| {
            let key = key.to_string();
            !scopes.iter().any(|scope| is_within(&key, scope))
        });
        for error in errors.iter() {
            if let Ok(path) = FieldPath::parse(&error.path) {
                self.errors.entry(path).or_insert_with(|| error.clone());
            }
        }
    }

    /// An error blocks a step when the step field it falls under is required
    fn is_blocking(&self, fields: &[FieldPath], error: &FieldError) -> bool {
        fields.iter().any(|field| {
            is_within(&error.path, &field.to_string())
                && self
                    .definition
                    .schema
                    .descriptor(field)
                    .map_or(false, |d| d.required)
        })
    }

    fn discard(&mut self) {
        self.record = Value::Null;
        self.errors.clear();
        self.touched.clear();
        self.update_timestamp();
    }

    #[inline]
    fn update_timestamp(&mut self) {
        self.updated_at = Utc::now();
    }

    fn record_event(&mut self, event: FormEvent) {
        let timestamp = Utc::now();
        self.updated_at = timestamp;
        self.events.push(RecordedEvent {
            session_id: self.id.clone(),
            event,
            timestamp,
        });
    }
}
