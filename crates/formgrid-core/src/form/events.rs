use chrono::{DateTime, Utc};
use serde::Serialize;

use super::session::SessionId;

/// Something that happened to a form session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FormEvent {
    /// Session opened, empty or seeded with an existing record
    Opened {
        /// Whether the session edits an existing record
        editing: bool,
    },

    /// A field value was written
    FieldChanged {
        /// Path written
        path: String,
    },

    /// `next_step` moved forward
    StepAdvanced {
        /// Step left
        from: usize,
        /// Step entered
        to: usize,
    },

    /// `next_step` was blocked by invalid required fields
    StepBlocked {
        /// Step that stayed current
        step: usize,
        /// Number of blocking errors
        errors: usize,
    },

    /// `previous_step` moved back
    StepReturned {
        /// Step left
        from: usize,
        /// Step entered
        to: usize,
    },

    /// An entry was appended to an array field
    EntryAdded {
        /// Array path
        path: String,
        /// Index of the new entry
        index: usize,
    },

    /// An entry was removed from an array field
    EntryRemoved {
        /// Array path
        path: String,
        /// Index of the removed entry
        index: usize,
    },

    /// The assembled record was handed to the submit handler
    SubmissionStarted,

    /// The submit handler succeeded
    SubmissionSucceeded,

    /// The submit handler failed
    SubmissionFailed {
        /// Handler error message
        message: String,
    },

    /// A completion arrived after the session was cancelled
    CompletionDiscarded,

    /// The record was restored to its initial value
    Reset,

    /// The session was cancelled
    Cancelled,
}

impl FormEvent {
    /// Returns the type of the event as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            FormEvent::Opened { .. } => "form_session.opened",
            FormEvent::FieldChanged { .. } => "form_session.field_changed",
            FormEvent::StepAdvanced { .. } => "form_session.step_advanced",
            FormEvent::StepBlocked { .. } => "form_session.step_blocked",
            FormEvent::StepReturned { .. } => "form_session.step_returned",
            FormEvent::EntryAdded { .. } => "form_session.entry_added",
            FormEvent::EntryRemoved { .. } => "form_session.entry_removed",
            FormEvent::SubmissionStarted => "form_session.submission_started",
            FormEvent::SubmissionSucceeded => "form_session.submission_succeeded",
            FormEvent::SubmissionFailed { .. } => "form_session.submission_failed",
            FormEvent::CompletionDiscarded => "form_session.completion_discarded",
            FormEvent::Reset => "form_session.reset",
            FormEvent::Cancelled => "form_session.cancelled",
        }
    }
}

/// An event together with the session it belongs to and when it happened
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordedEvent {
    /// The session the event belongs to
    pub session_id: SessionId,

    /// What happened
    #[serde(flatten)]
    pub event: FormEvent,

    /// When it happened
    pub timestamp: DateTime<Utc>,
}
