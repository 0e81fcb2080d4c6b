//! Multi-step form sessions.
//!
//! A [`FormDefinition`] names the steps and the schema of the assembled
//! record; a [`FormSession`] walks a user through it.

mod definition;
mod events;
mod session;
mod submit;

pub use definition::{parse_form_definition, FormDefinition, FormStep, FORM_VERSION};
pub use events::{FormEvent, RecordedEvent};
pub use session::{FormSession, FormSnapshot, FormState, SessionId, StepStatus};
pub use submit::{SubmitError, SubmitHandler};
