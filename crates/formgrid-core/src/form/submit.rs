use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Failure reported by a submit handler
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// Transport failure; the record may or may not have been received
    #[error("Network error: {0}")]
    Network(String),

    /// The receiver refused the record
    #[error("Submission rejected: {0}")]
    Rejected(String),

    /// Any other failure
    #[error("{0}")]
    Other(String),
}

/// Caller-supplied collaborator that receives the normalized record.
///
/// This is the only asynchronous boundary of a form session. The handler is
/// responsible for idempotency: cancelling a session cannot abort a
/// submission that was already dispatched.
#[async_trait]
pub trait SubmitHandler: Send + Sync {
    /// Deliver the validated, normalized record
    async fn submit(&self, record: &Value) -> Result<(), SubmitError>;
}
