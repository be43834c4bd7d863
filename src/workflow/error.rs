//! Workflow errors.

use thiserror::Error;

use crate::client::ServiceError;

/// Errors raised by workflow operations.
///
/// Any of these leaves the session as it was before the failing call, so the
/// same action can be retried.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Unsupported file type: {name} ({mime}); expected PNG, JPEG or PDF")]
    UnsupportedType { name: String, mime: String },

    #[error("Select at least one preprocessing option")]
    NoOptionSelected,

    #[error("Upload failed: {0}")]
    Upload(#[source] ServiceError),

    #[error("{0}")]
    Service(#[from] ServiceError),

    #[error("{what}: expected {expected}, backend reported {actual}")]
    CountMismatch {
        what: &'static str,
        expected: u32,
        actual: u32,
    },

    #[error("No source selected")]
    NoSource,

    #[error("Cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },

    #[error("Preprocessing was already {0} for this source")]
    PreprocessingDecided(&'static str),

    #[error("Invalid recognition settings: {0}")]
    InvalidRecognition(String),

    #[error("Page {page} is out of range 1..={total}")]
    PageOutOfRange { page: u32, total: u32 },

    #[error("{0}")]
    NotApplicable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkflowError {
    /// Message suitable for a transient user notice.
    pub fn user_message(&self) -> String {
        match self {
            Self::Service(e) => e.user_message(),
            Self::Upload(e) => format!("Upload failed: {}", e.user_message()),
            other => other.to_string(),
        }
    }
}
