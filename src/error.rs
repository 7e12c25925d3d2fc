//! Error types for exam operations.

use thiserror::Error;

use crate::model::Step;

/// Errors that can occur while running an exam session.
///
/// Every error is scoped to the action that produced it: the session is
/// left exactly as it was before the action and can always be resumed.
#[derive(Error, Debug)]
pub enum ExamError {
    /// The server answered with a non-success status
    #[error("Server did not complete the request (status {status}): {message}")]
    Upstream {
        /// Status value reported by the server
        status: i32,
        /// Error text reported by the server
        message: String,
    },

    /// The request never produced a response
    #[error("Request failed: {0}")]
    Transport(String),

    /// User input was rejected
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Internal sequencing is broken (bad index, missing dimensions)
    #[error("Invariant violated: {0}")]
    Invariant(String),

    /// JSON parsing or serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Input that was rejected before any state changed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Body part must be filled in")]
    EmptyBodyPart,

    #[error("Structure name must be filled in")]
    EmptyAnnotationName,

    #[error("Action requires the {expected:?} step but the current step is {actual:?}")]
    WrongStep { expected: Step, actual: Step },

    #[error("Cannot navigate: {0}")]
    NavigationBlocked(&'static str),

    #[error("Submission is only available on the last image after its label is entered")]
    SubmitUnavailable,

    #[error("An exam request is already in progress")]
    Busy,

    #[error("No exam is in progress")]
    NotActive,

    #[error("An exam is already in progress")]
    AlreadyStarted,
}

impl ExamError {
    /// Create an invariant violation and log it loudly.
    pub fn invariant(message: impl Into<String>) -> Self {
        let message = message.into();
        log::error!("Invariant violated: {}", message);
        Self::Invariant(message)
    }

    /// Create an upstream failure from a server status and error text.
    pub fn upstream(status: i32, message: impl Into<String>) -> Self {
        let message = message.into();
        Self::Upstream {
            status,
            message: if message.is_empty() {
                "no error message supplied".to_string()
            } else {
                message
            },
        }
    }

    /// Create an error for an unreadable vertex pair.
    pub fn malformed_vertices(pair: &str) -> Self {
        Self::Invariant(format!("malformed vertex pair '{}'", pair))
    }

    /// Whether this error came from the user's input rather than the system.
    pub fn is_validation(&self) -> bool {
        matches!(self, ExamError::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_defaults_message() {
        let err = ExamError::upstream(0, "");
        assert!(err.to_string().contains("no error message supplied"));
        let err = ExamError::upstream(-1, "exam closed");
        assert!(err.to_string().contains("exam closed"));
        assert!(err.to_string().contains("-1"));
    }

    #[test]
    fn test_validation_is_transparent() {
        let err: ExamError = ValidationError::EmptyAnnotationName.into();
        assert!(err.is_validation());
        assert_eq!(err.to_string(), "Structure name must be filled in");
    }
}
