//! Errors raised by request handlers.

use thiserror::Error;

/// Error returned by a handler instead of a response.
///
/// Coded errors are mapped onto a response status by their code prefix
/// (see [`ResponseEnvelope::from_handler_error`](crate::envelope::ResponseEnvelope::from_handler_error)).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    /// Error with a machine-readable code, e.g. `NOT_FOUND` or `INVALID_EMAIL`.
    #[error("{code}//{message}")]
    Coded { code: String, message: String },

    /// Anything without a code.
    #[error("{0}")]
    Other(String),
}

impl HandlerError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        HandlerError::Coded {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        HandlerError::Other(message.into())
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            HandlerError::Coded { code, .. } => Some(code),
            HandlerError::Other(_) => None,
        }
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        HandlerError::new("INVALID_PAYLOAD", err.to_string())
    }
}
