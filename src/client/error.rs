//! Outbound call errors.

use thiserror::Error;

use crate::net::TransportError;

/// Terminal failure of an outbound call after all retries.
#[derive(Debug, Error)]
#[error("{source} (path {path})")]
pub struct InvokeError {
    pub path: String,
    pub attempts: u32,
    #[source]
    pub source: TransportError,
}

impl InvokeError {
    pub fn is_overload(&self) -> bool {
        matches!(self.source, TransportError::Overloaded { .. })
    }
}
