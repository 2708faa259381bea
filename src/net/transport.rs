//! Transport abstraction used by the connection pool.

use std::future::Future;
use std::io;
use std::time::Duration;
use thiserror::Error;

use crate::envelope::{RawReply, RequestEnvelope};

/// Failures raised while talking to a remote peer.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection not open")]
    NotOpen,

    #[error("eof")]
    Eof,

    #[error("i/o timeout after {0:?}")]
    Timeout(Duration),

    #[error("broken pipe")]
    BrokenPipe,

    #[error("pool overloaded, no connection available for {path}")]
    Overloaded { path: String },

    #[error("connect to {address} failed: {reason}")]
    Connect { address: String, reason: String },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// Failures that warrant an immediate retry on a fresh connection.
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::NotOpen
            | TransportError::Eof
            | TransportError::Timeout(_)
            | TransportError::BrokenPipe
            | TransportError::Overloaded { .. } => true,
            TransportError::Io(err) => matches!(
                err.kind(),
                io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::TimedOut
                    | io::ErrorKind::NotConnected
            ),
            TransportError::Connect { .. }
            | TransportError::Protocol(_)
            | TransportError::Codec(_) => false,
        }
    }

    /// Classify an I/O error into the matching transport failure.
    pub fn from_io(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::BrokenPipe | io::ErrorKind::ConnectionReset => TransportError::BrokenPipe,
            io::ErrorKind::UnexpectedEof => TransportError::Eof,
            io::ErrorKind::NotConnected => TransportError::NotOpen,
            _ => TransportError::Io(err),
        }
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            TransportError::NotOpen => "not_open",
            TransportError::Eof => "eof",
            TransportError::Timeout(_) => "timeout",
            TransportError::BrokenPipe => "broken_pipe",
            TransportError::Overloaded { .. } => "overloaded",
            TransportError::Connect { .. } => "connect",
            TransportError::Protocol(_) => "protocol",
            TransportError::Codec(_) => "codec",
            TransportError::Io(_) => "io",
        }
    }
}

/// A persistent, framed connection to one peer.
///
/// Implementations own the wire framing; the pool only opens, probes,
/// closes, and runs one request/reply exchange at a time per handle.
pub trait Transport: Send + Sync + 'static {
    type Handle: Send + 'static;

    fn open(
        &self,
        address: &str,
        connect_timeout: Duration,
        io_timeout: Duration,
    ) -> impl Future<Output = Result<Self::Handle, TransportError>> + Send;

    fn is_open(&self, handle: &Self::Handle) -> bool;

    fn close(&self, handle: Self::Handle) -> impl Future<Output = ()> + Send;

    fn round_trip(
        &self,
        handle: &mut Self::Handle,
        request: &RequestEnvelope,
    ) -> impl Future<Output = Result<RawReply, TransportError>> + Send;

    /// Prefix of the message returned once every retry has failed.
    fn failure_label(&self) -> &'static str {
        "Endpoint error"
    }
}
