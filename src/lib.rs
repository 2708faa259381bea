//! Protocol-agnostic request dispatch with pooled, retrying peer calls.
//!
//! One envelope model is shared by an HTTP binding, a WebSocket RPC binding
//! and an outbound client. Inbound calls are routed by path pattern to
//! handlers; outbound calls lease persistent connections from a bounded pool
//! and retry transient failures.

pub mod client;
pub mod config;
pub mod envelope;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod pool;
pub mod resilience;
pub mod routing;
pub mod server;

pub use client::{InvokeError, PeerClient};
pub use config::{AdapterConfig, Protocol};
pub use envelope::{HandlerError, Method, RawReply, RequestEnvelope, ResponseEnvelope, Status};
pub use lifecycle::Shutdown;
pub use net::{HttpTransport, PeerTransport, Transport, TransportError, WsTransport};
pub use pool::{ConnectionLease, ConnectionPool};
pub use server::{AdapterServer, Dispatcher, DispatcherBuilder};
