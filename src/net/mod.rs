//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound call
//!     → transport.rs (Transport trait: open / is_open / round_trip / close)
//!     → protocol.rs (rpc or http, from client.protocol)
//!     → websocket.rs (binary frame per envelope, bounded by io timeout)
//!       or http.rs (one HTTP request per call, status code kept)
//!     → RawReply
//!
//! Inbound TLS
//!     → tls.rs (PEM loading for the server bindings)
//! ```
//!
//! # Design Decisions
//! - Framing is delegated to the transport, the pool never sees bytes
//! - Every read and write is bounded by the handle's io timeout
//! - A handle that failed once is reported closed and never reused

pub mod http;
pub mod protocol;
pub mod tls;
pub mod transport;
pub mod websocket;

pub use http::{HttpHandle, HttpTransport};
pub use protocol::{PeerHandle, PeerTransport};
pub use transport::{Transport, TransportError};
pub use websocket::{WsHandle, WsTransport};
