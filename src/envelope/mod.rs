//! Protocol-neutral envelopes.
//!
//! # Data Flow
//! ```text
//! HTTP request / RPC frame
//!     → RequestEnvelope (path, method, params, headers, content)
//!     → Dispatcher → handler
//!     → ResponseEnvelope (status, data, message, error_code, total, headers)
//!     → HTTP response / RawReply frame
//! ```
//!
//! # Design Decisions
//! - One request type and one response type for every binding
//! - Payload is always an array; single values are wrapped
//! - Status codes are fixed and shared by both directions

pub mod error;
pub mod request;
pub mod response;
pub mod status;

pub use error::HandlerError;
pub use request::RequestEnvelope;
pub use response::{RawReply, ResponseEnvelope};
pub use status::{Method, Status, UnknownMethod};
