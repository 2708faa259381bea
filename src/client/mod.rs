//! Outbound client subsystem.
//!
//! # Data Flow
//! ```text
//! invoke(request)
//!     → peer.rs (attempt 1 on a reused connection)
//!     → fast path (one immediate retry if transient and quick)
//!     → fixed-wait retries on new connections
//!     → RawReply::normalize → ResponseEnvelope
//! ```

pub mod error;
pub mod peer;

pub use error::InvokeError;
pub use peer::PeerClient;
