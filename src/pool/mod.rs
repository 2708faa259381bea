//! Connection pool subsystem.
//!
//! # Data Flow
//! ```text
//! acquire(prefer_reuse)
//!     → manager.rs (scan idle slots, or open + register)
//!     → lease.rs (exclusive ConnectionLease)
//!     → caller runs one round trip
//! release(lease, error)
//!     → park / replace (max age) / remove (error)
//! ```
//!
//! # Design Decisions
//! - Pool size never exceeds capacity; extra connections are one-shot
//! - A broken connection is removed at once and never handed out again
//! - No lock is held across transport I/O

pub mod lease;
pub mod manager;

pub use lease::{ConnectionLease, LeaseId};
pub use manager::{ConnectionPool, PoolSettings};
