//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound call:
//!     → timeouts.rs (one deadline for acquire + round trip)
//!     → On failure: retries.rs (fast path once if transient, then fixed wait)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every outbound call has a deadline
//! - Retry decisions are made from a per-attempt record, never persisted
//! - Tunables come from configuration

pub mod retries;
pub mod timeouts;

pub use retries::{AttemptKind, CallAttempt, RetryPolicy};
