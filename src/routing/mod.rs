//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming envelope (method, path)
//!     → router.rs (exact lookup, then ranked scan)
//!     → matcher.rs (compare segments, capture variables)
//!     → Return: matched Route + params, or None
//!
//! Route Compilation (at startup):
//!     register(method, pattern, handler)...
//!     → RouteTableBuilder (keyed by method + pattern)
//!     → Freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path
//! - Deterministic: same input always matches same route

pub mod matcher;
pub mod router;

pub use matcher::{PathPattern, Segment};
pub use router::{Route, RouteMatch, RouteTable, RouteTableBuilder};
