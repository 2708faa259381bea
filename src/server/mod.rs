//! Inbound server subsystem.
//!
//! # Data Flow
//! ```text
//! HTTP request ──▶ http.rs ─────┐
//!                               ├──▶ dispatcher.rs (pre-request, route, supervise)
//! RPC frame ────▶ websocket.rs ─┘        │
//!                                        ▼
//!                                 handler.rs (user handlers)
//! ```
//!
//! # Design Decisions
//! - Both bindings share one dispatcher and one envelope model
//! - Handler faults never escape as transport errors

pub mod app;
pub mod dispatcher;
pub mod handler;
pub mod http;
pub mod websocket;

pub use app::{AdapterServer, AppState, ServerError};
pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use handler::{Handler, HandlerResult, PreRequestHook, PreRequestResult};
