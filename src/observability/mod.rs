//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher, client, pool produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID flows from the bindings into every dispatch log
//! - Metrics are cheap and safe to record without an exporter

pub mod logging;
pub mod metrics;
