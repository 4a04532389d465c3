//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Gate operations produce:
//!     → tracing events (structured fields: host, fingerprint, status)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → logging.rs subscriber (stdout)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - The library only emits; installing subscribers/exporters is the binary's job
//! - Metric updates are no-ops until a recorder is installed
//! - Per-host labels, since the host is the unit of every limit

pub mod logging;
pub mod metrics;
