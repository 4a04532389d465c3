//! Outbound request admission layer.
//!
//! Many independent callers submit HTTP requests through one [`Gate`]. The
//! gate collapses identical concurrent requests, caps global and per-host
//! concurrency, enforces a per-host requests-per-minute window and backs
//! off hosts that signal overload, without ever owning socket code itself:
//! the network is reached through an injected [`Transport`].

pub mod config;
pub mod error;
pub mod observability;
pub mod resilience;
pub mod scheduler;
pub mod transport;

pub use config::schema::{GateConfig, SchedulerConfig, SchedulerConfigPatch};
pub use error::{GateError, GateResult};
pub use scheduler::{Gate, GateStats, HostSnapshot, ResponseFuture};
pub use transport::{FetchResponse, OutboundRequest, RequestBody, RequestOptions, Transport, TransportError};
