//! Scheduling subsystem.
//!
//! # Data Flow
//! ```text
//! Gate::enqueue(url, options)
//!     → dedup.rs (fingerprint in flight? join its shared future)
//!     → queue.rs (new task, enqueue order)
//!     → admission pass:
//!         admission.rs (global, per-host, rate window, cooldown)
//!         admitted → executor.rs (transport call)
//!         none admissible → single wake timer, at most 5s out
//!
//! Transport settles:
//!     → executor.rs classifies (ok / overloaded / transport error)
//!     → state.rs releases slots, records completion, applies backoff
//!     → caller futures resolve
//!     → next admission pass
//! ```
//!
//! # Design Decisions
//! - One mutex over all scheduler state; never held across an await
//! - Host-fair, not globally FIFO: a blocked host does not hold up others
//! - Within a host, tasks start in enqueue order
//! - No cancellation: a dropped caller future leaves the request running

pub mod admission;
pub mod dedup;
mod executor;
pub mod gate;
pub mod host;
pub mod queue;
pub mod state;

pub use admission::Verdict;
pub use dedup::{Fingerprint, ResponseFuture};
pub use gate::Gate;
pub use host::HostSnapshot;
pub use state::{GateStats, MAX_WAKE_DELAY};
