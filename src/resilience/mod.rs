//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request settles:
//!     → rate_window.rs (record completion time for the host)
//!     → 429/503: backoff.rs heavy episode
//!     → transport failure: backoff.rs light episode
//!     → any other response: backoff.rs reset
//!
//! Admission check:
//!     → rate_window.rs (when does the host have a free slot)
//!     → backoff.rs (is the host cooling down)
//! ```
//!
//! # Design Decisions
//! - All state is per host; one host's trouble never delays another
//! - Deterministic delays, no jitter: callers are already spread by the queue
//! - No retries here; a failed request is reported, not repeated

pub mod backoff;
pub mod rate_window;
