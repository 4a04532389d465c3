//! Errors surfaced to callers of the gate.

use std::sync::Arc;
use thiserror::Error;

use crate::transport::{FetchResponse, TransportError};

/// What every subscriber of a request eventually receives.
pub type GateResult = Result<Arc<FetchResponse>, GateError>;

/// Errors that can occur while submitting or awaiting a request.
///
/// Overload responses (429/503) are not errors: they resolve normally and
/// carry their status code.
#[derive(Debug, Clone, Error)]
pub enum GateError {
    /// The URL could not be parsed or names no host.
    #[error("invalid url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The transport failed before producing a response.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The executing task went away without settling the request.
    #[error("request dropped before it settled")]
    Dropped,
}
