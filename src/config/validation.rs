//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges that would break the process (timeouts, addresses)
//! - Report scheduler limits that will be clamped
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Scheduler limits never fail validation; a 0 limit is clamped to 1
//! - Validation is a pure function: GateConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::{GateConfig, SchedulerConfig, MAX_BACKOFF_SECS};

/// A configuration value that cannot be used.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("transport.{field} must be greater than 0")]
    ZeroTimeout { field: &'static str },

    #[error("observability.metrics_address '{0}' is not a socket address")]
    MetricsAddress(String),

    #[error("observability.log_level '{0}' is not a log level")]
    LogLevel(String),

    #[error("scheduler.backoff.max_secs ({max}) is below a base delay ({base})")]
    BackoffCeiling { max: u64, base: u64 },
}

/// Check a configuration before it is accepted.
pub fn validate_config(config: &GateConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.transport.timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout { field: "timeout_secs" });
    }
    if config.transport.connect_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout { field: "connect_timeout_secs" });
    }

    let obs = &config.observability;
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::MetricsAddress(obs.metrics_address.clone()));
    }
    if obs.log_level.parse::<tracing::Level>().is_err() {
        errors.push(ValidationError::LogLevel(obs.log_level.clone()));
    }

    let backoff = &config.scheduler.backoff;
    let base = backoff.heavy_base_secs.max(backoff.light_base_secs);
    if backoff.max_secs < base {
        errors.push(ValidationError::BackoffCeiling {
            max: backoff.max_secs,
            base,
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Describe every scheduler limit that will be clamped at read time.
pub fn clamp_warnings(config: &SchedulerConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    let limits = [
        ("global_max_concurrent", config.global_max_concurrent),
        ("per_host_max_concurrent", config.per_host_max_concurrent),
        ("per_host_rate_limit_per_min", config.per_host_rate_limit_per_min),
    ];
    for (name, value) in limits {
        if value == 0 {
            warnings.push(format!("scheduler.{name} is 0; using 1"));
        }
    }
    if config.backoff.max_secs > MAX_BACKOFF_SECS {
        warnings.push(format!(
            "scheduler.backoff.max_secs is {}; using {MAX_BACKOFF_SECS}",
            config.backoff.max_secs
        ));
    }
    warnings
}
