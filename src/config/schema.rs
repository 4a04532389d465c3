//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gate.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct GateConfig {
    /// Admission limits and backoff policy.
    pub scheduler: SchedulerConfig,

    /// HTTP client settings for the reqwest transport.
    pub transport: TransportConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Live admission knobs.
///
/// Limits of 0 are accepted and clamped to 1 when read; see the
/// `effective_*` accessors.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum requests executing at once across all hosts.
    pub global_max_concurrent: usize,

    /// Maximum requests executing at once against one host.
    pub per_host_max_concurrent: usize,

    /// Maximum requests per host per trailing 60 seconds.
    pub per_host_rate_limit_per_min: usize,

    /// Whether a clean response also lifts a cooldown that is still running.
    pub reset_clears_active_cooldown: bool,

    /// Backoff durations.
    pub backoff: BackoffConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            global_max_concurrent: 6,
            per_host_max_concurrent: 2,
            per_host_rate_limit_per_min: 60,
            reset_clears_active_cooldown: false,
            backoff: BackoffConfig::default(),
        }
    }
}

impl SchedulerConfig {
    pub fn effective_global_limit(&self) -> usize {
        self.global_max_concurrent.max(1)
    }

    pub fn effective_host_limit(&self) -> usize {
        self.per_host_max_concurrent.max(1)
    }

    pub fn effective_rate_limit(&self) -> usize {
        self.per_host_rate_limit_per_min.max(1)
    }

    /// Merge a partial update; `None` fields keep their value.
    pub fn apply(&mut self, patch: &SchedulerConfigPatch) {
        if let Some(v) = patch.global_max_concurrent {
            self.global_max_concurrent = v;
        }
        if let Some(v) = patch.per_host_max_concurrent {
            self.per_host_max_concurrent = v;
        }
        if let Some(v) = patch.per_host_rate_limit_per_min {
            self.per_host_rate_limit_per_min = v;
        }
        if let Some(v) = patch.reset_clears_active_cooldown {
            self.reset_clears_active_cooldown = v;
        }
        if let Some(backoff) = &patch.backoff {
            self.backoff = backoff.clone();
        }
    }
}

/// Partial scheduler configuration accepted by `Gate::update_config`.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct SchedulerConfigPatch {
    pub global_max_concurrent: Option<usize>,
    pub per_host_max_concurrent: Option<usize>,
    pub per_host_rate_limit_per_min: Option<usize>,
    pub reset_clears_active_cooldown: Option<bool>,
    pub backoff: Option<BackoffConfig>,
}

impl From<SchedulerConfig> for SchedulerConfigPatch {
    fn from(config: SchedulerConfig) -> Self {
        Self {
            global_max_concurrent: Some(config.global_max_concurrent),
            per_host_max_concurrent: Some(config.per_host_max_concurrent),
            per_host_rate_limit_per_min: Some(config.per_host_rate_limit_per_min),
            reset_clears_active_cooldown: Some(config.reset_clears_active_cooldown),
            backoff: Some(config.backoff),
        }
    }
}

/// Longest cooldown a host can be given, whatever the configured ceiling.
pub const MAX_BACKOFF_SECS: u64 = 24 * 60 * 60;

/// Host cooldown durations.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct BackoffConfig {
    /// First cooldown after a 429/503.
    pub heavy_base_secs: u64,

    /// First cooldown after a transport failure.
    pub light_base_secs: u64,

    /// Ceiling for the doubling sequence.
    pub max_secs: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            heavy_base_secs: 30,
            light_base_secs: 10,
            max_secs: 300,
        }
    }
}

impl BackoffConfig {
    pub fn heavy_base(&self) -> Duration {
        Duration::from_secs(self.heavy_base_secs)
    }

    pub fn light_base(&self) -> Duration {
        Duration::from_secs(self.light_base_secs)
    }

    /// Configured ceiling, clamped to `MAX_BACKOFF_SECS`.
    pub fn max(&self) -> Duration {
        Duration::from_secs(self.max_secs.min(MAX_BACKOFF_SECS))
    }
}

/// HTTP client configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TransportConfig {
    /// Whole-request timeout in seconds.
    pub timeout_secs: u64,

    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// User-Agent header sent with every request.
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 10,
            user_agent: concat!("outbound-gate/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
