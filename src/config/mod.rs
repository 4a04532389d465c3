//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, clamp warnings)
//!     → GateConfig
//!     → scheduler section handed to Gate::new
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → Gate::update_config merges the scheduler section
//!     → next admission decision reads the new values
//! ```
//!
//! # Design Decisions
//! - Scheduler knobs are advisory: out-of-range limits are clamped, not rejected
//! - All fields have defaults to allow minimal configs
//! - A failed reload keeps the running configuration

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::BackoffConfig;
pub use schema::GateConfig;
pub use schema::ObservabilityConfig;
pub use schema::SchedulerConfig;
pub use schema::SchedulerConfigPatch;
pub use schema::TransportConfig;
