//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → SidecarConfig (validated, immutable)
//!     → CLI flag overrides applied in main
//!
//! Route file:
//!     watcher.rs detects change
//!     → sync loop reloads routes and regenerates state
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; only the route file is hot reloaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::{
    AdminConfig, LogFormat, ObservabilityConfig, ProxyOptions, RoutesConfig, SidecarConfig,
    SupervisorConfig, TimeoutConfig,
};
