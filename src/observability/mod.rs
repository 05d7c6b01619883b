//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events, pretty or JSON)
//!     → metrics.rs (process, build and route counters)
//!
//! Proxy request logs:
//!     → logs.sock (RFC 5424 datagrams) → syslog.rs → tracing
//! ```
//!
//! # Design Decisions
//! - Metrics recording is a no-op until an exporter is installed
//! - Subprocess output and request logs land in the same log stream as ours

pub mod logging;
pub mod metrics;
pub mod syslog;
