//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Workspace → static config files → proxy → control API → sync loop
//!
//! Shutdown (shutdown.rs):
//!     Trigger(reason) → stop broadcast → every owner tears down → pending == 0 → exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger
//! ```
//!
//! # Design Decisions
//! - Any fatal condition funnels through one trigger; the first reason wins
//! - Cancellation is cooperative: owners observe the stop signal themselves
//! - The process exits only once every registered unit of work completed

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{Shutdown, StopSignal, WorkGuard};
