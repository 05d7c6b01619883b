//! Service-mesh sidecar controller for HAProxy.

// Core subsystems
pub mod config;
pub mod state;
pub mod supervisor;
pub mod sync;
pub mod workspace;

// Cross-cutting concerns
pub mod admin;
pub mod error;
pub mod lifecycle;
pub mod observability;

pub use config::schema::SidecarConfig;
pub use error::{SidecarError, SidecarResult};
pub use lifecycle::Shutdown;
