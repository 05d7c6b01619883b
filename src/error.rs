//! Error taxonomy for the sidecar.
//!
//! Startup failures (workspace, launch, readiness) are fatal to the whole
//! sidecar. Certificate failures are local to the route being built.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::config::loader::ConfigError;
use crate::sync::routes_file::RouteFileError;

/// Errors raised while resolving TLS material for a route.
#[derive(Debug, Error)]
pub enum CertificateError {
    /// The TLS material carried no CA certificate.
    #[error("no CA certificate provided")]
    MissingCa,

    /// The TLS material carried no leaf certificate.
    #[error("no leaf certificate provided")]
    MissingCertificate,

    /// The TLS material carried no private key.
    #[error("no private key provided")]
    MissingKey,

    /// PEM material could not be parsed.
    #[error("invalid PEM in {what}: {source}")]
    InvalidPem {
        what: &'static str,
        #[source]
        source: std::io::Error,
    },

    /// A PEM file referenced by a route could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing the resolved material to disk failed.
    #[error("failed to store certificate at {}: {source}", path.display())]
    Store {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Main configuration rendering errors.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The built-in template failed.
    #[error(transparent)]
    Builtin(#[from] askama::Error),

    /// An operator-supplied template failed to parse or render.
    #[error("custom template: {0}")]
    Custom(#[from] tinytemplate::error::Error),
}

/// Errors that can occur while running the sidecar.
#[derive(Debug, Error)]
pub enum SidecarError {
    /// Filesystem or socket failure.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// The main configuration template failed to render.
    #[error("template rendering failed: {0}")]
    Template(#[from] TemplateError),

    /// A supervised binary could not be started.
    #[error("error starting {binary}: {source}")]
    Launch {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    /// TLS material for a route could not be resolved.
    #[error("certificate error: {0}")]
    Certificate(#[from] CertificateError),

    /// A supervised process terminated.
    #[error("{reason}")]
    ProcessExited { reason: String },

    /// Shutdown was requested while a startup step was still waiting.
    #[error("stopped: {reason}")]
    Stopped { reason: String },

    /// A control socket did not appear in time.
    #[error("{} not ready after {waited:?}", path.display())]
    NotReady { path: PathBuf, waited: Duration },

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The route file could not be loaded.
    #[error("route file error: {0}")]
    Routes(#[from] RouteFileError),

    /// The metrics exporter could not be installed.
    #[error("metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    /// The route file could not be watched.
    #[error("file watch error: {0}")]
    Watch(#[from] notify::Error),
}

impl SidecarError {
    /// Wrap an I/O error with a short description of what was attempted.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        SidecarError::Io {
            context: context.into(),
            source,
        }
    }
}

/// Result type for sidecar operations.
pub type SidecarResult<T> = Result<T, SidecarError>;
