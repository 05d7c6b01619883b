//! Route file: the local stand-in for the mesh catalog.
//!
//! ```toml
//! [tls]
//! ca_files = ["ca.pem"]
//! cert_file = "leaf.pem"
//! key_file = "leaf-key.pem"
//!
//! [downstream]
//! name = "web"
//! local_bind_address = "0.0.0.0"
//! local_bind_port = 21000
//! target_address = "127.0.0.1"
//! target_port = 8080
//!
//! [[upstreams]]
//! name = "billing"
//! local_bind_address = "127.0.0.1"
//! local_bind_port = 9191
//! target_address = "10.0.0.12"
//! target_port = 21000
//! ```
//!
//! Relative TLS file paths resolve against the route file's directory.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::error::CertificateError;
use crate::state::certs::load_tls_files;
use crate::state::{RouteSpec, TlsSpec};

/// Errors raised while loading a route file.
#[derive(Debug, Error)]
pub enum RouteFileError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse route file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to load TLS material: {0}")]
    Tls(#[from] CertificateError),
}

/// PEM files shared by every route that carries no inline material.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TlsFiles {
    pub ca_files: Vec<PathBuf>,
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
}

/// The routes one batch is built from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RouteSet {
    pub tls: Option<TlsFiles>,
    pub downstream: Option<RouteSpec>,
    pub upstreams: Vec<RouteSpec>,
}

impl RouteSet {
    pub fn len(&self) -> usize {
        self.downstream.iter().count() + self.upstreams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Load a route file and fill in TLS material from the files it references.
pub fn load_route_set(path: &Path) -> Result<RouteSet, RouteFileError> {
    let content = fs::read_to_string(path).map_err(|source| RouteFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut set: RouteSet = toml::from_str(&content)?;

    if let Some(files) = &set.tls {
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let ca: Vec<PathBuf> = files.ca_files.iter().map(|p| base.join(p)).collect();
        let shared = load_tls_files(&ca, &base.join(&files.cert_file), &base.join(&files.key_file))?;

        let empty = TlsSpec::default();
        for route in set.downstream.iter_mut().chain(set.upstreams.iter_mut()) {
            if route.tls == empty {
                route.tls = shared.clone();
            }
        }
    }

    tracing::debug!(path = %path.display(), routes = set.len(), "Route file loaded");
    Ok(set)
}
