//! Per-run configuration workspace.
//!
//! # Data Flow
//! ```text
//! Workspace::create(base_dir)
//!     → <base_dir>/haproxy-connect-<random>/   (0700)
//!         haproxy.conf            main config (templates.rs)
//!         spoe.conf               policy-agent descriptor
//!         haproxy.sock            stats / admin socket
//!         spoe.sock               policy-agent socket
//!         dataplane.sock          control-API socket
//!         logs.sock               request log socket
//!         dataplane-transactions/ control-API scratch state
//!         certs/                  TLS material written per route
//!         state.json              last applied state
//!     → cleanup task removes the whole tree on the stop signal
//! ```
//!
//! # Design Decisions
//! - Everything mutable lives in one disposable directory
//! - Random suffix so concurrent or repeated runs never collide
//! - The credential lives on the workspace, not in a global

pub mod credentials;
pub mod templates;

use std::fs::{self, OpenOptions, Permissions};
use std::io::Write;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::{SidecarError, SidecarResult};
use crate::lifecycle::Shutdown;

pub use credentials::Credentials;
use templates::{render_main_config, MainConfig, POLICY_AGENT_CONFIG};

/// Prefix of every workspace directory name.
pub const DIR_PREFIX: &str = "haproxy-connect-";

/// Paths derived from the workspace root. Stable for the workspace lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspacePaths {
    pub root: PathBuf,
    pub main_config: PathBuf,
    pub policy_agent_config: PathBuf,
    pub policy_agent_socket: PathBuf,
    pub stats_socket: PathBuf,
    pub control_api_socket: PathBuf,
    pub control_api_transactions: PathBuf,
    pub logs_socket: PathBuf,
    pub certs_dir: PathBuf,
    pub state_snapshot: PathBuf,
}

impl WorkspacePaths {
    fn new(root: PathBuf) -> Self {
        Self {
            main_config: root.join("haproxy.conf"),
            policy_agent_config: root.join("spoe.conf"),
            policy_agent_socket: root.join("spoe.sock"),
            stats_socket: root.join("haproxy.sock"),
            control_api_socket: root.join("dataplane.sock"),
            control_api_transactions: root.join("dataplane-transactions"),
            logs_socket: root.join("logs.sock"),
            certs_dir: root.join("certs"),
            state_snapshot: root.join("state.json"),
            root,
        }
    }
}

/// Host facts that shape the main config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeHints {
    /// Worker threads the proxy should run.
    pub threads: usize,
}

impl RuntimeHints {
    /// Detect from the host.
    pub fn detect() -> Self {
        let threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self { threads }
    }
}

/// An isolated, self-cleaning directory for generated files and sockets.
#[derive(Debug)]
pub struct Workspace {
    paths: WorkspacePaths,
    credentials: Credentials,
}

impl Workspace {
    /// Allocate a fresh workspace under `base_dir`.
    ///
    /// Registers one unit of work with `shutdown`; a background task removes
    /// the directory once the stop signal fires and then completes that unit.
    /// On failure nothing stays registered. Must be called inside a Tokio
    /// runtime.
    pub fn create(base_dir: &Path, shutdown: &Shutdown) -> SidecarResult<Self> {
        let guard = shutdown.register();

        let root = base_dir.join(format!("{DIR_PREFIX}{}", Uuid::new_v4().simple()));
        fs::create_dir(&root).map_err(|e| {
            SidecarError::io(
                format!("failed to create workspace under {}", base_dir.display()),
                e,
            )
        })?;

        let paths = WorkspacePaths::new(root);
        if let Err(e) = prepare(&paths) {
            let _ = fs::remove_dir_all(&paths.root);
            return Err(SidecarError::io(
                format!("failed to prepare workspace {}", paths.root.display()),
                e,
            ));
        }

        let mut stop = shutdown.stop_signal();
        let root = paths.root.clone();
        tokio::spawn(async move {
            stop.stopped().await;
            tracing::info!(path = %root.display(), "Cleaning workspace");
            if let Err(e) = tokio::fs::remove_dir_all(&root).await {
                tracing::error!(path = %root.display(), error = %e, "Failed to remove workspace");
            }
            guard.complete();
        });

        tracing::info!(path = %paths.root.display(), "Workspace created");

        Ok(Self {
            paths,
            credentials: Credentials::generate(),
        })
    }

    pub fn paths(&self) -> &WorkspacePaths {
        &self.paths
    }

    pub fn root(&self) -> &Path {
        &self.paths.root
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Render and write the proxy's main config file.
    ///
    /// `custom` replaces the built-in template when given.
    pub fn write_main_config(&self, hints: RuntimeHints, custom: Option<&str>) -> SidecarResult<()> {
        let stats_socket = self.paths.stats_socket.to_string_lossy();
        let params = MainConfig {
            stats_socket: &stats_socket,
            threads: hints.threads,
            userlist: credentials::ADMIN_USERLIST,
            admin_user: self.credentials.user(),
            admin_password: self.credentials.password(),
        };
        let rendered = render_main_config(&params, custom)?;

        write_private(&self.paths.main_config, &rendered).map_err(|e| {
            SidecarError::io(
                format!("failed to write {}", self.paths.main_config.display()),
                e,
            )
        })?;
        tracing::debug!(path = %self.paths.main_config.display(), threads = hints.threads, "Main config written");
        Ok(())
    }

    /// Write the fixed policy-agent descriptor.
    pub fn write_policy_agent_config(&self) -> SidecarResult<()> {
        write_private(&self.paths.policy_agent_config, POLICY_AGENT_CONFIG).map_err(|e| {
            SidecarError::io(
                format!("failed to write {}", self.paths.policy_agent_config.display()),
                e,
            )
        })?;
        tracing::debug!(path = %self.paths.policy_agent_config.display(), "Policy agent config written");
        Ok(())
    }
}

fn prepare(paths: &WorkspacePaths) -> std::io::Result<()> {
    fs::set_permissions(&paths.root, Permissions::from_mode(0o700))?;
    fs::create_dir(&paths.control_api_transactions)?;
    fs::create_dir(&paths.certs_dir)?;
    Ok(())
}

/// Write `contents` to `path`, owner read/write only.
pub(crate) fn write_private(path: &Path, contents: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(contents.as_bytes())?;
    file.sync_all()
}
