//! Startup orchestration.
//!
//! # Order
//! 1. Signal bridge
//! 2. Workspace, main config, policy-agent config
//! 3. Request log forwarder, metrics exporter
//! 4. Proxy, then control API; wait for the control-API socket
//! 5. Sync loop, admin API
//! 6. Wait for quiescence
//!
//! # Design Decisions
//! - A failure after the workspace exists triggers shutdown and waits for
//!   everything registered so far before the error is returned
//! - The control API only starts once the proxy's pid is known
//! - A stop caused by a failure (a supervised process exiting, a startup
//!   step failing) is returned as an error; a requested stop is not

use std::io;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use crate::admin::{self, AdminState};
use crate::config::SidecarConfig;
use crate::error::{SidecarError, SidecarResult};
use crate::lifecycle::{signals, Shutdown};
use crate::observability::{metrics, syslog};
use crate::state::{BuildOptions, FileCertStore};
use crate::supervisor::readiness::{wait_for_socket, ReadinessPolicy};
use crate::supervisor::{self, args, LaunchSpec};
use crate::sync::{SnapshotApplier, StateStore, SyncLoop};
use crate::workspace::{RuntimeHints, Workspace};

/// Run the sidecar until shutdown.
///
/// Returns the reason of a requested stop. A stop caused by a failure is
/// returned as [`SidecarError::ProcessExited`] or the startup error.
pub async fn run(config: SidecarConfig) -> SidecarResult<String> {
    let shutdown = Shutdown::new();
    signals::install(&shutdown)?;

    if let Err(e) = start(&config, &shutdown).await {
        shutdown.trigger_fault(format!("startup failed: {e}"));
        shutdown.wait().await;
        return match e {
            SidecarError::Stopped { reason } => {
                tracing::info!(reason = %reason, "Stopped during startup");
                Ok(reason)
            }
            e => Err(e),
        };
    }

    shutdown.wait().await;
    let reason = shutdown.reason().unwrap_or_default();
    if shutdown.is_fault() {
        tracing::error!(reason = %reason, "Shutdown complete after failure");
        return Err(SidecarError::ProcessExited { reason });
    }
    tracing::info!(reason = %reason, "Shutdown complete");
    Ok(reason)
}

async fn start(config: &SidecarConfig, shutdown: &Shutdown) -> SidecarResult<()> {
    let custom_template = config
        .proxy
        .haproxy_cfg_template
        .as_deref()
        .map(|path| {
            std::fs::read_to_string(path)
                .map_err(|e| SidecarError::io(format!("failed to read template {path}"), e))
        })
        .transpose()?;

    let workspace = Workspace::create(Path::new(&config.proxy.config_base_dir), shutdown)?;
    workspace.write_main_config(RuntimeHints::detect(), custom_template.as_deref())?;
    workspace.write_policy_agent_config()?;
    let paths = workspace.paths().clone();
    tracing::info!(workspace = %paths.root.display(), "Workspace ready");

    if config.proxy.log_requests && config.proxy.log_address.is_none() {
        syslog::start_forwarder(&paths.logs_socket, shutdown)?;
    }

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse().map_err(|e| {
            SidecarError::io(
                "invalid metrics address",
                io::Error::new(io::ErrorKind::InvalidInput, e),
            )
        })?;
        metrics::init_metrics(addr)?;
    }

    let fatal = config.supervisor.fatal_on_exit;
    let proxy = supervisor::launch(
        shutdown,
        LaunchSpec::new(&config.proxy.haproxy_bin, args::proxy_args(&paths))
            .log_prefix("haproxy")
            .attach_logs(true)
            .fatal_on_exit(fatal),
    )?;
    let control_api = supervisor::launch(
        shutdown,
        LaunchSpec::new(
            &config.proxy.dataplane_bin,
            args::control_api_args(&paths, &config.proxy.haproxy_bin, proxy.pid()),
        )
        .log_prefix("dataplaneapi")
        .attach_logs(true)
        .fatal_on_exit(fatal),
    )?;
    wait_for_socket(
        &paths.control_api_socket,
        ReadinessPolicy::from(&config.supervisor),
        shutdown,
    )
    .await?;

    let store = Arc::new(StateStore::new());
    let mut sync = SyncLoop::new(
        BuildOptions::new(&config.proxy, config.timeouts, &paths),
        Arc::new(FileCertStore::new(&paths.certs_dir)),
        Arc::new(SnapshotApplier::new(store.clone(), &paths.state_snapshot)),
    );
    if let Some(routes) = &config.routes.path {
        sync = sync.with_routes(routes, config.routes.watch);
    }
    sync.start(shutdown)?;

    if config.admin.enabled {
        admin::serve(
            &config.admin.bind_address,
            AdminState {
                api_key: Arc::from(config.admin.api_key.as_str()),
                shutdown: shutdown.clone(),
                store,
                processes: Arc::from(vec![proxy, control_api]),
            },
        )
        .await?;
    }

    tracing::info!("Sidecar running");
    Ok(())
}
