//! HAProxy Connect sidecar.
//!
//! ```text
//!                 ┌──────────────────────────────────────────────────────┐
//!                 │                      SIDECAR                         │
//!                 │                                                      │
//!   routes.toml ──┼─▶ sync loop ──▶ state builder ──▶ state.json         │
//!                 │                                      │               │
//!                 │                                      ▼               │
//!                 │   supervisor ──▶ haproxy ◀── dataplaneapi            │
//!                 │                                                      │
//!                 │   workspace (config, sockets, certs)                 │
//!                 │   shutdown coordinator ◀── SIGTERM / SIGINT / exits   │
//!                 └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use connect_sidecar::config::loader::{load_config, ConfigError};
use connect_sidecar::config::validation::validate_config;
use connect_sidecar::config::LogFormat;
use connect_sidecar::lifecycle::startup;
use connect_sidecar::observability::logging::init_logging;
use connect_sidecar::SidecarConfig;

#[derive(Parser, Debug)]
#[command(name = "connect-sidecar", version)]
#[command(about = "Runs HAProxy as a service-mesh sidecar", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Route file to synthesize proxy state from.
    #[arg(long)]
    routes: Option<String>,

    #[arg(long)]
    haproxy_bin: Option<String>,

    #[arg(long)]
    dataplane_bin: Option<String>,

    /// Directory the per-run workspace is created under.
    #[arg(long)]
    config_base_dir: Option<String>,

    /// Address of an external policy agent.
    #[arg(long)]
    spoe_address: Option<String>,

    /// Disable intention enforcement.
    #[arg(long)]
    no_intentions: bool,

    /// Send request logs from the proxy.
    #[arg(long)]
    log_requests: bool,

    /// Serve the proxy's statistics page on this `ip:port`.
    #[arg(long)]
    stats_listen_addr: Option<String>,

    /// Main proxy config template replacing the built-in one.
    #[arg(long)]
    haproxy_cfg_template: Option<String>,

    #[arg(long)]
    log_level: Option<String>,

    /// Emit JSON logs.
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    fn into_config(self) -> Result<SidecarConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => SidecarConfig::default(),
        };

        if let Some(routes) = self.routes {
            config.routes.path = Some(routes);
        }
        if let Some(bin) = self.haproxy_bin {
            config.proxy.haproxy_bin = bin;
        }
        if let Some(bin) = self.dataplane_bin {
            config.proxy.dataplane_bin = bin;
        }
        if let Some(dir) = self.config_base_dir {
            config.proxy.config_base_dir = dir;
        }
        if self.spoe_address.is_some() {
            config.proxy.spoe_address = self.spoe_address;
        }
        if self.no_intentions {
            config.proxy.enable_intentions = false;
        }
        if self.log_requests {
            config.proxy.log_requests = true;
        }
        if self.stats_listen_addr.is_some() {
            config.proxy.stats_listen_addr = self.stats_listen_addr;
        }
        if self.haproxy_cfg_template.is_some() {
            config.proxy.haproxy_cfg_template = self.haproxy_cfg_template;
        }
        if let Some(level) = self.log_level {
            config.observability.log_level = level;
        }
        if self.json_logs {
            config.observability.log_format = LogFormat::Json;
        }

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Cli::parse().into_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("connect-sidecar: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&config.observability) {
        eprintln!("connect-sidecar: failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        haproxy_bin = %config.proxy.haproxy_bin,
        dataplane_bin = %config.proxy.dataplane_bin,
        intentions = config.proxy.enable_intentions,
        routes = ?config.routes.path,
        "connect-sidecar starting"
    );

    match startup::run(config).await {
        Ok(reason) => {
            tracing::info!(reason = %reason, "Exiting");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Sidecar failed");
            ExitCode::FAILURE
        }
    }
}
