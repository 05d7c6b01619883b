//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the sidecar.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the sidecar.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SidecarConfig {
    /// Proxy binaries, workspace location and traffic policy switches.
    pub proxy: ProxyOptions,

    /// Timeouts applied to every generated fragment.
    pub timeouts: TimeoutConfig,

    /// Subprocess supervision policy.
    pub supervisor: SupervisorConfig,

    /// Route source for the sync loop.
    pub routes: RoutesConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

/// Proxy process and traffic policy options.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxyOptions {
    /// Path to the proxy binary.
    pub haproxy_bin: String,

    /// Path to the control-API binary.
    pub dataplane_bin: String,

    /// Directory under which the per-run workspace is created.
    pub config_base_dir: String,

    /// Enforce intentions through the policy-check agent.
    pub enable_intentions: bool,

    /// Address of an external policy agent. Defaults to the workspace socket.
    pub spoe_address: Option<String>,

    /// Emit per-request logs from the proxy.
    pub log_requests: bool,

    /// Log target for request logs. Defaults to the workspace log socket.
    pub log_address: Option<String>,

    /// `ip:port` for a listener serving the proxy's statistics page.
    pub stats_listen_addr: Option<String>,

    /// Main proxy config template read at startup instead of the built-in one.
    pub haproxy_cfg_template: Option<String>,
}

impl Default for ProxyOptions {
    fn default() -> Self {
        Self {
            haproxy_bin: "haproxy".to_string(),
            dataplane_bin: "dataplaneapi".to_string(),
            config_base_dir: std::env::temp_dir().to_string_lossy().into_owned(),
            enable_intentions: true,
            spoe_address: None,
            log_requests: false,
            log_address: None,
            stats_listen_addr: None,
            haproxy_cfg_template: None,
        }
    }
}

/// Fragment timeouts in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Client inactivity timeout on listeners.
    pub client_ms: u64,

    /// Server inactivity timeout on backends.
    pub server_ms: u64,

    /// Backend connection establishment timeout.
    pub connect_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            client_ms: 30_000,
            server_ms: 30_000,
            connect_ms: 30_000,
        }
    }
}

/// Supervision policy for the proxy and its control API.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Treat any supervised process exit as fatal to the sidecar.
    pub fatal_on_exit: bool,

    /// How long to wait for the control-API socket after launch.
    pub readiness_timeout_ms: u64,

    /// Base delay for readiness polling backoff.
    pub readiness_base_delay_ms: u64,

    /// Maximum delay for readiness polling backoff.
    pub readiness_max_delay_ms: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            fatal_on_exit: crate::supervisor::EXIT_IS_FATAL,
            readiness_timeout_ms: 10_000,
            readiness_base_delay_ms: 50,
            readiness_max_delay_ms: 1_000,
        }
    }
}

/// Route file settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutesConfig {
    /// Path to the TOML route file.
    pub path: Option<String>,

    /// Regenerate state when the route file changes.
    pub watch: bool,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            path: None,
            watch: true,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9102".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
