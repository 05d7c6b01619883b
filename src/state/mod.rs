//! Declarative state synthesis.
//!
//! # Data Flow
//! ```text
//! RouteSpec + BuildOptions
//!     → certs.rs (resolve TLS material, may fail: nothing appended)
//!     → downstream.rs / upstream.rs (listener + backend pair)
//!     → State (appended, never edited in place)
//!     → sync loop applies the whole State at once
//! ```
//!
//! # Design Decisions
//! - Listener and backend mode always come from one protocol value
//! - Mutual TLS is built with `verify = required`; there is no optional form
//! - HTTP-only features are dropped silently in TCP mode
//! - Updates are full regeneration; callers build a fresh State per batch

pub mod certs;
pub mod downstream;
pub mod model;
pub mod routes;
pub mod upstream;

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::config::{ProxyOptions, TimeoutConfig};
use crate::workspace::templates::{POLICY_AGENT_BACKEND, POLICY_AGENT_ENGINE};
use crate::workspace::WorkspacePaths;

pub use certs::{CertPaths, CertificateStore, FileCertStore};
pub use downstream::build_downstream_fragment;
pub use model::{Backend, Fragment, Frontend, Mode, State};
pub use routes::{Protocol, RouteSpec, TlsSpec};
pub use upstream::build_upstream_fragment;

use model::{
    Bind, Filter, FilterType, FrontendFilter, HttpRequestRule, HttpRequestRuleType, LogFacility,
    LogFormat, LogTarget, RuleCond, Server, StatsOptions, TcpRequestAction, TcpRequestRule,
    TcpRequestRuleType,
};

/// Session variable test the policy agent satisfies for authorized connections.
pub const AUTHORIZED_COND: &str = "{ var(sess.connect.auth) -m int eq 1 }";

/// Header value copying the caller's application name set during connection setup.
pub const SOURCE_APP_FORMAT: &str = "%[var(sess.connect.source_app)]";

pub const STATS_FRONTEND: &str = "front_stats";
pub const STATS_BACKEND: &str = "back_stats";

/// Inputs shared by every fragment in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    pub enable_intentions: bool,
    pub policy_agent_config: PathBuf,
    pub policy_agent_address: String,
    pub log_requests: bool,
    pub log_address: String,
    pub stats_listen_addr: Option<String>,
    pub timeouts: TimeoutConfig,
}

impl BuildOptions {
    /// Derive build options from configuration and the workspace layout.
    pub fn new(proxy: &ProxyOptions, timeouts: TimeoutConfig, paths: &WorkspacePaths) -> Self {
        Self {
            enable_intentions: proxy.enable_intentions,
            policy_agent_config: paths.policy_agent_config.clone(),
            policy_agent_address: proxy
                .spoe_address
                .clone()
                .unwrap_or_else(|| format!("unix@{}", paths.policy_agent_socket.display())),
            log_requests: proxy.log_requests,
            log_address: proxy
                .log_address
                .clone()
                .unwrap_or_else(|| paths.logs_socket.display().to_string()),
            stats_listen_addr: proxy.stats_listen_addr.clone(),
            timeouts,
        }
    }
}

/// Set or clear the backend that connects the proxy to the policy agent.
pub fn build_policy_agent_backend(opts: &BuildOptions, state: &mut State) {
    if !opts.enable_intentions {
        state.policy_agent = None;
        return;
    }

    let (address, port) = split_address(&opts.policy_agent_address);
    state.policy_agent = Some(Backend {
        name: POLICY_AGENT_BACKEND.to_string(),
        mode: Mode::Tcp,
        server_timeout: opts.timeouts.server_ms,
        connect_timeout: opts.timeouts.connect_ms,
        forwardfor: false,
        servers: vec![Server::plain("policy_agent".to_string(), address, port)],
        log_target: None,
        http_request_rules: Vec::new(),
        stats_options: None,
    });
}

/// Set or clear the listener that serves the proxy's statistics page.
///
/// An address that does not parse as `ip:port` clears the listener;
/// configuration validation rejects such addresses before startup.
pub fn build_stats_fragment(opts: &BuildOptions, state: &mut State) {
    let Some(addr) = opts
        .stats_listen_addr
        .as_deref()
        .and_then(|a| a.parse::<SocketAddr>().ok())
    else {
        state.stats = None;
        return;
    };

    let frontend = Frontend {
        name: STATS_FRONTEND.to_string(),
        mode: Mode::Http,
        default_backend: STATS_BACKEND.to_string(),
        client_timeout: opts.timeouts.client_ms,
        httplog: false,
        bind: Bind::plain(
            format!("{STATS_FRONTEND}_bind"),
            addr.ip().to_string(),
            addr.port(),
        ),
        log_target: None,
        filter: None,
    };
    let backend = Backend {
        name: STATS_BACKEND.to_string(),
        mode: Mode::Http,
        server_timeout: opts.timeouts.server_ms,
        connect_timeout: opts.timeouts.connect_ms,
        forwardfor: false,
        servers: Vec::new(),
        log_target: None,
        http_request_rules: Vec::new(),
        stats_options: Some(StatsOptions {
            stats_enable: true,
            stats_uri_prefix: "/".to_string(),
        }),
    };
    state.stats = Some(Fragment { frontend, backend });
}

/// Split `host:port`; anything else (a `unix@` path) is returned whole.
fn split_address(addr: &str) -> (String, Option<u16>) {
    if !addr.starts_with("unix@") {
        if let Some((host, port)) = addr.rsplit_once(':') {
            if let Ok(port) = port.parse() {
                return (host.to_string(), Some(port));
            }
        }
    }
    (addr.to_string(), None)
}

fn log_target(opts: &BuildOptions) -> LogTarget {
    LogTarget {
        address: opts.log_address.clone(),
        facility: LogFacility::Local0,
        format: LogFormat::Rfc5424,
    }
}

fn logging_enabled(opts: &BuildOptions, route: &RouteSpec) -> bool {
    opts.log_requests && route.log_requests
}

/// Filter + deny-unless-authorized rule.
fn intentions_filter(opts: &BuildOptions) -> FrontendFilter {
    FrontendFilter {
        filter: Filter {
            kind: FilterType::Spoe,
            spoe_engine: POLICY_AGENT_ENGINE.to_string(),
            spoe_config: opts.policy_agent_config.clone(),
        },
        rule: TcpRequestRule {
            kind: TcpRequestRuleType::Content,
            action: TcpRequestAction::Reject,
            cond: RuleCond::Unless,
            cond_test: AUTHORIZED_COND.to_string(),
        },
    }
}

fn forward_for(route: &RouteSpec, mode: Mode) -> bool {
    route.enable_forward_for && mode == Mode::Http
}

fn app_name_rules(route: &RouteSpec, mode: Mode) -> Vec<HttpRequestRule> {
    match &route.app_name_header {
        Some(header) if !header.is_empty() && mode == Mode::Http => vec![HttpRequestRule {
            kind: HttpRequestRuleType::AddHeader,
            hdr_name: header.clone(),
            hdr_format: SOURCE_APP_FORMAT.to_string(),
        }],
        _ => Vec::new(),
    }
}

/// Proxy object names allow a restricted character set.
fn object_name(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
