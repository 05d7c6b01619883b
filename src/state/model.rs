//! Proxy configuration model.
//!
//! These types mirror the objects the control API accepts. They serialize to
//! the snake_case JSON the control API uses.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Proxy mode of a listener or backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Http,
    Tcp,
}

/// Client/server certificate verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verify {
    None,
    Optional,
    Required,
}

/// Listener bind point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bind {
    pub name: String,
    pub address: String,
    pub port: u16,
    pub ssl: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_certificate: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_cafile: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verify: Option<Verify>,
}

impl Bind {
    /// A bind without TLS.
    pub fn plain(name: String, address: String, port: u16) -> Self {
        Self {
            name,
            address,
            port,
            ssl: false,
            ssl_certificate: None,
            ssl_cafile: None,
            verify: None,
        }
    }

    /// A mutual-TLS bind. Client certificates are always required.
    pub fn mutual_tls(name: String, address: String, port: u16, cert: PathBuf, ca: PathBuf) -> Self {
        Self {
            name,
            address,
            port,
            ssl: true,
            ssl_certificate: Some(cert),
            ssl_cafile: Some(ca),
            verify: Some(Verify::Required),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFacility {
    Local0,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Rfc5424,
}

/// Structured log destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogTarget {
    pub address: String,
    pub facility: LogFacility,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterType {
    Spoe,
}

/// Stream filter attached to a listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(rename = "type")]
    pub kind: FilterType,
    pub spoe_engine: String,
    pub spoe_config: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TcpRequestRuleType {
    Content,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TcpRequestAction {
    Accept,
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleCond {
    If,
    Unless,
}

/// Content-inspection rule on a listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpRequestRule {
    #[serde(rename = "type")]
    pub kind: TcpRequestRuleType,
    pub action: TcpRequestAction,
    pub cond: RuleCond,
    pub cond_test: String,
}

/// Policy filter plus the rule that acts on its verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontendFilter {
    pub filter: Filter,
    pub rule: TcpRequestRule,
}

/// A listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frontend {
    pub name: String,
    pub mode: Mode,
    pub default_backend: String,
    /// Milliseconds.
    pub client_timeout: u64,
    pub httplog: bool,
    pub bind: Bind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_target: Option<LogTarget>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<FrontendFilter>,
}

/// A backend server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    pub name: String,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    pub ssl: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_certificate: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssl_cafile: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verify: Option<Verify>,
}

impl Server {
    /// A server reached without TLS.
    pub fn plain(name: String, address: String, port: Option<u16>) -> Self {
        Self {
            name,
            address,
            port,
            ssl: false,
            ssl_certificate: None,
            ssl_cafile: None,
            verify: None,
        }
    }

    /// A server reached with mutual TLS. The server certificate is always verified.
    pub fn mutual_tls(name: String, address: String, port: u16, cert: PathBuf, ca: PathBuf) -> Self {
        Self {
            name,
            address,
            port: Some(port),
            ssl: true,
            ssl_certificate: Some(cert),
            ssl_cafile: Some(ca),
            verify: Some(Verify::Required),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpRequestRuleType {
    #[serde(rename = "add-header")]
    AddHeader,
}

/// HTTP-layer request rule on a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpRequestRule {
    #[serde(rename = "type")]
    pub kind: HttpRequestRuleType,
    pub hdr_name: String,
    pub hdr_format: String,
}

/// Built-in statistics page served by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsOptions {
    pub stats_enable: bool,
    pub stats_uri_prefix: String,
}

/// A backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backend {
    pub name: String,
    pub mode: Mode,
    /// Milliseconds.
    pub server_timeout: u64,
    /// Milliseconds.
    pub connect_timeout: u64,
    pub forwardfor: bool,
    pub servers: Vec<Server>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_target: Option<LogTarget>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub http_request_rules: Vec<HttpRequestRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats_options: Option<StatsOptions>,
}

/// One route's listener and the backend it forwards to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub frontend: Frontend,
    pub backend: Backend,
}

/// Desired proxy configuration at a point in time.
///
/// Single writer: one batch owns a `State` while it is being built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    pub fragments: Vec<Fragment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_agent: Option<Backend>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<Fragment>,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of route fragments. The policy-agent backend and the stats
    /// listener are not counted.
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn frontends(&self) -> impl Iterator<Item = &Frontend> {
        self.fragments
            .iter()
            .chain(self.stats.iter())
            .map(|f| &f.frontend)
    }

    pub fn backends(&self) -> impl Iterator<Item = &Backend> {
        self.fragments
            .iter()
            .chain(self.stats.iter())
            .map(|f| &f.backend)
            .chain(self.policy_agent.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutual_tls_bind_requires_client_cert() {
        let bind = Bind::mutual_tls(
            "b".into(),
            "0.0.0.0".into(),
            443,
            "/c.pem".into(),
            "/ca.pem".into(),
        );
        assert!(bind.ssl);
        assert_eq!(bind.verify, Some(Verify::Required));
    }

    #[test]
    fn model_serializes_control_api_field_names() {
        let rule = HttpRequestRule {
            kind: HttpRequestRuleType::AddHeader,
            hdr_name: "X-App".into(),
            hdr_format: "%[var(sess.connect.source_app)]".into(),
        };
        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json["type"], "add-header");
        assert_eq!(json["hdr_name"], "X-App");

        let bind = Bind::plain("b".into(), "127.0.0.1".into(), 8080);
        let json = serde_json::to_value(&bind).unwrap();
        assert_eq!(json["ssl"], false);
        assert!(json.get("verify").is_none());
    }
}
