//! Route specifications consumed by the state builder.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::state::model::Mode;

/// Application protocol of a route.
///
/// Anything other than `tcp` is treated as `http`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Protocol {
    #[default]
    Http,
    Tcp,
}

impl From<String> for Protocol {
    fn from(value: String) -> Self {
        Protocol::from(value.as_str())
    }
}

impl From<&str> for Protocol {
    fn from(value: &str) -> Self {
        if value == "tcp" {
            Protocol::Tcp
        } else {
            Protocol::Http
        }
    }
}

impl Protocol {
    /// Proxy mode for this protocol. Listener and backend always share it.
    pub fn mode(self) -> Mode {
        match self {
            Protocol::Tcp => Mode::Tcp,
            Protocol::Http => Mode::Http,
        }
    }
}

/// PEM-encoded TLS material for one route.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsSpec {
    /// Trusted CA certificates.
    pub ca_bundle: Vec<String>,
    /// Leaf certificate chain.
    pub certificate: String,
    /// Private key for the leaf certificate.
    pub private_key: String,
}

impl fmt::Debug for TlsSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsSpec")
            .field("ca_bundle", &self.ca_bundle.len())
            .field("certificate", &!self.certificate.is_empty())
            .field("private_key", &"<redacted>")
            .finish()
    }
}

fn default_true() -> bool {
    true
}

/// One downstream listener or upstream dial target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSpec {
    /// Route identifier, used in upstream object names.
    pub name: String,

    #[serde(default)]
    pub protocol: Protocol,

    pub local_bind_address: String,
    pub local_bind_port: u16,

    pub target_address: String,
    pub target_port: u16,

    /// Mutual TLS on the mesh-facing side.
    #[serde(default = "default_true")]
    pub tls_required: bool,

    #[serde(default)]
    pub tls: TlsSpec,

    /// Inject the forwarded-for header (HTTP only).
    #[serde(default)]
    pub enable_forward_for: bool,

    /// Header carrying the calling application's identity (HTTP only).
    #[serde(default)]
    pub app_name_header: Option<String>,

    /// Per-route switch; request logging also needs the global option.
    #[serde(default = "default_true")]
    pub log_requests: bool,

    /// Per-route switch; enforcement also needs the global option.
    #[serde(default = "default_true")]
    pub enforce_intentions: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_protocols_default_to_http() {
        assert_eq!(Protocol::from("tcp"), Protocol::Tcp);
        assert_eq!(Protocol::from("http"), Protocol::Http);
        assert_eq!(Protocol::from("grpc"), Protocol::Http);
        assert_eq!(Protocol::from(""), Protocol::Http);
    }

    #[test]
    fn route_defaults_from_toml() {
        let route: RouteSpec = toml::from_str(
            r#"
            name = "web"
            local_bind_address = "0.0.0.0"
            local_bind_port = 21000
            target_address = "127.0.0.1"
            target_port = 8080
            "#,
        )
        .unwrap();
        assert_eq!(route.protocol, Protocol::Http);
        assert!(route.tls_required);
        assert!(route.log_requests);
        assert!(route.enforce_intentions);
        assert!(!route.enable_forward_for);
        assert!(route.app_name_header.is_none());
    }

    #[test]
    fn tls_debug_hides_key() {
        let tls = TlsSpec {
            ca_bundle: vec!["ca".into()],
            certificate: "cert".into(),
            private_key: "very-secret".into(),
        };
        assert!(!format!("{tls:?}").contains("very-secret"));
    }
}
