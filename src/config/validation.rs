//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check switches that depend on each other (admin enabled ⇒ api key set)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: SidecarConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::SidecarConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &SidecarConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.proxy.haproxy_bin.trim().is_empty() {
        errors.push(ValidationError::new("proxy.haproxy_bin", "must not be empty"));
    }
    if config.proxy.dataplane_bin.trim().is_empty() {
        errors.push(ValidationError::new("proxy.dataplane_bin", "must not be empty"));
    }
    if config.proxy.config_base_dir.trim().is_empty() {
        errors.push(ValidationError::new("proxy.config_base_dir", "must not be empty"));
    }

    let timeouts = [
        ("timeouts.client_ms", config.timeouts.client_ms),
        ("timeouts.server_ms", config.timeouts.server_ms),
        ("timeouts.connect_ms", config.timeouts.connect_ms),
        ("supervisor.readiness_timeout_ms", config.supervisor.readiness_timeout_ms),
        ("supervisor.readiness_base_delay_ms", config.supervisor.readiness_base_delay_ms),
    ];
    for (field, value) in timeouts {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than zero"));
        }
    }
    if config.supervisor.readiness_base_delay_ms > config.supervisor.readiness_max_delay_ms {
        errors.push(ValidationError::new(
            "supervisor.readiness_base_delay_ms",
            "must not exceed readiness_max_delay_ms",
        ));
    }

    if let Some(addr) = &config.proxy.stats_listen_addr {
        if addr.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "proxy.stats_listen_addr",
                format!("invalid socket address {addr:?}"),
            ));
        }
    }
    if let Some(path) = &config.proxy.haproxy_cfg_template {
        if path.trim().is_empty() {
            errors.push(ValidationError::new("proxy.haproxy_cfg_template", "must not be empty"));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address {:?}", config.observability.metrics_address),
        ));
    }

    if config.admin.enabled {
        if config.admin.api_key.is_empty() {
            errors.push(ValidationError::new("admin.api_key", "required when admin is enabled"));
        }
        if config.admin.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "admin.bind_address",
                format!("invalid socket address {:?}", config.admin.bind_address),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&SidecarConfig::default()).is_ok());
    }

    #[test]
    fn admin_requires_api_key() {
        let mut config = SidecarConfig::default();
        config.admin.enabled = true;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::new("admin.api_key", "required when admin is enabled")]);
    }

    #[test]
    fn metrics_address_checked_only_when_enabled() {
        let mut config = SidecarConfig::default();
        config.observability.metrics_address = "nope".into();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "observability.metrics_address");
    }

    #[test]
    fn backoff_bounds_must_be_ordered() {
        let mut config = SidecarConfig::default();
        config.supervisor.readiness_base_delay_ms = 5_000;
        config.supervisor.readiness_max_delay_ms = 100;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn zero_backoff_base_is_rejected() {
        let mut config = SidecarConfig::default();
        config.supervisor.readiness_base_delay_ms = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::new("supervisor.readiness_base_delay_ms", "must be greater than zero")]
        );
    }

    #[test]
    fn stats_listen_address_must_parse() {
        let mut config = SidecarConfig::default();
        config.proxy.stats_listen_addr = Some("127.0.0.1:8404".into());
        assert!(validate_config(&config).is_ok());

        config.proxy.stats_listen_addr = Some("localhost".into());
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "proxy.stats_listen_addr");
    }
}
