//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, delays ordered)
//! - Check URLs and bind addresses parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: SweeperConfig → Result<(), Vec<FieldError>>
//! - Runs before any network connection is opened

use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::SweeperConfig;

/// One invalid configuration value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Checks every semantic rule and reports all violations.
pub fn validate_config(config: &SweeperConfig) -> Result<(), Vec<FieldError>> {
    let mut errors = Vec::new();
    let network = &config.network;

    if network.name.trim().is_empty() {
        errors.push(FieldError::new("network.name", "must not be empty"));
    } else if !network
        .name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        errors.push(FieldError::new(
            "network.name",
            format!("'{}' is not a valid host label", network.name),
        ));
    }

    check_url(&mut errors, "network.node_url", &network.node_url(), &["http", "https"]);
    check_url(&mut errors, "network.ws_url", &network.ws_url(), &["ws", "wss"]);
    for url in &network.failover_urls {
        check_url(&mut errors, "network.failover_urls", url, &["http", "https"]);
    }

    if network.request_timeout_secs == 0 {
        errors.push(FieldError::new("network.request_timeout_secs", "must be greater than 0"));
    }
    if network.confirm_timeout_secs > 0 && network.confirm_poll_interval_ms == 0 {
        errors.push(FieldError::new(
            "network.confirm_poll_interval_ms",
            "must be greater than 0 when confirmation polling is enabled",
        ));
    }

    let listener = &config.listener;
    if listener.connect_timeout_secs == 0 {
        errors.push(FieldError::new("listener.connect_timeout_secs", "must be greater than 0"));
    }
    if listener.subscribe_timeout_secs == 0 {
        errors.push(FieldError::new("listener.subscribe_timeout_secs", "must be greater than 0"));
    }
    let reconnect = &listener.reconnect;
    if reconnect.enabled {
        if reconnect.base_delay_ms == 0 {
            errors.push(FieldError::new("listener.reconnect.base_delay_ms", "must be greater than 0"));
        }
        if reconnect.max_delay_ms < reconnect.base_delay_ms {
            errors.push(FieldError::new(
                "listener.reconnect.max_delay_ms",
                "must not be smaller than base_delay_ms",
            ));
        }
    }

    let observability = &config.observability;
    if observability.logs_dir.trim().is_empty() {
        errors.push(FieldError::new("observability.logs_dir", "must not be empty"));
    }
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(FieldError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_url(errors: &mut Vec<FieldError>, field: &'static str, value: &str, schemes: &[&str]) {
    match Url::parse(value) {
        Ok(url) if schemes.contains(&url.scheme()) => {}
        Ok(url) => errors.push(FieldError::new(
            field,
            format!("unsupported scheme '{}' in {}", url.scheme(), value),
        )),
        Err(e) => errors.push(FieldError::new(field, format!("'{}': {}", value, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&SweeperConfig::default()).is_ok());
    }

    #[test]
    fn test_reports_all_errors() {
        let mut config = SweeperConfig::default();
        config.network.request_timeout_secs = 0;
        config.network.ws_url = Some("http://example.com/ws".to_string());
        config.listener.reconnect.max_delay_ms = 10;
        config.observability.metrics_enabled = true;
        config.observability.metrics_address = "nowhere".to_string();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "network.ws_url",
                "network.request_timeout_secs",
                "listener.reconnect.max_delay_ms",
                "observability.metrics_address",
            ]
        );
    }

    #[test]
    fn test_bad_network_name() {
        let mut config = SweeperConfig::default();
        config.network.name = "test net".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.field == "network.name"));
    }

    #[test]
    fn test_disabled_reconnect_skips_delay_checks() {
        let mut config = SweeperConfig::default();
        config.listener.reconnect.enabled = false;
        config.listener.reconnect.base_delay_ms = 0;
        assert!(validate_config(&config).is_ok());
    }
}
