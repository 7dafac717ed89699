//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses, URLs and value ranges
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem with a configuration value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_socket_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if let Some(tls) = &config.listener.tls {
        check_non_empty(&mut errors, "listener.tls.cert_path", &tls.cert_path);
        check_non_empty(&mut errors, "listener.tls.key_path", &tls.key_path);
    }

    let relay = &config.relay;
    if relay.enabled {
        check_socket_addr(&mut errors, "relay.bind_address", &relay.bind_address);
        check_non_empty(&mut errors, "relay.org", &relay.org);
    }
    check_positive(&mut errors, "relay.heartbeat_interval_secs", relay.heartbeat_interval_secs);
    check_positive(
        &mut errors,
        "relay.outbound_queue_capacity",
        relay.outbound_queue_capacity as u64,
    );
    check_positive(&mut errors, "relay.max_missed_probes", relay.max_missed_probes as u64);
    check_positive(&mut errors, "relay.reconnect_interval_ms", relay.reconnect_interval_ms);
    if relay.reconnect_max_delay_ms < relay.reconnect_interval_ms {
        errors.push(ValidationError::new(
            "relay.reconnect_max_delay_ms",
            "must not be smaller than reconnect_interval_ms",
        ));
    }

    let ledger = &config.ledger;
    check_url(&mut errors, "ledger.gateway_url", &ledger.gateway_url, &["http", "https"]);
    check_url(&mut errors, "ledger.events_url", &ledger.events_url, &["ws", "wss"]);
    check_non_empty(&mut errors, "ledger.network_config_path", &ledger.network_config_path);
    check_non_empty(&mut errors, "ledger.credential_store_path", &ledger.credential_store_path);
    check_non_empty(&mut errors, "ledger.user_credential_path", &ledger.user_credential_path);

    if config.observability.metrics_enabled {
        check_socket_addr(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_socket_addr(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if let Err(e) = value.parse::<SocketAddr>() {
        errors.push(ValidationError::new(field, format!("invalid socket address '{}': {}", value, e)));
    }
}

fn check_url(errors: &mut Vec<ValidationError>, field: &'static str, value: &str, schemes: &[&str]) {
    match Url::parse(value) {
        Ok(url) if schemes.contains(&url.scheme()) => {}
        Ok(url) => errors.push(ValidationError::new(
            field,
            format!("unsupported scheme '{}', expected one of {:?}", url.scheme(), schemes),
        )),
        Err(e) => errors.push(ValidationError::new(field, format!("invalid URL '{}': {}", value, e))),
    }
}

fn check_non_empty(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.trim().is_empty() {
        errors.push(ValidationError::new(field, "must not be empty"));
    }
}

fn check_positive(errors: &mut Vec<ValidationError>, field: &'static str, value: u64) {
    if value == 0 {
        errors.push(ValidationError::new(field, "must be greater than zero"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = GatewayConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.ledger.events_url = "http://localhost:7053".into();
        config.relay.max_missed_probes = 0;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec!["listener.bind_address", "relay.max_missed_probes", "ledger.events_url"]
        );
    }

    #[test]
    fn test_reconnect_bounds() {
        let mut config = GatewayConfig::default();
        config.relay.reconnect_interval_ms = 5000;
        config.relay.reconnect_max_delay_ms = 100;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "relay.reconnect_max_delay_ms");
    }

    #[test]
    fn test_disabled_relay_skips_address_check() {
        let mut config = GatewayConfig::default();
        config.relay.enabled = false;
        config.relay.bind_address = String::new();
        assert!(validate_config(&config).is_ok());
    }
}
