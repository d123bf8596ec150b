//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeout > 0, body limit > 0, addresses are host:port)
//! - Require an infrastructure description
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs after CLI overrides are applied, before anything starts

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::GatewayConfig;

/// One failed check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validate a fully merged configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut fail = |field: &'static str, message: String| errors.push(ValidationError { field, message });

    if config.template.is_none() {
        fail("template", "no infrastructure description given".to_string());
    }

    if !is_bind_address(&config.listener.bind_address) {
        fail(
            "listener.bind_address",
            format!("`{}` is not a host:port address", config.listener.bind_address),
        );
    }

    if config.invocation.timeout_secs == Some(0) {
        fail("invocation.timeout_secs", "must be greater than 0".to_string());
    }

    if config.invocation.max_body_bytes == 0 {
        fail("invocation.max_body_bytes", "must be greater than 0".to_string());
    }

    if let Some(address) = &config.observability.metrics_address {
        if address.parse::<SocketAddr>().is_err() {
            fail(
                "observability.metrics_address",
                format!("`{address}` is not a socket address"),
            );
        }
    }

    if config
        .handlers
        .env_builder
        .as_deref()
        .is_some_and(|name| name.trim().is_empty())
    {
        fail("handlers.env_builder", "must not be empty".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// A socket address, or `host:port` with a host name resolved at bind time.
fn is_bind_address(address: &str) -> bool {
    if address.parse::<SocketAddr>().is_ok() {
        return true;
    }
    match address.rsplit_once(':') {
        Some((host, port)) => {
            port.parse::<u16>().is_ok()
                && !host.is_empty()
                && host
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn valid() -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.template = Some(PathBuf::from("template.yaml"));
        config
    }

    #[test]
    fn test_valid_config() {
        assert!(validate_config(&valid()).is_ok());
    }

    #[test]
    fn test_host_name_bind_address() {
        let mut config = valid();
        config.listener.bind_address = "localhost:8000".into();
        assert!(validate_config(&config).is_ok());

        for bad in ["localhost", "localhost:http", ":8000", "local host:8000", "::1:8000"] {
            config.listener.bind_address = bad.into();
            assert!(validate_config(&config).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = GatewayConfig::default();
        config.listener.bind_address = "nowhere".into();
        config.invocation.timeout_secs = Some(0);
        config.invocation.max_body_bytes = 0;
        config.observability.metrics_address = Some("bad".into());

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "template",
                "listener.bind_address",
                "invocation.timeout_secs",
                "invocation.max_body_bytes",
                "observability.metrics_address",
            ]
        );
    }
}
