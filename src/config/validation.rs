//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, threshold > 0)
//! - Check the relay registry is usable (non-empty, unique addresses)
//! - Check Prometheus settings (query only when metric selection is enabled)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BalancerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::BTreeSet;
use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::{Algorithm, BalancerConfig};

/// A single semantic problem found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("turn.address_mapping must contain at least one relay")]
    EmptyRegistry,

    #[error("relay address {0} is listed more than once")]
    DuplicateAddress(String),

    #[error("relay {0} has an empty address")]
    EmptyAddress(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("load_balancer.prometheus.query must contain a %s placeholder")]
    MissingPlaceholder,

    #[error("load_balancer.prometheus.endpoint is not a valid URL: {0}")]
    InvalidEndpoint(String),

    #[error("{field} is not a valid socket address: {value}")]
    InvalidBindAddress { field: &'static str, value: String },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &BalancerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.turn.address_mapping.is_empty() {
        errors.push(ValidationError::EmptyRegistry);
    }
    let mut seen = BTreeSet::new();
    for (name, address) in &config.turn.address_mapping {
        if address.trim().is_empty() {
            errors.push(ValidationError::EmptyAddress(name.clone()));
        } else if !seen.insert(address.as_str()) {
            errors.push(ValidationError::DuplicateAddress(address.clone()));
        }
    }

    let hc = &config.health_check;
    if hc.interval_secs == 0 {
        errors.push(ValidationError::Zero("health_check.interval_secs"));
    }
    if hc.timeout_secs == 0 {
        errors.push(ValidationError::Zero("health_check.timeout_secs"));
    }
    if hc.success_threshold == 0 {
        errors.push(ValidationError::Zero("health_check.success_threshold"));
    }

    let lb = &config.load_balancer;
    if lb.interval_minutes == 0 {
        errors.push(ValidationError::Zero("load_balancer.interval_minutes"));
    }
    if lb.algorithm == Algorithm::Prometheus {
        if lb.duration_minutes == 0 {
            errors.push(ValidationError::Zero("load_balancer.duration_minutes"));
        }
        if lb.timeout_secs == 0 {
            errors.push(ValidationError::Zero("load_balancer.timeout_secs"));
        }
        if !lb.prometheus.query.contains("%s") {
            errors.push(ValidationError::MissingPlaceholder);
        }
    }
    match Url::parse(&lb.prometheus.endpoint) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(_) => errors.push(ValidationError::InvalidEndpoint(format!(
            "{} (scheme must be http or https)",
            lb.prometheus.endpoint
        ))),
        Err(e) => errors.push(ValidationError::InvalidEndpoint(format!(
            "{} ({})",
            lb.prometheus.endpoint, e
        ))),
    }

    check_socket_addr(&mut errors, "web_api.bind_address", &config.web_api.bind_address);
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
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress {
            field,
            value: value.to_string(),
        });
    }
}
